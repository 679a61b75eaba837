use crate::ui_tree::MatchMode;

pub const INSTAGRAM: &str = "com.instagram.android";
pub const YOUTUBE: &str = "com.google.android.youtube";
pub const FACEBOOK: &str = "com.facebook.katana";
/// Package owning the blocking overlay window.
pub const OWN_PACKAGE: &str = "com.q29.reelsblocker";

/// A group of identifiers that all mark the same kind of screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenMarkers {
    pub name: &'static str,
    pub ids: Vec<String>,
}

/// Short-form detection rule for one app: short-form markers present and no safe-screen markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortFormRule {
    pub mode: MatchMode,
    pub short_form: Vec<String>,
    pub safe_screens: Vec<ScreenMarkers>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetApp {
    pub package: &'static str,
    pub label: &'static str,
    pub rule: ShortFormRule,
}

impl TargetApp {
    pub fn block_message(&self) -> String {
        format!("{} REELS/SHORTS BLOCKED", self.label)
    }
}

#[derive(Debug, Clone)]
pub struct TargetRegistry {
    apps: Vec<TargetApp>,
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TargetRegistry {
    pub fn builtin() -> Self {
        Self {
            apps: vec![instagram(), youtube(), facebook()],
        }
    }

    /// Builtin registry minus the listed app ids. Unknown ids are ignored.
    pub fn without<S: AsRef<str>>(disabled: &[S]) -> Self {
        let mut registry = Self::builtin();
        registry
            .apps
            .retain(|app| !disabled.iter().any(|d| d.as_ref().trim() == app.package));
        registry
    }

    pub fn get(&self, package: &str) -> Option<&TargetApp> {
        self.apps.iter().find(|app| app.package == package)
    }

    pub fn contains(&self, package: &str) -> bool {
        self.get(package).is_some()
    }

    pub fn apps(&self) -> &[TargetApp] {
        &self.apps
    }
}

fn scoped(package: &str, names: &[&str]) -> Vec<String> {
    names.iter().map(|name| format!("{package}:id/{name}")).collect()
}

fn instagram() -> TargetApp {
    TargetApp {
        package: INSTAGRAM,
        label: "INSTAGRAM",
        rule: ShortFormRule {
            mode: MatchMode::ViewId,
            short_form: scoped(
                INSTAGRAM,
                &[
                    "clips_video_container",
                    "clips_viewer_container",
                    "clips_tab_container",
                    "reel_viewer_container",
                ],
            ),
            safe_screens: vec![
                ScreenMarkers {
                    name: "feed",
                    ids: scoped(
                        INSTAGRAM,
                        &[
                            "row_feed_photo_profile_name",
                            "secondary_label",
                            "row_feed_button_save",
                        ],
                    ),
                },
                ScreenMarkers {
                    name: "explore",
                    ids: scoped(
                        INSTAGRAM,
                        &[
                            "action_bar_search_edit_text",
                            "image_button",
                            "layout_container",
                        ],
                    ),
                },
                ScreenMarkers {
                    name: "profile",
                    ids: scoped(
                        INSTAGRAM,
                        &[
                            "action_bar_large_title_auto_size",
                            "profile_tab_icon_view",
                            "profile_header_bio_text",
                            "profile_header_follow_button",
                        ],
                    ),
                },
                ScreenMarkers {
                    name: "ephemeral",
                    ids: scoped(
                        INSTAGRAM,
                        &[
                            "message_composer_container",
                            "toolbar_like_button",
                            "toolbar_reshare_button",
                        ],
                    ),
                },
            ],
        },
    }
}

fn youtube() -> TargetApp {
    TargetApp {
        package: YOUTUBE,
        label: "YOUTUBE",
        rule: ShortFormRule {
            mode: MatchMode::ViewId,
            short_form: scoped(
                YOUTUBE,
                &[
                    "reel_recycler",
                    "shorts_player_container",
                    "shorts_video_container",
                    "reel_player_page_container",
                ],
            ),
            safe_screens: vec![
                ScreenMarkers {
                    name: "browse",
                    ids: scoped(
                        YOUTUBE,
                        &["browse_container", "home_container", "feed_container"],
                    ),
                },
                ScreenMarkers {
                    name: "long_form_player",
                    ids: scoped(YOUTUBE, &["watch_player", "player_view"]),
                },
                ScreenMarkers {
                    name: "search",
                    ids: scoped(YOUTUBE, &["search_edit_text", "search_container"]),
                },
            ],
        },
    }
}

// Facebook exposes no stable view ids for its reels viewer; fall back to keyword presence.
fn facebook() -> TargetApp {
    TargetApp {
        package: FACEBOOK,
        label: "FACEBOOK",
        rule: ShortFormRule {
            mode: MatchMode::Keyword,
            short_form: vec!["reels".to_string()],
            safe_screens: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{FACEBOOK, INSTAGRAM, TargetRegistry, YOUTUBE};

    #[test]
    fn builtin_registry_has_three_targets() {
        let registry = TargetRegistry::builtin();
        assert!(registry.contains(INSTAGRAM));
        assert!(registry.contains(YOUTUBE));
        assert!(registry.contains(FACEBOOK));
        assert!(!registry.contains("com.android.chrome"));
    }

    #[test]
    fn block_message_uses_display_label() {
        let registry = TargetRegistry::builtin();
        let app = registry.get(INSTAGRAM).expect("instagram registered");
        assert_eq!(app.block_message(), "INSTAGRAM REELS/SHORTS BLOCKED");
    }

    #[test]
    fn disabled_apps_are_removed() {
        let registry = TargetRegistry::without(&[FACEBOOK, "com.unknown.app"]);
        assert_eq!(registry.apps().len(), 2);
        assert!(!registry.contains(FACEBOOK));
    }

    #[test]
    fn short_form_and_safe_markers_are_disjoint() {
        for app in TargetRegistry::builtin().apps() {
            for screen in &app.rule.safe_screens {
                for id in &screen.ids {
                    assert!(
                        !app.rule.short_form.contains(id),
                        "{id} listed as both short-form and {} marker",
                        screen.name
                    );
                }
            }
        }
    }
}
