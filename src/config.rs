use crate::detector::DEFAULT_REQUIRED_DETECTIONS;
use crate::targets::{OWN_PACKAGE, TargetRegistry};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Evaluate on a fixed interval while a target app is in the foreground.
    Poll,
    /// Evaluate after window/content change events, debounced.
    Events,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayMode {
    /// Overlay visible exactly while blocked.
    State,
    /// Deprecated: overlay also dismisses itself after `auto_hide_after`.
    Timed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetectionSection {
    pub required_detections: u32,
    pub cadence: Cadence,
    #[serde(deserialize_with = "humantime_duration")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "humantime_duration")]
    pub window_change_delay: Duration,
    #[serde(deserialize_with = "humantime_duration")]
    pub content_debounce: Duration,
    #[serde(deserialize_with = "humantime_duration")]
    pub snapshot_timeout: Duration,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            required_detections: DEFAULT_REQUIRED_DETECTIONS,
            cadence: Cadence::Poll,
            poll_interval: Duration::from_secs(1),
            window_change_delay: Duration::from_millis(500),
            content_debounce: Duration::from_millis(800),
            snapshot_timeout: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OverlaySection {
    pub mode: OverlayMode,
    #[serde(deserialize_with = "humantime_duration")]
    pub auto_hide_after: Duration,
}

impl Default for OverlaySection {
    fn default() -> Self {
        Self {
            mode: OverlayMode::State,
            auto_hide_after: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppsSection {
    pub disabled: Vec<String>,
    /// Packages whose UI events are dropped outright, such as the overlay's own window.
    pub ignore: Vec<String>,
}

impl Default for AppsSection {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            ignore: vec![OWN_PACKAGE.to_string()],
        }
    }
}

impl AppsSection {
    pub fn is_ignored(&self, package: &str) -> bool {
        self.ignore.iter().any(|ignored| ignored.trim() == package)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub detection: DetectionSection,
    pub overlay: OverlaySection,
    pub apps: AppsSection,
}

impl GuardConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: GuardConfig = toml::from_str(&text).with_context(|| {
            format!("failed to parse config {} (expected TOML)", path.display())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.detection.required_detections == 0 {
            bail!("required_detections must be at least 1");
        }
        if self.detection.poll_interval.is_zero() {
            bail!("poll_interval must be greater than 0");
        }
        if self.overlay.mode == OverlayMode::Timed && self.overlay.auto_hide_after.is_zero() {
            bail!("auto_hide_after must be greater than 0 when overlay mode is timed");
        }
        let registry = self.registry();
        if let Some(app) = self.apps.ignore.iter().find(|p| registry.contains(p.trim())) {
            bail!(
                "{} is a target app and cannot be ignored; use disabled instead",
                app.trim()
            );
        }
        Ok(())
    }

    pub fn registry(&self) -> TargetRegistry {
        TargetRegistry::without(&self.apps.disabled)
    }

    pub fn summary(&self) -> String {
        let cadence = match self.detection.cadence {
            Cadence::Poll => format!(
                "poll every {}",
                humantime::format_duration(self.detection.poll_interval)
            ),
            Cadence::Events => format!(
                "events (window {}, content {})",
                humantime::format_duration(self.detection.window_change_delay),
                humantime::format_duration(self.detection.content_debounce)
            ),
        };
        let overlay = match self.overlay.mode {
            OverlayMode::State => "state-driven".to_string(),
            OverlayMode::Timed => format!(
                "timed ({})",
                humantime::format_duration(self.overlay.auto_hide_after)
            ),
        };
        format!(
            "{} detections to block, {cadence}, overlay {overlay}",
            self.detection.required_detections
        )
    }
}

pub(crate) fn humantime_duration<'de, D>(
    deserializer: D,
) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

pub fn ensure_sample_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create config directory {}", parent.display())
        })?;
    }

    let sample = r#"# reels-guard configuration (TOML)

[detection]
# Consecutive short-form detections needed before the overlay is shown.
required_detections = 2
# "poll" re-checks the screen every poll_interval while a target app is open.
# "events" re-checks after window changes (window_change_delay) and content
# changes (content_debounce).
cadence = "poll"
poll_interval = "1s"
window_change_delay = "500ms"
content_debounce = "800ms"
# Upper bound for fetching the element tree of the foreground window.
snapshot_timeout = "250ms"

[overlay]
# "state" keeps the overlay up while short-form content is on screen.
# "timed" additionally dismisses it after auto_hide_after (deprecated).
mode = "state"
auto_hide_after = "2s"

[apps]
# App ids to leave alone, e.g. ["com.facebook.katana"].
disabled = []
# Packages whose window events never count as leaving a target app.
ignore = ["com.q29.reelsblocker"]
"#;

    std::fs::write(path, sample)
        .with_context(|| format!("failed to write sample config {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::{Cadence, GuardConfig, OverlayMode, ensure_sample_config};
    use crate::targets::{FACEBOOK, INSTAGRAM, OWN_PACKAGE};
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().expect("tempdir");
        let config = GuardConfig::load(&temp.path().join("absent.toml")).expect("defaults");
        assert_eq!(config, GuardConfig::default());
        assert_eq!(config.detection.required_detections, 2);
        assert_eq!(config.detection.cadence, Cadence::Poll);
        assert_eq!(config.overlay.mode, OverlayMode::State);
    }

    #[test]
    fn sample_config_parses_to_defaults() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("reels-guard.toml");
        assert!(ensure_sample_config(&path).expect("write sample"));
        assert!(!ensure_sample_config(&path).expect("already exists"));
        assert_eq!(
            GuardConfig::load(&path).expect("parse"),
            GuardConfig::default()
        );
    }

    #[test]
    fn partial_config_overrides_selected_fields() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("reels-guard.toml");
        std::fs::write(
            &path,
            r#"
[detection]
cadence = "events"
content_debounce = "1s 200ms"

[overlay]
mode = "timed"

[apps]
disabled = ["com.facebook.katana"]
"#,
        )
        .expect("write config");

        let config = GuardConfig::load(&path).expect("parse");
        assert_eq!(config.detection.cadence, Cadence::Events);
        assert_eq!(config.detection.content_debounce, Duration::from_millis(1200));
        assert_eq!(config.detection.poll_interval, Duration::from_secs(1));
        assert_eq!(config.overlay.mode, OverlayMode::Timed);
        assert!(!config.registry().contains(FACEBOOK));
    }

    #[test]
    fn rejects_invalid_values() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("reels-guard.toml");

        std::fs::write(&path, "[detection]\nrequired_detections = 0\n").expect("write");
        assert!(GuardConfig::load(&path).is_err());

        std::fs::write(&path, "[detection]\npoll_interval = \"0s\"\n").expect("write");
        assert!(GuardConfig::load(&path).is_err());

        std::fs::write(&path, "[detection]\npoll_interval = \"soon\"\n").expect("write");
        assert!(GuardConfig::load(&path).is_err());

        std::fs::write(&path, format!("[apps]\nignore = [\"{INSTAGRAM}\"]\n")).expect("write");
        assert!(GuardConfig::load(&path).is_err());
    }

    #[test]
    fn own_package_is_ignored_by_default_and_list_is_replaceable() {
        let defaults = GuardConfig::default();
        assert!(defaults.apps.is_ignored(OWN_PACKAGE));
        assert!(!defaults.apps.is_ignored("com.android.chrome"));

        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("reels-guard.toml");
        std::fs::write(&path, "[apps]\nignore = [\"com.example.overlay\"]\n").expect("write");
        let config = GuardConfig::load(&path).expect("parse");
        assert!(config.apps.is_ignored("com.example.overlay"));
        assert!(!config.apps.is_ignored(OWN_PACKAGE));
    }
}
