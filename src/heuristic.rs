use crate::targets::{TargetApp, TargetRegistry};
use crate::ui_tree::{UiNode, matches};

/// Outcome of evaluating one snapshot against an app's rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicReport {
    pub short_form_present: bool,
    /// Names of the safe screens whose markers were found.
    pub safe_screens: Vec<&'static str>,
}

impl HeuristicReport {
    pub fn is_short_form(&self) -> bool {
        self.short_form_present && self.safe_screens.is_empty()
    }
}

pub fn analyze(root: &UiNode, app: &TargetApp) -> HeuristicReport {
    let rule = &app.rule;
    let short_form_present = matches(root, &rule.short_form, rule.mode);
    let safe_screens = rule
        .safe_screens
        .iter()
        .filter(|screen| matches(root, &screen.ids, rule.mode))
        .map(|screen| screen.name)
        .collect();

    HeuristicReport {
        short_form_present,
        safe_screens,
    }
}

/// True when `root` looks like the short-form viewer of `package`. Unknown apps are never short-form.
pub fn is_short_form_active(root: &UiNode, package: &str, registry: &TargetRegistry) -> bool {
    registry
        .get(package)
        .is_some_and(|app| analyze(root, app).is_short_form())
}
