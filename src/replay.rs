use crate::config::humantime_duration;
use crate::inspector::ScriptedInspector;
use crate::service::{
    ControlCommand, DetectionService, Directive, ServiceEvent, ServiceInput, ServiceSummary,
    UiEvent,
};
use crate::ui_tree::UiNode;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

/// One line of a session script.
///
/// ```text
/// {"screen": {"app": "com.instagram.android", "tree": {"view_id": "..."}}}
/// {"event": {"package": "com.instagram.android", "kind": "window_state_changed"}}
/// {"wait": "1500ms"}
/// {"command": {"action": "TOGGLE_BLOCKING", "enabled": false}}
/// "interrupt"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    Screen { app: String, tree: UiNode },
    ClearScreen,
    Event(UiEvent),
    Wait(#[serde(deserialize_with = "humantime_duration")] Duration),
    Command(Directive),
    Interrupt,
}

/// Parse a JSON-lines script. Blank lines and lines starting with `#` are skipped.
pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid script line {line_no}"))
        })
        .collect()
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse_script(&text).with_context(|| format!("failed to parse script {}", path.display()))
}

/// Drive `service` through `steps`, then stop it and return its summary.
///
/// `inspector` must be the inspector the service was built with.
pub async fn replay(
    steps: Vec<ScriptStep>,
    service: DetectionService,
    inspector: Arc<ScriptedInspector>,
    event_tx: Option<UnboundedSender<ServiceEvent>>,
) -> Result<ServiceSummary> {
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(service.run(input_rx, event_tx));

    for step in steps {
        let input = match step {
            ScriptStep::Screen { app, tree } => {
                inspector.set_screen(app, tree);
                None
            }
            ScriptStep::ClearScreen => {
                inspector.clear();
                None
            }
            ScriptStep::Wait(delay) => {
                tokio::time::sleep(delay).await;
                None
            }
            ScriptStep::Event(event) => Some(ServiceInput::Ui(event)),
            ScriptStep::Command(directive) => Some(ServiceInput::Command(directive.into())),
            ScriptStep::Interrupt => Some(ServiceInput::Command(ControlCommand::Interrupt)),
        };

        if let Some(input) = input {
            input_tx
                .send(input)
                .map_err(|_| anyhow!("detection service exited early"))?;
        }
    }

    // Queued after every scripted input, so those are handled first.
    let _ = input_tx.send(ServiceInput::Command(ControlCommand::Stop));
    task.await.context("detection service task failed")?
}

#[cfg(test)]
mod tests {
    use super::{ScriptStep, load_script, parse_script, replay};
    use crate::config::GuardConfig;
    use crate::inspector::ScriptedInspector;
    use crate::overlay::testing::RecordingPresenter;
    use crate::service::{DetectionService, ServiceEvent, UiEventKind};
    use crate::settings::{BLOCKING_ENABLED_KEY, MemorySettingsStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    const SCRIPT: &str = r#"
# Instagram feed, then reels long enough for two polls.
{"screen": {"app": "com.instagram.android", "tree": {"children": [{"view_id": "com.instagram.android:id/row_feed_button_save"}]}}}
{"event": {"package": "com.instagram.android", "kind": "window_state_changed"}}
{"wait": "1500ms"}
{"screen": {"app": "com.instagram.android", "tree": {"children": [{"view_id": "com.instagram.android:id/clips_viewer_container"}]}}}
{"wait": "2s"}
{"screen": {"app": "com.android.launcher", "tree": {}}}
{"event": {"package": "com.android.launcher", "kind": "window_state_changed"}}
{"wait": "1s"}
"#;

    #[test]
    fn parses_every_step_kind() {
        let steps = parse_script(
            r#"{"wait": "1s"}
"interrupt"
"clear_screen"
{"command": {"action": "TOGGLE_BLOCKING", "enabled": false}}
{"event": {"kind": "content_changed"}}"#,
        )
        .expect("parse");
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0], ScriptStep::Wait(Duration::from_secs(1)));
        assert_eq!(steps[1], ScriptStep::Interrupt);
        match &steps[4] {
            ScriptStep::Event(event) => {
                assert_eq!(event.package, None);
                assert_eq!(event.kind, UiEventKind::ContentChanged);
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_script("{\"wait\": \"1s\"}\n\n{\"bogus\": 1}").expect_err("bad line");
        assert!(format!("{err:#}").contains("line 3"));
    }

    #[test]
    fn loads_script_from_disk() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("session.jsonl");
        std::fs::write(&path, SCRIPT).expect("write script");
        assert_eq!(load_script(&path).expect("load").len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_blocks_reels_then_unblocks_on_leaving() {
        let inspector = Arc::new(ScriptedInspector::default());
        let presenter = Arc::new(RecordingPresenter::default());
        let settings = MemorySettingsStore::with(BLOCKING_ENABLED_KEY, true);
        let service = DetectionService::new(
            GuardConfig::default(),
            inspector.clone(),
            presenter.clone(),
            &settings,
        )
        .expect("service");

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let summary = replay(
            parse_script(SCRIPT).expect("parse"),
            service,
            inspector,
            Some(event_tx),
        )
        .await
        .expect("replay");

        assert_eq!(summary.evaluations, 3);
        assert_eq!(summary.blocks, 1);
        assert!(presenter.visible().is_empty());

        let mut left = Vec::new();
        while let Some(event) = event_rx.recv().await {
            if let ServiceEvent::AppLeft { app } = event {
                left.push(app);
            }
        }
        assert_eq!(left, vec!["com.instagram.android".to_string()]);
    }
}
