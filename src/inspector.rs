use crate::ui_tree::UiNode;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Read-only view of the foreground window, as granted by the OS accessibility permission.
#[async_trait]
pub trait UiInspector: Send + Sync {
    /// Identifier of the app owning the foreground window.
    async fn foreground_app(&self) -> Option<String>;
    /// Snapshot of the foreground window's element tree.
    async fn snapshot(&self) -> Option<Arc<UiNode>>;
}

#[derive(Debug, Default, Clone)]
struct Screen {
    app: Option<String>,
    tree: Option<Arc<UiNode>>,
}

/// Inspector whose screen is set by the caller; used by session replay and tests.
#[derive(Debug, Default)]
pub struct ScriptedInspector {
    screen: Mutex<Screen>,
}

impl ScriptedInspector {
    pub fn set_screen(&self, app: impl Into<String>, tree: UiNode) {
        let mut screen = self.screen.lock().unwrap_or_else(|p| p.into_inner());
        screen.app = Some(app.into());
        screen.tree = Some(Arc::new(tree));
    }

    pub fn clear(&self) {
        *self.screen.lock().unwrap_or_else(|p| p.into_inner()) = Screen::default();
    }
}

#[async_trait]
impl UiInspector for ScriptedInspector {
    async fn foreground_app(&self) -> Option<String> {
        self.screen
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .app
            .clone()
    }

    async fn snapshot(&self) -> Option<Arc<UiNode>> {
        self.screen
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .tree
            .clone()
    }
}
