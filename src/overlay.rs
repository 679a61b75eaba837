use crate::detector::OverlayEffect;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("display rejected overlay: {0}")]
    Rejected(String),
    #[error("overlay is not attached")]
    NotAttached,
}

/// Renders the full-screen, non-interactive blocking layer.
pub trait OverlayPresenter: Send + Sync {
    fn attach(&self, message: &str) -> Result<(), OverlayError>;
    fn detach(&self) -> Result<(), OverlayError>;
}

/// Keeps at most one overlay attached. Presenter failures are logged and swallowed.
pub struct OverlayController {
    presenter: Arc<dyn OverlayPresenter>,
    attached: Option<String>,
}

impl OverlayController {
    pub fn new(presenter: Arc<dyn OverlayPresenter>) -> Self {
        Self {
            presenter,
            attached: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.attached.is_some()
    }

    pub fn message(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    /// Returns true if the overlay was attached.
    pub fn show(&mut self, message: &str) -> bool {
        self.hide();

        match self.presenter.attach(message) {
            Ok(()) => {
                debug!(message, "overlay attached");
                self.attached = Some(message.to_string());
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to attach overlay");
                false
            }
        }
    }

    /// Returns true if an attached overlay was detached (or a detach was attempted).
    pub fn hide(&mut self) -> bool {
        if self.attached.take().is_none() {
            return false;
        }

        // The handle is dropped either way; a failed detach leaves a stale, purely cosmetic layer.
        match self.presenter.detach() {
            Ok(()) => debug!("overlay detached"),
            Err(err) => warn!(error = %err, "failed to detach overlay"),
        }
        true
    }

    pub fn apply(&mut self, effect: &OverlayEffect) -> bool {
        match effect {
            OverlayEffect::Show(message) => self.show(message),
            OverlayEffect::Hide => self.hide(),
        }
    }
}

/// Presenter for terminals: prints a banner instead of drawing a window.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPresenter;

impl OverlayPresenter for TerminalPresenter {
    fn attach(&self, message: &str) -> Result<(), OverlayError> {
        let bar = "=".repeat(message.chars().count() + 8);
        println!("{bar}\n==  {message}  ==\n{bar}");
        Ok(())
    }

    fn detach(&self) -> Result<(), OverlayError> {
        println!("(overlay dismissed)");
        Ok(())
    }
}
