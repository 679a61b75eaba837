pub const DEFAULT_REQUIRED_DETECTIONS: u32 = 2;

/// Overlay side effect requested by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEffect {
    Show(String),
    Hide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Suspect(u32),
    Blocked,
}

/// Per-session detection state owned by the dispatcher.
///
/// `is_blocked` implies `detection_count >= required`, and [`DetectorState::reset`]
/// always returns to `("", false, 0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorState {
    current_app: String,
    is_blocked: bool,
    detection_count: u32,
    required: u32,
}

impl Default for DetectorState {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_DETECTIONS)
    }
}

impl DetectorState {
    pub fn new(required: u32) -> Self {
        Self {
            current_app: String::new(),
            is_blocked: false,
            detection_count: 0,
            required: required.max(1),
        }
    }

    pub fn current_app(&self) -> &str {
        &self.current_app
    }

    pub fn in_target_app(&self) -> bool {
        !self.current_app.is_empty()
    }

    pub fn is_blocked(&self) -> bool {
        self.is_blocked
    }

    pub fn detection_count(&self) -> u32 {
        self.detection_count
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    pub fn phase(&self) -> Phase {
        match (self.is_blocked, self.detection_count) {
            (true, _) => Phase::Blocked,
            (false, 0) => Phase::Idle,
            (false, k) => Phase::Suspect(k),
        }
    }

    /// Clear everything. Returns `Hide` unconditionally; the overlay controller
    /// ignores it when nothing is showing.
    pub fn reset(&mut self) -> OverlayEffect {
        self.current_app.clear();
        self.is_blocked = false;
        self.detection_count = 0;
        OverlayEffect::Hide
    }

    /// Reset and start tracking `package`.
    pub fn enter_app(&mut self, package: &str) -> OverlayEffect {
        let effect = self.reset();
        self.current_app.push_str(package);
        effect
    }

    /// Feed one heuristic result. `block_message` is used only on the transition into `Blocked`.
    pub fn record(&mut self, short_form: bool, block_message: &str) -> Option<OverlayEffect> {
        if !short_form {
            self.detection_count = 0;
            if self.is_blocked {
                self.is_blocked = false;
                return Some(OverlayEffect::Hide);
            }
            return None;
        }

        self.detection_count = self.detection_count.saturating_add(1);
        if !self.is_blocked && self.detection_count >= self.required {
            self.is_blocked = true;
            return Some(OverlayEffect::Show(block_message.to_string()));
        }
        None
    }
}
