use crate::config::{Cadence, GuardConfig, OverlayMode};
use crate::detector::{DetectorState, OverlayEffect};
use crate::heuristic::analyze;
use crate::inspector::UiInspector;
use crate::overlay::{OverlayController, OverlayPresenter};
use crate::settings::{SettingsStore, blocking_enabled};
use crate::targets::TargetRegistry;
use crate::timer::{TimerFired, TimerQueue, TimerTag};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiEventKind {
    /// A window appeared or changed; the screen may be entirely different.
    WindowStateChanged,
    /// Something inside the current window changed.
    ContentChanged,
}

/// UI-change notification for the foreground app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiEvent {
    #[serde(default)]
    pub package: Option<String>,
    pub kind: UiEventKind,
}

impl UiEvent {
    pub fn new(package: impl Into<String>, kind: UiEventKind) -> Self {
        Self {
            package: Some(package.into()),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Toggle { enabled: bool },
    /// The OS interrupted feedback; drop any overlay and start over.
    Interrupt,
    Stop,
}

/// Inter-process directive sent by the control UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Directive {
    #[serde(rename = "TOGGLE_BLOCKING")]
    ToggleBlocking { enabled: bool },
}

impl Directive {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid control directive")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to encode control directive")
    }
}

impl From<Directive> for ControlCommand {
    fn from(directive: Directive) -> Self {
        match directive {
            Directive::ToggleBlocking { enabled } => ControlCommand::Toggle { enabled },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceInput {
    Ui(UiEvent),
    Command(ControlCommand),
}

#[derive(Debug, Clone)]
pub enum ServiceEvent {
    Started {
        enabled: bool,
    },
    AppEntered {
        app: String,
    },
    AppLeft {
        app: String,
    },
    Evaluated {
        app: String,
        short_form: bool,
        detection_count: u32,
    },
    Blocked {
        app: String,
        message: String,
        at: DateTime<Utc>,
    },
    Unblocked {
        app: String,
        at: DateTime<Utc>,
    },
    OverlayExpired {
        app: String,
    },
    Toggled {
        enabled: bool,
    },
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceSummary {
    pub evaluations: u64,
    pub blocks: u64,
    pub unblocks: u64,
    /// Timer ticks dropped because they were superseded or their app left the foreground.
    /// Immediate evaluations skipped for the same reason are not ticks and are not counted.
    pub discarded_ticks: u64,
}

enum Next {
    Input(Option<ServiceInput>),
    Timer(TimerFired),
}

/// Single-task dispatcher: owns the detection state, the overlay and all timers.
pub struct DetectionService {
    config: GuardConfig,
    registry: TargetRegistry,
    inspector: Arc<dyn UiInspector>,
    overlay: OverlayController,
    state: DetectorState,
    enabled: bool,
    timers: TimerQueue,
    timer_rx: Option<UnboundedReceiver<TimerFired>>,
    event_tx: Option<UnboundedSender<ServiceEvent>>,
    summary: ServiceSummary,
}

impl DetectionService {
    /// Build a service; the enablement flag is read from `settings` once, here.
    pub fn new(
        config: GuardConfig,
        inspector: Arc<dyn UiInspector>,
        presenter: Arc<dyn OverlayPresenter>,
        settings: &dyn SettingsStore,
    ) -> Result<Self> {
        config.validate()?;
        let enabled = blocking_enabled(settings).context("failed to read blocking flag")?;
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        Ok(Self {
            registry: config.registry(),
            state: DetectorState::new(config.detection.required_detections),
            config,
            inspector,
            overlay: OverlayController::new(presenter),
            enabled,
            timers: TimerQueue::new(timer_tx),
            timer_rx: Some(timer_rx),
            event_tx: None,
            summary: ServiceSummary::default(),
        })
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay.is_visible()
    }

    pub fn summary(&self) -> ServiceSummary {
        self.summary
    }

    /// Process inputs and timer ticks until `Stop` arrives or every input sender is dropped.
    pub async fn run(
        mut self,
        mut input_rx: UnboundedReceiver<ServiceInput>,
        event_tx: Option<UnboundedSender<ServiceEvent>>,
    ) -> Result<ServiceSummary> {
        let Some(mut timer_rx) = self.timer_rx.take() else {
            bail!("detection service already ran");
        };
        self.event_tx = event_tx;
        info!(enabled = self.enabled, "detection service started");
        self.emit(ServiceEvent::Started {
            enabled: self.enabled,
        });

        loop {
            let next = tokio::select! {
                input = input_rx.recv() => Next::Input(input),
                Some(fired) = timer_rx.recv() => Next::Timer(fired),
            };

            match next {
                Next::Input(Some(input)) => {
                    if self.handle_input(input).await {
                        break;
                    }
                }
                Next::Input(None) => {
                    debug!("input channel closed");
                    break;
                }
                Next::Timer(fired) => self.handle_timer(fired).await,
            }
        }

        self.clear_state();
        info!(summary = ?self.summary, "detection service stopped");
        self.emit(ServiceEvent::Stopped);
        Ok(self.summary)
    }

    /// Returns true when the service should stop.
    pub async fn handle_input(&mut self, input: ServiceInput) -> bool {
        match input {
            ServiceInput::Ui(event) => {
                self.handle_ui_event(event).await;
                false
            }
            ServiceInput::Command(command) => self.handle_command(command),
        }
    }

    fn handle_command(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::Toggle { enabled } => {
                self.enabled = enabled;
                info!(enabled, "blocking toggled");
                if !enabled {
                    self.clear_state();
                }
                self.emit(ServiceEvent::Toggled { enabled });
                false
            }
            ControlCommand::Interrupt => {
                debug!("service interrupted");
                self.clear_state();
                false
            }
            ControlCommand::Stop => true,
        }
    }

    async fn handle_ui_event(&mut self, event: UiEvent) {
        if !self.enabled {
            return;
        }

        let Some(package) = event
            .package
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        else {
            debug!(kind = ?event.kind, "ignoring event without a package");
            return;
        };

        // The overlay's own window must not read as leaving the target app.
        if self.config.apps.is_ignored(package) {
            debug!(package, "ignoring event from an ignored package");
            return;
        }

        if !self.registry.contains(package) {
            if self.state.in_target_app() {
                info!(next = package, "left target apps");
                self.clear_state();
            }
            return;
        }

        if self.state.current_app() != package {
            self.clear_state();
            self.state.enter_app(package);
            info!(app = package, "entered target app");
            self.emit(ServiceEvent::AppEntered {
                app: package.to_string(),
            });

            if self.config.detection.cadence == Cadence::Poll {
                self.timers
                    .schedule_after(self.config.detection.poll_interval, TimerTag::Poll, package);
            }
        }

        if self.config.detection.cadence != Cadence::Events {
            return;
        }

        let delay = match event.kind {
            UiEventKind::WindowStateChanged => self.config.detection.window_change_delay,
            UiEventKind::ContentChanged => self.config.detection.content_debounce,
        };
        if delay.is_zero() {
            self.timers.cancel_tag(TimerTag::Evaluate);
            let package = package.to_string();
            if self.in_foreground(&package).await {
                self.evaluate(&package).await;
            }
        } else {
            self.timers.schedule_after(delay, TimerTag::Evaluate, package);
        }
    }

    pub async fn handle_timer(&mut self, fired: TimerFired) {
        if !self.timers.claim(&fired) {
            self.summary.discarded_ticks += 1;
            debug!(tag = ?fired.tag, "dropping superseded timer tick");
            return;
        }
        if !self.enabled || fired.app != self.state.current_app() {
            self.summary.discarded_ticks += 1;
            debug!(tag = ?fired.tag, app = %fired.app, "dropping tick for an app no longer tracked");
            return;
        }

        match fired.tag {
            TimerTag::Evaluate | TimerTag::Poll => {
                if self.in_foreground(&fired.app).await {
                    self.evaluate(&fired.app).await;
                } else {
                    self.summary.discarded_ticks += 1;
                }
                if fired.tag == TimerTag::Poll && self.state.current_app() == fired.app {
                    self.timers.schedule_after(
                        self.config.detection.poll_interval,
                        TimerTag::Poll,
                        &fired.app,
                    );
                }
            }
            TimerTag::AutoHide => {
                if self.overlay.hide() {
                    debug!(app = %fired.app, "overlay auto-hidden");
                    self.emit(ServiceEvent::OverlayExpired { app: fired.app });
                }
            }
        }
    }

    /// False when the OS reports another app in front; it may have switched without telling us yet.
    /// An unknown foreground app counts as still in front.
    async fn in_foreground(&self, app: &str) -> bool {
        let timeout = self.config.detection.snapshot_timeout;
        match tokio::time::timeout(timeout, self.inspector.foreground_app()).await {
            Ok(Some(foreground)) if foreground != app => {
                debug!(app, foreground = %foreground, "skipping evaluation, app not in foreground");
                false
            }
            _ => true,
        }
    }

    async fn evaluate(&mut self, app: &str) {
        let timeout = self.config.detection.snapshot_timeout;
        let root = match tokio::time::timeout(timeout, self.inspector.snapshot()).await {
            Ok(Some(root)) => root,
            Ok(None) => {
                debug!(app, "no window snapshot available");
                return;
            }
            Err(_) => {
                debug!(app, "window snapshot timed out");
                return;
            }
        };

        let Some(target) = self.registry.get(app) else {
            return;
        };
        let report = analyze(&root, target);
        let message = target.block_message();
        debug!(
            app,
            short_form_present = report.short_form_present,
            safe_screens = ?report.safe_screens,
            "screen analysis"
        );

        let short_form = report.is_short_form();
        self.summary.evaluations += 1;
        let effect = self.state.record(short_form, &message);
        self.emit(ServiceEvent::Evaluated {
            app: app.to_string(),
            short_form,
            detection_count: self.state.detection_count(),
        });

        match effect {
            Some(OverlayEffect::Show(message)) => {
                self.summary.blocks += 1;
                info!(app, "short-form content blocked");
                let shown = self.overlay.show(&message);
                if shown && self.config.overlay.mode == OverlayMode::Timed {
                    self.timers.schedule_after(
                        self.config.overlay.auto_hide_after,
                        TimerTag::AutoHide,
                        app,
                    );
                }
                self.emit(ServiceEvent::Blocked {
                    app: app.to_string(),
                    message,
                    at: Utc::now(),
                });
            }
            Some(OverlayEffect::Hide) => {
                self.summary.unblocks += 1;
                info!(app, "short-form content left, unblocked");
                self.timers.cancel_tag(TimerTag::AutoHide);
                self.overlay.hide();
                self.emit(ServiceEvent::Unblocked {
                    app: app.to_string(),
                    at: Utc::now(),
                });
            }
            None => {}
        }
    }

    fn clear_state(&mut self) {
        self.timers.cancel_all();
        let left = self.state.current_app().to_string();
        let effect = self.state.reset();
        self.overlay.apply(&effect);
        if !left.is_empty() {
            self.emit(ServiceEvent::AppLeft { app: left });
        }
    }

    fn emit(&self, event: ServiceEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    #[cfg(test)]
    async fn fire_next_timer(&mut self) -> bool {
        let fired = match self.timer_rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };
        match fired {
            Some(fired) => {
                self.handle_timer(fired).await;
                true
            }
            None => false,
        }
    }
}
