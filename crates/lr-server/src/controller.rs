//! Reload controller.
//!
//! Ties the watcher, the filter and the notification server together:
//! `start` brings the server up, then each watcher event is either turned
//! into a reload broadcast or reported as an error.
//!
//! # States
//!
//! ```text
//! Idle ──start(disabled)──► Disabled
//!   │
//!   └──start(enabled)──► Starting ──listen ok──► Listening
//!                           │
//!                           └──listen err──► Failed
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use lr_config::{Config, LiveReloadConfig};

use crate::error::{PatternError, StartupError};
use crate::event::{ChangeEvent, ErrorEvent, WatchEvent, WatchEventReceiver, WatchSource};
use crate::filter::{FilterPatternSet, relative_to};
use crate::notification::NotificationServer;
use crate::sink::{Analytics, ConsoleUi, ErrorRecord, TrackEvent, TracingAnalytics, Ui};
use crate::transport::{PushServer, TransportHooks};

/// Message returned by `start` when live reload is turned off.
pub const DISABLED_MESSAGE: &str = "Livereload server manually disabled.";

/// File label sent with every reload broadcast.
pub const LIVE_RELOAD_FILES: &str = "LiveReload files";

/// Analytics event name for reloads.
const TRACK_NAME: &str = "broccoli watcher";

/// Analytics event message for reloads.
const TRACK_MESSAGE: &str = "live-reload";

/// Input to [`ReloadController::start`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartOptions {
    /// Whether to run the notification server at all.
    pub live_reload: bool,
    /// Port to bind.
    pub live_reload_port: u16,
}

impl From<&LiveReloadConfig> for StartOptions {
    fn from(config: &LiveReloadConfig) -> Self {
        Self {
            live_reload: config.enabled,
            live_reload_port: config.port,
        }
    }
}

/// Lifecycle state of a [`ReloadController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Not started yet.
    Idle,
    /// Started with live reload turned off.
    Disabled,
    /// Waiting for the server to bind.
    Starting,
    /// Server bound; watcher events are being handled.
    Listening,
    /// Server failed to bind.
    Failed,
}

/// Decides which changes trigger a reload and drives the notification server.
pub struct ReloadController {
    project_root: PathBuf,
    filter: FilterPatternSet,
    server: NotificationServer,
    watcher: Box<dyn WatchSource>,
    ui: Arc<dyn Ui>,
    analytics: Arc<dyn Analytics>,
    events: Option<WatchEventReceiver>,
    state: ControllerState,
    port: Option<u16>,
}

impl ReloadController {
    /// Create a controller.
    ///
    /// Output goes to [`ConsoleUi`] and analytics to [`TracingAnalytics`]
    /// unless replaced with [`with_ui`](Self::with_ui) and
    /// [`with_analytics`](Self::with_analytics).
    pub fn new(
        project_root: impl Into<PathBuf>,
        filter: FilterPatternSet,
        server: NotificationServer,
        watcher: impl WatchSource + 'static,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            filter,
            server,
            watcher: Box::new(watcher),
            ui: Arc::new(ConsoleUi::new()),
            analytics: Arc::new(TracingAnalytics),
            events: None,
            state: ControllerState::Idle,
            port: None,
        }
    }

    /// Replace the UI sink.
    #[must_use]
    pub fn with_ui(mut self, ui: Arc<dyn Ui>) -> Self {
        self.ui = ui;
        self
    }

    /// Replace the analytics sink.
    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn Analytics>) -> Self {
        self.analytics = analytics;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The notification server.
    pub fn server(&mut self) -> &mut NotificationServer {
        &mut self.server
    }

    /// Start live reload.
    ///
    /// Subscribes to the watcher, then binds the notification server. Returns
    /// the startup banner, or [`DISABLED_MESSAGE`] without touching the watcher
    /// or the server when `options.live_reload` is false.
    ///
    /// Calling `start` again while listening returns the banner without
    /// rebinding. Disabling a listening controller returns
    /// [`DISABLED_MESSAGE`] and keeps it listening.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the port cannot be bound.
    pub async fn start(&mut self, options: &StartOptions) -> Result<String, StartupError> {
        if !options.live_reload {
            // A running server is left alone; only an unstarted controller
            // becomes disabled
            if self.state == ControllerState::Listening {
                tracing::debug!("Live reload already listening, disable ignored");
            } else {
                self.state = ControllerState::Disabled;
                tracing::info!("Live reload disabled");
            }
            return Ok(DISABLED_MESSAGE.to_owned());
        }

        let port = options.live_reload_port;
        if self.state == ControllerState::Listening
            && let Some(bound) = self.port
        {
            tracing::debug!(port = bound, "Live reload already listening");
            return Ok(banner(bound));
        }

        self.state = ControllerState::Starting;
        self.events = Some(self.watcher.subscribe());

        match self.server.listen(port).await {
            Ok(()) => {
                self.state = ControllerState::Listening;
                self.port = Some(port);
                let banner = banner(port);
                self.ui.write_line(&banner);
                tracing::info!(port, "Live reload server listening");
                Ok(banner)
            }
            Err(err) => {
                self.state = ControllerState::Failed;
                self.events = None;
                tracing::debug!(port, error = %err, "Live reload server failed to bind");
                Err(StartupError::new(port))
            }
        }
    }

    /// Handle a change event. Returns whether a reload was broadcast.
    pub fn did_change(&mut self, event: &ChangeEvent) -> bool {
        let relative = relative_to(&self.project_root, &event.file_path);

        if !self.filter.should_trigger(&relative) {
            tracing::debug!(path = %relative, "Change filtered, no reload");
            return false;
        }

        self.server.broadcast(&[LIVE_RELOAD_FILES.to_owned()]);
        self.analytics.track(&TrackEvent {
            name: TRACK_NAME.to_owned(),
            message: TRACK_MESSAGE.to_owned(),
        });
        tracing::debug!(path = %relative, "Reload broadcast");
        true
    }

    /// Report a watcher error to the UI and analytics. Never fails.
    pub fn did_error(&self, error: &ErrorEvent) {
        match &error.message {
            Some(message) => self.ui.write_error_line(message),
            None => self.ui.write_error_line(&error.to_string()),
        }
        if let Some(stack) = &error.stack {
            self.ui.write_line(stack);
        }

        self.analytics.track_error(&ErrorRecord {
            description: error.description(),
            is_fatal: false,
        });
        tracing::warn!(error = %error, "Watcher error");
    }

    /// Route a watcher event to [`did_change`](Self::did_change) or
    /// [`did_error`](Self::did_error).
    pub fn dispatch(&mut self, event: &WatchEvent) {
        match event {
            WatchEvent::Change(change) => {
                self.did_change(change);
            }
            WatchEvent::Error(error) => self.did_error(error),
        }
    }

    /// Handle every queued watcher event without waiting.
    ///
    /// Returns the number of events handled.
    pub fn drain_pending(&mut self) -> usize {
        let Some(mut events) = self.events.take() else {
            return 0;
        };

        let mut handled = 0;
        while let Some(event) = events.try_recv() {
            self.dispatch(&event);
            handled += 1;
        }

        self.events = Some(events);
        handled
    }

    /// Handle watcher events as they arrive until the watcher closes.
    ///
    /// Returns immediately if `start` has not subscribed to the watcher.
    pub async fn run(&mut self) {
        let Some(mut events) = self.events.take() else {
            return;
        };

        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }

        tracing::debug!("Watcher closed, live reload stopped");
    }
}

fn banner(port: u16) -> String {
    format!("Livereload server on port {port}")
}

/// Build a controller and its start options from configuration.
///
/// # Errors
///
/// Returns [`PatternError`] if a configured filter pattern is not a valid
/// regular expression.
pub fn controller_from_config<F, S>(
    config: &Config,
    factory: F,
    watcher: impl WatchSource + 'static,
) -> Result<(ReloadController, StartOptions), PatternError>
where
    F: FnMut(TransportHooks) -> S + Send + 'static,
    S: PushServer + 'static,
{
    let filter = FilterPatternSet::new(&config.live_reload.filter_patterns)?;
    let controller = ReloadController::new(
        config.project_resolved.root.clone(),
        filter,
        NotificationServer::new(factory),
        watcher,
    );
    Ok((controller, StartOptions::from(&config.live_reload)))
}
