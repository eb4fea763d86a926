//! Test doubles for the controller's collaborators.
//!
//! Provides [`MockPushServer`], [`MockWatchSource`], [`RecordingUi`] and
//! [`RecordingAnalytics`] for unit testing without sockets or a real watcher.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::event::{ChangeEvent, ErrorEvent, WatchEvent, WatchEventReceiver, WatchSource};
use crate::sink::{Analytics, ErrorRecord, TrackEvent, Ui};
use crate::transport::{ChangedPayload, PushServer, TransportError, TransportHooks};

/// How [`MockPushServer::listen`] reports back.
#[derive(Clone, Debug)]
pub enum ListenOutcome {
    /// Report `listening()` immediately.
    Succeed,
    /// Report `error()` with this message immediately.
    Fail(String),
    /// Report nothing; the test drives the hooks through [`MockServerHandle`].
    Manual,
}

#[derive(Default)]
struct MockServerState {
    constructions: usize,
    listen_ports: Vec<u16>,
    payloads: Vec<ChangedPayload>,
    hooks: Option<TransportHooks>,
}

/// Inspects what the mock push servers built by one factory did.
#[derive(Clone, Default)]
pub struct MockServerHandle {
    state: Arc<Mutex<MockServerState>>,
}

impl MockServerHandle {
    /// How many servers the factory built.
    #[must_use]
    pub fn constructions(&self) -> usize {
        self.state.lock().unwrap().constructions
    }

    /// Ports passed to `listen`, in call order.
    #[must_use]
    pub fn listen_ports(&self) -> Vec<u16> {
        self.state.lock().unwrap().listen_ports.clone()
    }

    /// Payloads passed to `changed`, in call order.
    #[must_use]
    pub fn payloads(&self) -> Vec<ChangedPayload> {
        self.state.lock().unwrap().payloads.clone()
    }

    /// Hooks the most recent server was built with.
    #[must_use]
    pub fn hooks(&self) -> Option<TransportHooks> {
        self.state.lock().unwrap().hooks.clone()
    }
}

/// In-memory push server.
pub struct MockPushServer {
    hooks: TransportHooks,
    outcome: ListenOutcome,
    state: Arc<Mutex<MockServerState>>,
}

impl MockPushServer {
    /// Build a factory for [`NotificationServer::new`](crate::NotificationServer::new)
    /// and a handle to observe the servers it creates.
    pub fn factory(
        outcome: ListenOutcome,
    ) -> (
        impl FnMut(TransportHooks) -> Self + Send + 'static,
        MockServerHandle,
    ) {
        let handle = MockServerHandle::default();
        let state = Arc::clone(&handle.state);
        let factory = move |hooks: TransportHooks| {
            let mut guard = state.lock().unwrap();
            guard.constructions += 1;
            guard.hooks = Some(hooks.clone());
            drop(guard);
            Self {
                hooks,
                outcome: outcome.clone(),
                state: Arc::clone(&state),
            }
        };
        (factory, handle)
    }
}

impl PushServer for MockPushServer {
    fn listen(&mut self, port: u16) {
        self.state.lock().unwrap().listen_ports.push(port);
        match &self.outcome {
            ListenOutcome::Succeed => self.hooks.listening(),
            ListenOutcome::Fail(message) => self.hooks.error(TransportError::new(message.clone())),
            ListenOutcome::Manual => {}
        }
    }

    fn changed(&mut self, payload: &ChangedPayload) {
        self.state.lock().unwrap().payloads.push(payload.clone());
    }
}

#[derive(Default)]
struct MockWatchState {
    subscriptions: usize,
    senders: Vec<mpsc::UnboundedSender<WatchEvent>>,
}

/// Watcher whose events are emitted by the test.
#[derive(Clone, Default)]
pub struct MockWatchSource {
    state: Arc<Mutex<MockWatchState>>,
}

impl MockWatchSource {
    /// Create a mock watcher with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `subscribe` calls so far.
    #[must_use]
    pub fn subscriptions(&self) -> usize {
        self.state.lock().unwrap().subscriptions
    }

    /// Send `event` to every live subscriber.
    pub fn emit(&self, event: WatchEvent) {
        self.state
            .lock()
            .unwrap()
            .senders
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Emit a change event for `path`.
    pub fn change(&self, path: impl Into<PathBuf>) {
        self.emit(WatchEvent::Change(ChangeEvent::new(path)));
    }

    /// Emit an error event.
    pub fn error(&self, error: ErrorEvent) {
        self.emit(WatchEvent::Error(error));
    }
}

impl WatchSource for MockWatchSource {
    fn subscribe(&mut self) -> WatchEventReceiver {
        let (tx, rx) = WatchEventReceiver::channel();
        let mut state = self.state.lock().unwrap();
        state.subscriptions += 1;
        state.senders.push(tx);
        rx
    }
}

/// A line written to [`RecordingUi`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UiLine {
    /// Text as written, without styling.
    pub text: String,
    /// Whether it was written as an error.
    pub error: bool,
}

/// UI sink that keeps every line.
#[derive(Default)]
pub struct RecordingUi {
    lines: Mutex<Vec<UiLine>>,
}

impl RecordingUi {
    /// Lines written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<UiLine> {
        self.lines.lock().unwrap().clone()
    }
}

impl Ui for RecordingUi {
    fn write_line(&self, text: &str) {
        self.lines.lock().unwrap().push(UiLine {
            text: text.to_owned(),
            error: false,
        });
    }

    fn write_error_line(&self, text: &str) {
        self.lines.lock().unwrap().push(UiLine {
            text: text.to_owned(),
            error: true,
        });
    }
}

/// Analytics sink that keeps every record.
#[derive(Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<TrackEvent>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl RecordingAnalytics {
    /// Events tracked so far.
    #[must_use]
    pub fn events(&self) -> Vec<TrackEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Error records tracked so far.
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.lock().unwrap().clone()
    }
}

impl Analytics for RecordingAnalytics {
    fn track(&self, event: &TrackEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn track_error(&self, record: &ErrorRecord) {
        self.errors.lock().unwrap().push(record.clone());
    }
}
