//! Watcher event types and the subscription interface.
//!
//! A [`WatchSource`] hands out subscriptions; each subscription is a channel
//! that yields [`WatchEvent`]s one at a time, in the order the watcher emitted
//! them.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

/// A file changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Changed file. May be empty when the watcher could not name it.
    pub file_path: PathBuf,
}

impl ChangeEvent {
    /// Create a change event for `file_path`.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

/// The watcher hit an error. Never fatal to the controller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Human readable description.
    pub message: Option<String>,
    /// Diagnostic detail, printed on its own line.
    pub stack: Option<String>,
}

impl ErrorEvent {
    /// Create an error event with only a message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            stack: None,
        }
    }

    /// Attach diagnostic detail.
    #[must_use]
    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Message and stack joined by a space, for error telemetry.
    pub(crate) fn description(&self) -> String {
        [self.message.as_deref(), self.stack.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.stack) {
            (Some(message), _) => f.write_str(message),
            (None, Some(_)) => f.write_str("Watcher error"),
            (None, None) => f.write_str("Unknown watcher error"),
        }
    }
}

/// Event delivered over a watcher subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file changed.
    Change(ChangeEvent),
    /// The watcher reported an error.
    Error(ErrorEvent),
}

/// Receiving half of a watcher subscription.
///
/// Wraps a [`tokio::sync::mpsc::UnboundedReceiver`]. Yields `None` once the
/// watcher drops its sender.
#[derive(Debug)]
pub struct WatchEventReceiver {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl WatchEventReceiver {
    /// Wrap a channel receiver.
    pub fn new(rx: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        Self { rx }
    }

    /// Create a connected sender/receiver pair.
    pub fn channel() -> (mpsc::UnboundedSender<WatchEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<WatchEvent> {
        self.rx.try_recv().ok()
    }
}

/// Source of watcher events.
pub trait WatchSource: Send {
    /// Register a new listener for change and error events.
    fn subscribe(&mut self) -> WatchEventReceiver;
}
