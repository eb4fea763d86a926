//! Output sinks: user-facing terminal lines and analytics.

use console::{Style, Term};
use serde::Serialize;

/// User-facing line output.
pub trait Ui: Send + Sync {
    /// Write a single line.
    fn write_line(&self, text: &str);

    /// Write a single line highlighted as an error.
    fn write_error_line(&self, text: &str) {
        self.write_line(&Style::new().red().apply_to(text).to_string());
    }
}

/// Informational analytics event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackEvent {
    /// Event name.
    pub name: String,
    /// Event detail.
    pub message: String,
}

/// Error telemetry record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Error description.
    pub description: String,
    /// Whether the error ended the process.
    #[serde(rename = "isFatal")]
    pub is_fatal: bool,
}

/// Analytics sink.
pub trait Analytics: Send + Sync {
    /// Record an informational event.
    fn track(&self, event: &TrackEvent);

    /// Record an error.
    fn track_error(&self, record: &ErrorRecord);
}

/// Terminal output on stderr.
pub struct ConsoleUi {
    term: Term,
    red: Style,
}

impl ConsoleUi {
    /// Create a UI writing to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            red: Style::new().red(),
        }
    }
}

impl Default for ConsoleUi {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui for ConsoleUi {
    fn write_line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn write_error_line(&self, text: &str) {
        let _ = self.term.write_line(&self.red.apply_to(text).to_string());
    }
}

/// Analytics sink that emits records as tracing events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn track(&self, event: &TrackEvent) {
        tracing::info!(
            target: "lr_server::analytics",
            name = %event.name,
            message = %event.message,
            "track"
        );
    }

    fn track_error(&self, record: &ErrorRecord) {
        tracing::warn!(
            target: "lr_server::analytics",
            description = %record.description,
            is_fatal = record.is_fatal,
            "track_error"
        );
    }
}
