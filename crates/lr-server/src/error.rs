//! Error types for the live reload server.

use std::path::PathBuf;

/// Live reload server could not bind its port.
///
/// This is a user-facing error: its message is meant to be shown as-is, and it
/// deliberately carries no source so the transport's internals never reach the
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Livereload failed on port {port}.  It is either in use or you do not have permission.")]
pub struct StartupError {
    port: u16,
}

impl StartupError {
    pub(crate) fn new(port: u16) -> Self {
        Self { port }
    }

    /// Port that failed to bind.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// A filter pattern from configuration is not a valid regular expression.
#[derive(Debug, thiserror::Error)]
#[error("Invalid live reload filter pattern {pattern:?}: {source}")]
pub struct PatternError {
    pattern: String,
    #[source]
    source: regex::Error,
}

impl PatternError {
    pub(crate) fn new(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self {
            pattern: pattern.into(),
            source,
        }
    }

    /// The pattern that failed to compile.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Failure to set up a filesystem watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The platform watcher could not be created.
    #[error("Failed to create file watcher: {0}")]
    Create(#[source] notify::Error),
    /// The watcher could not attach to the given directory.
    #[error("Failed to watch {}: {source}", path.display())]
    Watch {
        /// Directory that could not be watched.
        path: PathBuf,
        /// Underlying watcher error.
        #[source]
        source: notify::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_startup_error_message() {
        let err = StartupError::new(35729);
        assert_eq!(
            err.to_string(),
            "Livereload failed on port 35729.  It is either in use or you do not have permission."
        );
        assert_eq!(err.port(), 35729);
    }

    #[test]
    fn test_startup_error_has_no_source() {
        assert!(StartupError::new(4200).source().is_none());
    }

    #[test]
    fn test_pattern_error_names_pattern() {
        let source = regex::Regex::new("(unclosed").unwrap_err();
        let err = PatternError::new("(unclosed", source);

        assert_eq!(err.pattern(), "(unclosed");
        assert!(err.to_string().contains("\"(unclosed\""));
        assert!(err.source().is_some());
    }
}
