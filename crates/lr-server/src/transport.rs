//! Push-server collaborator contract.
//!
//! The transport itself (accepting connections, framing, handshakes) lives
//! outside this crate. A transport implements [`PushServer`] and reports bind
//! outcomes and runtime failures through the [`TransportHooks`] it receives
//! when constructed.
//!
//! # Hook states
//!
//! ```text
//!            begin_listen            listening() / error()
//!   Idle ───────────────► Pending ─────────────────────────► Settled
//!     ▲                                                         │
//!     └──────────────────────── finish_listen ──────────────────┘
//! ```
//!
//! While `Pending`, the first `listening()` or `error()` settles the pending
//! listen. In any other state `error()` goes to the permanent handler and
//! `listening()` is ignored. An error that settles a listen nobody is waiting
//! on anymore also goes to the permanent handler.

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::oneshot;

/// Payload delivered to connected clients when files change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChangedPayload {
    /// Message body.
    pub body: ChangedBody,
}

/// Body of a [`ChangedPayload`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChangedBody {
    /// Labels of the changed files.
    pub files: Vec<String>,
}

impl ChangedPayload {
    /// Create a payload naming `files`.
    #[must_use]
    pub fn new(files: Vec<String>) -> Self {
        Self {
            body: ChangedBody { files },
        }
    }
}

/// Transport-level failure (bind failure, socket error).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string()).with_source(err)
    }
}

/// Underlying push-protocol server.
pub trait PushServer: Send {
    /// Start binding to `port`.
    ///
    /// Completion is reported through [`TransportHooks::listening`], failure
    /// through [`TransportHooks::error`]. Either may be called before this
    /// method returns.
    fn listen(&mut self, port: u16);

    /// Deliver `payload` to every connected client.
    ///
    /// Fire-and-forget: a transport with no clients does nothing, and delivery
    /// failures are reported through the hooks, if at all.
    fn changed(&mut self, payload: &ChangedPayload);
}

/// Permanent handler for transport errors outside a pending listen.
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

type ListenResult = Result<(), TransportError>;

enum ListenState {
    Idle,
    Pending(oneshot::Sender<ListenResult>),
    Settled,
}

impl fmt::Debug for ListenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "Idle",
            Self::Pending(_) => "Pending",
            Self::Settled => "Settled",
        })
    }
}

struct HooksInner {
    state: Mutex<ListenState>,
    on_error: Mutex<ErrorHandler>,
}

/// Callbacks a transport uses to report back to the notification server.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct TransportHooks {
    inner: Arc<HooksInner>,
}

impl fmt::Debug for TransportHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHooks")
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl TransportHooks {
    pub(crate) fn new(on_error: ErrorHandler) -> Self {
        Self {
            inner: Arc::new(HooksInner {
                state: Mutex::new(ListenState::Idle),
                on_error: Mutex::new(on_error),
            }),
        }
    }

    /// Swap the permanent error handler. Every clone sees the new handler.
    pub(crate) fn set_error_handler(&self, handler: ErrorHandler) {
        *self
            .inner
            .on_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// Report that the server is bound and accepting connections.
    pub fn listening(&self) {
        if let Some(tx) = self.settle() {
            let _ = tx.send(Ok(()));
        } else {
            tracing::trace!("Ignoring listening signal outside a pending listen");
        }
    }

    /// Report a transport error.
    ///
    /// Rejects the pending listen if there is one, otherwise forwards to the
    /// permanent error handler.
    pub fn error(&self, err: TransportError) {
        match self.settle() {
            Some(tx) => {
                if let Err(Err(err)) = tx.send(Err(err)) {
                    self.forward(&err);
                }
            }
            None => self.forward(&err),
        }
    }

    /// Whether a listen is waiting for its outcome.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(*self.lock(), ListenState::Pending(_))
    }

    /// Enter `Pending` and return the receiver for the outcome.
    pub(crate) fn begin_listen(&self) -> oneshot::Receiver<ListenResult> {
        let (tx, rx) = oneshot::channel();
        let previous = std::mem::replace(&mut *self.lock(), ListenState::Pending(tx));
        if matches!(previous, ListenState::Pending(_)) {
            tracing::debug!("Replacing abandoned pending listen");
        }
        rx
    }

    /// Return to `Idle` once the listen call has its outcome.
    pub(crate) fn finish_listen(&self) {
        *self.lock() = ListenState::Idle;
    }

    fn forward(&self, err: &TransportError) {
        // Clone out so a handler may swap itself without deadlocking
        let handler = Arc::clone(
            &self
                .inner
                .on_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        handler(err);
    }

    /// Take the pending sender, moving to `Settled`. `None` if not pending.
    fn settle(&self) -> Option<oneshot::Sender<ListenResult>> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, ListenState::Settled) {
            ListenState::Pending(tx) => Some(tx),
            other => {
                *state = other;
                None
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListenState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
