//! Notification server.
//!
//! Owns the single push-server instance for a controller. The instance is
//! built on first use and kept for the controller's lifetime.

use std::fmt;
use std::sync::Arc;

use crate::transport::{ChangedPayload, ErrorHandler, PushServer, TransportError, TransportHooks};

type ServerFactory = Box<dyn FnMut(TransportHooks) -> Box<dyn PushServer> + Send>;

/// Lazily constructed push server plus its transport hooks.
pub struct NotificationServer {
    factory: ServerFactory,
    instance: Option<Box<dyn PushServer>>,
    hooks: TransportHooks,
}

impl fmt::Debug for NotificationServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationServer")
            .field("created", &self.instance.is_some())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl NotificationServer {
    /// Create a notification server that builds its transport with `factory`.
    ///
    /// The factory runs at most once, on first use. Transport errors outside a
    /// pending listen are logged; see [`with_error_handler`](Self::with_error_handler).
    pub fn new<F, S>(mut factory: F) -> Self
    where
        F: FnMut(TransportHooks) -> S + Send + 'static,
        S: PushServer + 'static,
    {
        Self {
            factory: Box::new(move |hooks| -> Box<dyn PushServer> { Box::new(factory(hooks)) }),
            instance: None,
            hooks: TransportHooks::new(Arc::new(log_transport_error)),
        }
    }

    /// Replace the permanent transport error handler.
    ///
    /// Takes effect for an already built transport too, since it shares the
    /// same hooks.
    #[must_use]
    pub fn with_error_handler(
        self,
        handler: impl Fn(&TransportError) + Send + Sync + 'static,
    ) -> Self {
        let handler: ErrorHandler = Arc::new(handler);
        self.hooks.set_error_handler(handler);
        self
    }

    /// Return the push server, building it on first call.
    pub fn server(&mut self) -> &mut dyn PushServer {
        let instance = self
            .instance
            .get_or_insert_with(|| (self.factory)(self.hooks.clone()));
        instance.as_mut()
    }

    /// Whether the push server has been built.
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.instance.is_some()
    }

    /// Bind the push server to `port`.
    ///
    /// Resolves once the transport reports either success or an error,
    /// whichever comes first. There is no timeout. Dropping the future
    /// before it resolves returns the hooks to idle, so later transport
    /// errors reach the permanent handler.
    pub async fn listen(&mut self, port: u16) -> Result<(), TransportError> {
        let pending = self.hooks.begin_listen();
        let _guard = FinishListen(self.hooks.clone());
        self.server().listen(port);

        pending
            .await
            .unwrap_or_else(|_| Err(TransportError::new("listen abandoned by transport")))
    }

    /// Tell connected clients that `changed_files` changed.
    pub fn broadcast(&mut self, changed_files: &[String]) {
        let payload = ChangedPayload::new(changed_files.to_vec());
        self.server().changed(&payload);
    }
}

/// Ends the pending listen when `listen` completes or is cancelled.
struct FinishListen(TransportHooks);

impl Drop for FinishListen {
    fn drop(&mut self) {
        self.0.finish_listen();
    }
}

fn log_transport_error(err: &TransportError) {
    tracing::error!(error = %err, "Live reload transport error");
}
