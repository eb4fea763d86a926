//! Live reload notification server.
//!
//! Watches a stream of file change events, drops the ones matching the
//! project's filter patterns, and tells connected clients to reload.
//!
//! The push transport and the file watcher are collaborators: a transport
//! implements [`PushServer`], and any event source implements [`WatchSource`]
//! ([`FsWatchSource`] adapts the `notify` crate).
//!
//! # Quick Start
//!
//! ```ignore
//! use lr_config::Config;
//! use lr_server::{FsWatchSource, controller_from_config};
//!
//! let config = Config::load(None, None)?;
//! let watcher = FsWatchSource::new(config.project_resolved.root.clone())?;
//! let (mut controller, options) = controller_from_config(&config, MyTransport::new, watcher)?;
//!
//! let banner = controller.start(&options).await?;
//! controller.run().await;
//! ```
//!
//! # Architecture
//!
//! ```text
//! FsWatchSource ──WatchEvent──► ReloadController ──► Ui / Analytics
//!                                      │
//!                                      ├─► FilterPatternSet (suppress?)
//!                                      │
//!                                      └─► NotificationServer ──► PushServer
//!                                                  ▲                   │
//!                                                  └── TransportHooks ─┘
//! ```

mod controller;
mod error;
mod event;
mod filter;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod notification;
mod sink;
mod transport;
mod watch;

pub use controller::{
    ControllerState, DISABLED_MESSAGE, LIVE_RELOAD_FILES, ReloadController, StartOptions,
    controller_from_config,
};
pub use error::{PatternError, StartupError, WatchError};
pub use event::{ChangeEvent, ErrorEvent, WatchEvent, WatchEventReceiver, WatchSource};
pub use filter::FilterPatternSet;
pub use notification::NotificationServer;
pub use sink::{Analytics, ConsoleUi, ErrorRecord, TrackEvent, TracingAnalytics, Ui};
pub use transport::{
    ChangedBody, ChangedPayload, ErrorHandler, PushServer, TransportError, TransportHooks,
};
pub use watch::FsWatchSource;
