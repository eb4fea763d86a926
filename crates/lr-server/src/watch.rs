//! Filesystem watcher adapter.
//!
//! Bridges the `notify` crate to the [`WatchSource`] subscription interface.
//! Watching is entirely `notify`'s; this only converts its events.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::event::{ChangeEvent, ErrorEvent, WatchEvent, WatchEventReceiver, WatchSource};

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<WatchEvent>>>>;

/// Recursive watcher on a project directory.
///
/// Watching starts on construction and stops when the source is dropped.
/// Events seen before the first `subscribe` are not replayed.
pub struct FsWatchSource {
    subscribers: Subscribers,
    _watcher: RecommendedWatcher,
}

impl FsWatchSource {
    /// Start watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the platform watcher cannot be created or
    /// cannot attach to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WatchError> {
        let root = root.into();
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&subscribers);

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                for event in events_from_notify(res) {
                    publish(&sink, &event);
                }
            })
            .map_err(WatchError::Create)?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Watch {
                path: root.clone(),
                source,
            })?;

        tracing::debug!(root = %root.display(), "Watching for changes");

        Ok(Self {
            subscribers,
            _watcher: watcher,
        })
    }
}

impl WatchSource for FsWatchSource {
    fn subscribe(&mut self) -> WatchEventReceiver {
        let (tx, rx) = WatchEventReceiver::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

/// Send `event` to every subscriber, dropping those that hung up.
fn publish(subscribers: &Subscribers, event: &WatchEvent) {
    subscribers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|tx| tx.send(event.clone()).is_ok());
}

/// Convert one `notify` callback result into watch events.
///
/// Create, modify and remove events yield one change per path; other kinds
/// (access, metadata-less "other") are dropped.
fn events_from_notify(res: Result<notify::Event, notify::Error>) -> Vec<WatchEvent> {
    match res {
        Ok(event) => match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event
                .paths
                .into_iter()
                .map(|path| WatchEvent::Change(ChangeEvent::new(path)))
                .collect(),
            _ => Vec::new(),
        },
        Err(err) => vec![WatchEvent::Error(ErrorEvent {
            message: Some(err.to_string()),
            stack: Some(format!("{err:?}")),
        })],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_modify_event_yields_change_per_path() {
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/project/a.js"))
            .add_path(PathBuf::from("/project/b.js"));

        let events = events_from_notify(Ok(event));

        assert_eq!(
            events,
            vec![
                WatchEvent::Change(ChangeEvent::new("/project/a.js")),
                WatchEvent::Change(ChangeEvent::new("/project/b.js")),
            ]
        );
    }

    #[test]
    fn test_create_event_yields_change() {
        let event = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/project/new.css"));

        assert_eq!(events_from_notify(Ok(event)).len(), 1);
    }

    #[test]
    fn test_access_event_is_dropped() {
        let event = notify::Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/project/a.js"));

        assert!(events_from_notify(Ok(event)).is_empty());
    }

    #[test]
    fn test_notify_error_becomes_error_event() {
        let err = notify::Error::generic("inotify limit reached");

        let events = events_from_notify(Err(err));

        assert_eq!(events.len(), 1);
        let WatchEvent::Error(error) = &events[0] else {
            panic!("expected error event, got {events:?}");
        };
        assert_eq!(error.message.as_deref(), Some("inotify limit reached"));
        assert!(error.stack.is_some());
    }

    #[test]
    fn test_publish_prunes_closed_subscribers() {
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let (open_tx, mut open_rx) = WatchEventReceiver::channel();
        let (closed_tx, closed_rx) = WatchEventReceiver::channel();
        drop(closed_rx);
        subscribers.lock().unwrap().extend([open_tx, closed_tx]);

        publish(&subscribers, &WatchEvent::Change(ChangeEvent::new("/x")));

        assert_eq!(subscribers.lock().unwrap().len(), 1);
        assert_eq!(
            open_rx.try_recv(),
            Some(WatchEvent::Change(ChangeEvent::new("/x")))
        );
    }

    #[test]
    fn test_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = FsWatchSource::new(&missing).err().unwrap();
        assert!(matches!(err, WatchError::Watch { ref path, .. } if *path == missing));
    }

    #[test]
    fn test_file_write_reaches_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FsWatchSource::new(dir.path()).unwrap();
        let mut rx = source.subscribe();

        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();

        let found = tokio_test::block_on(async {
            tokio::time::timeout(Duration::from_secs(5), async {
                while let Some(event) = rx.recv().await {
                    if let WatchEvent::Change(change) = event
                        && change.file_path.ends_with("index.html")
                    {
                        return true;
                    }
                }
                false
            })
            .await
        });

        assert!(matches!(found, Ok(true)), "no change event for index.html");
    }
}
