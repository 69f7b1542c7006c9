//! Change event types.
//!
//! Provides types for subscribing to store changes through
//! [`DocumentStore::watch`](crate::DocumentStore::watch). A render host diffs
//! these events against the dependency set of its last render to decide
//! whether a re-render is needed.

use std::sync::mpsc;

/// Kind of document change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEventKind {
    /// Document content was written (also used for newly created documents).
    Modified,
    /// Document was moved; the event path is the new location.
    Renamed {
        /// Store path before the rename.
        from: String,
    },
    /// Document was deleted.
    Deleted,
}

/// A document change event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Store path of the affected document (e.g., "guide/intro.adoc").
    pub path: String,
    /// Kind of change.
    pub kind: ChangeEventKind,
}

impl ChangeEvent {
    /// Create a `Modified` event.
    #[must_use]
    pub fn modified(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeEventKind::Modified,
        }
    }

    /// Create a `Renamed` event.
    #[must_use]
    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: to.into(),
            kind: ChangeEventKind::Renamed { from: from.into() },
        }
    }

    /// Create a `Deleted` event.
    #[must_use]
    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeEventKind::Deleted,
        }
    }

    /// All store paths touched by this event.
    ///
    /// Renames touch both the old and the new location.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        let from = match &self.kind {
            ChangeEventKind::Renamed { from } => Some(from.as_str()),
            _ => None,
        };
        std::iter::once(self.path.as_str()).chain(from)
    }
}

/// Receiver for change events.
///
/// Wraps a [`std::sync::mpsc::Receiver`] for synchronous event delivery.
pub struct ChangeEventReceiver {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl ChangeEventReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event (blocking).
    ///
    /// Returns `None` when the sender is dropped.
    #[must_use]
    pub fn recv(&self) -> Option<ChangeEvent> {
        self.rx.recv().ok()
    }

    /// Try to receive an event without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain every event that is already queued, without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.rx.try_iter().collect()
    }

    /// Create a no-op receiver that never yields events.
    pub(crate) fn no_op() -> Self {
        let (_tx, rx) = mpsc::channel();
        Self { rx }
    }
}

/// Handle to stop watching for changes.
///
/// Dropping the handle stops watching. Signals shutdown by dropping the
/// internal channel sender.
pub struct WatchHandle {
    _shutdown: Option<mpsc::Sender<()>>,
}

impl WatchHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>) -> Self {
        Self {
            _shutdown: Some(shutdown),
        }
    }

    /// Stop watching immediately (consumes the handle).
    pub fn stop(mut self) {
        self._shutdown.take();
    }

    pub(crate) fn no_op() -> Self {
        Self { _shutdown: None }
    }
}
