//! Mock store implementation for testing.
//!
//! Provides [`MockStore`] for unit testing without filesystem access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, mpsc};

use crate::event::{ChangeEvent, ChangeEventReceiver, WatchHandle};
use crate::store::{DocumentStore, StoreError};

/// In-memory document store for tests.
///
/// # Example
///
/// ```ignore
/// use docweave_storage::{DocumentStore, MockStore};
///
/// let store = MockStore::new()
///     .with_file("main.adoc", "include::part.adoc[]")
///     .with_file("part.adoc", "Part");
///
/// assert_eq!(store.read("part.adoc").unwrap(), "Part");
/// ```
#[derive(Debug, Default)]
pub struct MockStore {
    contents: RwLock<HashMap<String, String>>,
    reads: AtomicUsize,
    event_sender: RwLock<Option<mpsc::Sender<ChangeEvent>>>,
}

impl MockStore {
    /// Create a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Add or replace a document on an existing store.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        self.contents
            .write()
            .unwrap()
            .insert(path.into(), content.into());
    }

    /// Remove a document.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn remove(&self, path: &str) {
        self.contents.write().unwrap().remove(path);
    }

    /// Number of successful `read()` calls so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Emit a change event.
    ///
    /// Only delivered if `watch()` has been called first.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn emit(&self, event: ChangeEvent) {
        if let Some(sender) = self.event_sender.read().unwrap().as_ref() {
            let _ = sender.send(event);
        }
    }
}

impl DocumentStore for MockStore {
    fn read(&self, path: &str) -> Result<String, StoreError> {
        let content = self
            .contents
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::not_found(path).with_backend("Mock"))?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(content)
    }

    fn exists(&self, path: &str) -> bool {
        self.contents.read().unwrap().contains_key(path)
    }

    fn watch(&self) -> Result<(ChangeEventReceiver, WatchHandle), StoreError> {
        let (tx, rx) = mpsc::channel();
        *self.event_sender.write().unwrap() = Some(tx);
        Ok((ChangeEventReceiver::new(rx), WatchHandle::no_op()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreErrorKind;

    #[test]
    fn test_mock_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockStore>();
    }

    #[test]
    fn test_read_and_exists() {
        let store = MockStore::new().with_file("a.adoc", "A");

        assert!(store.exists("a.adoc"));
        assert!(!store.exists("b.adoc"));
        assert_eq!(store.read("a.adoc").unwrap(), "A");
        assert_eq!(store.read_count(), 1);
    }

    #[test]
    fn test_read_missing() {
        let store = MockStore::new();

        let err = store.read("missing.adoc").unwrap_err();

        assert_eq!(err.kind, StoreErrorKind::NotFound);
        assert_eq!(err.backend, Some("Mock"));
        assert_eq!(store.read_count(), 0);
    }

    #[test]
    fn test_insert_and_remove() {
        let store = MockStore::new();

        store.insert("a.adoc", "v1");
        store.insert("a.adoc", "v2");
        assert_eq!(store.read("a.adoc").unwrap(), "v2");

        store.remove("a.adoc");
        assert!(!store.exists("a.adoc"));
    }

    #[test]
    fn test_emit_after_watch() {
        let store = MockStore::new();
        let (rx, _handle) = store.watch().unwrap();

        store.emit(ChangeEvent::modified("a.adoc"));

        assert_eq!(rx.try_recv(), Some(ChangeEvent::modified("a.adoc")));
    }

    #[test]
    fn test_emit_without_watch_is_dropped() {
        let store = MockStore::new();

        // No panic, nothing to receive
        store.emit(ChangeEvent::deleted("a.adoc"));
    }
}
