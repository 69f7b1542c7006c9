//! Event debouncing for change notification.
//!
//! Editors typically emit several events per save. The debouncer coalesces
//! them into one event per path and only releases it once the path has been
//! quiet for the debounce duration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::event::ChangeEventKind;

/// A debounced event with file path (not store path).
///
/// Conversion to store paths happens at the `FsStore::watch()` boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DebouncedEvent {
    pub path: PathBuf,
    pub kind: ChangeEventKind,
}

struct PendingEvent {
    kind: ChangeEventKind,
    deadline: Instant,
}

/// Thread-safe event debouncer.
pub(crate) struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, PendingEvent>>,
    debounce_duration: Duration,
}

impl EventDebouncer {
    pub fn new(debounce_duration: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            debounce_duration,
        }
    }

    /// Record an event, restarting the quiet period for its path.
    ///
    /// Thread-safe, called from the notify callback.
    pub fn record(&self, path: PathBuf, kind: ChangeEventKind) {
        use std::collections::hash_map::Entry;

        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let deadline = Instant::now() + self.debounce_duration;

        match pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(PendingEvent { kind, deadline });
            }
            Entry::Occupied(mut entry) => {
                let coalesced = Self::coalesce(&entry.get().kind, kind);
                let pending_event = entry.get_mut();
                pending_event.kind = coalesced;
                pending_event.deadline = deadline;
            }
        }
    }

    /// Coalesce two event kinds for the same path.
    #[allow(clippy::match_same_arms)]
    fn coalesce(existing: &ChangeEventKind, new: ChangeEventKind) -> ChangeEventKind {
        use ChangeEventKind::{Deleted, Modified, Renamed};

        match (existing, new) {
            // A delete always wins: the path is gone
            (_, Deleted) => Deleted,
            // Rename keeps its origin; later writes are part of it
            (Renamed { from }, Modified) => Renamed { from: from.clone() },
            (_, Renamed { from }) => Renamed { from },
            // Deleted then written again: file was replaced
            (Deleted, Modified) => Modified,
            (Modified, Modified) => Modified,
        }
    }

    /// Drain events that have passed their debounce deadline.
    pub fn drain_ready(&self) -> Vec<DebouncedEvent> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();

        let ready_paths: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, event)| event.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        ready_paths
            .into_iter()
            .filter_map(|path| {
                let event = pending.remove(&path)?;
                Some(DebouncedEvent {
                    path,
                    kind: event.kind,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_event_emitted_after_deadline() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/docs/guide.adoc");

        debouncer.record(path.clone(), ChangeEventKind::Modified);

        assert!(debouncer.drain_ready().is_empty());

        thread::sleep(Duration::from_millis(15));

        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, path);
        assert_eq!(events[0].kind, ChangeEventKind::Modified);

        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_burst_of_writes_coalesces() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/docs/guide.adoc");

        debouncer.record(path.clone(), ChangeEventKind::Modified);
        debouncer.record(path.clone(), ChangeEventKind::Modified);
        debouncer.record(path, ChangeEventKind::Modified);

        thread::sleep(Duration::from_millis(15));

        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeEventKind::Modified);
    }

    #[test]
    fn test_multiple_paths_independent() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));

        debouncer.record(PathBuf::from("/docs/a.adoc"), ChangeEventKind::Modified);
        debouncer.record(PathBuf::from("/docs/b.adoc"), ChangeEventKind::Deleted);

        thread::sleep(Duration::from_millis(15));

        assert_eq!(debouncer.drain_ready().len(), 2);
    }

    #[test]
    fn test_coalesce_all_combinations() {
        use ChangeEventKind::{Deleted, Modified, Renamed};
        let renamed = || Renamed {
            from: "old.adoc".to_owned(),
        };

        assert_eq!(EventDebouncer::coalesce(&Modified, Modified), Modified);
        assert_eq!(EventDebouncer::coalesce(&Modified, Deleted), Deleted);
        assert_eq!(EventDebouncer::coalesce(&Modified, renamed()), renamed());

        assert_eq!(EventDebouncer::coalesce(&Deleted, Modified), Modified);
        assert_eq!(EventDebouncer::coalesce(&Deleted, Deleted), Deleted);
        assert_eq!(EventDebouncer::coalesce(&Deleted, renamed()), renamed());

        assert_eq!(EventDebouncer::coalesce(&renamed(), Modified), renamed());
        assert_eq!(EventDebouncer::coalesce(&renamed(), Deleted), Deleted);
        assert_eq!(EventDebouncer::coalesce(&renamed(), renamed()), renamed());
    }
}
