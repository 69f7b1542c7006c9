//! Filesystem store implementation.
//!
//! Provides [`FsStore`] for reading documents from a directory on the local
//! filesystem and watching it for changes.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use glob::Pattern;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};

use crate::debouncer::EventDebouncer;
use crate::event::{ChangeEvent, ChangeEventKind, ChangeEventReceiver, WatchHandle};
use crate::store::{DocumentStore, StoreError, StoreErrorKind};

/// Backend identifier for error messages.
const BACKEND: &str = "Fs";

/// Default debounce window for change events.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Patterns watched when none are configured.
const DEFAULT_WATCH_PATTERNS: &[&str] = &[
    "**/*.adoc",
    "**/*.asciidoc",
    "**/*.asc",
    "**/*.puml",
    "**/*.iuml",
    "**/*.plantuml",
];

/// Filesystem store rooted at a source directory.
///
/// # Example
///
/// ```ignore
/// use std::path::PathBuf;
/// use docweave_storage::{DocumentStore, FsStore};
///
/// let store = FsStore::new(PathBuf::from("docs"));
/// let text = store.read("guide/intro.adoc")?;
/// ```
pub struct FsStore {
    /// Root directory for document storage.
    source_dir: PathBuf,
    /// Patterns for file watching (e.g., "**/*.adoc").
    watch_patterns: Vec<Pattern>,
    /// Quiet period before a change is reported.
    debounce: Duration,
}

impl FsStore {
    /// Create a new filesystem store with the default watch patterns.
    #[must_use]
    pub fn new(source_dir: PathBuf) -> Self {
        let patterns = DEFAULT_WATCH_PATTERNS
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        Self {
            source_dir,
            watch_patterns: patterns,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Set the debounce window for change events.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Root directory of this store.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Convert a store path into a filesystem path below the root.
    ///
    /// Rejects absolute paths and parent directory components so that a
    /// store path can never escape the source directory.
    fn full_path(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if escapes || path.is_empty() {
            return Err(StoreError::new(StoreErrorKind::InvalidPath)
                .with_path(path)
                .with_backend(BACKEND));
        }
        Ok(self.source_dir.join(relative))
    }
}

/// Absolute, symlink-free form of the source directory.
///
/// The watcher reports event paths in this form, so relative roots such as
/// `docs` must be resolved before matching events against them.
fn watch_root(source_dir: &Path) -> Result<PathBuf, StoreError> {
    source_dir.canonicalize().map_err(|e| {
        StoreError::io(e, None)
            .with_path(source_dir.display().to_string())
            .with_backend(BACKEND)
    })
}

/// Convert an absolute filesystem path into a store path.
fn to_store_path(source_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(source_dir).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

impl DocumentStore for FsStore {
    fn read(&self, path: &str) -> Result<String, StoreError> {
        let full_path = self.full_path(path)?;
        fs::read_to_string(&full_path)
            .map_err(|e| StoreError::io(e, Some(path.to_owned())).with_backend(BACKEND))
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).is_ok_and(|p| p.is_file())
    }

    fn watch(&self) -> Result<(ChangeEventReceiver, WatchHandle), StoreError> {
        let (event_tx, event_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();

        let debouncer = Arc::new(EventDebouncer::new(self.debounce));

        let root = watch_root(&self.source_dir)?;
        let source_dir = root.clone();
        let patterns = self.watch_patterns.clone();
        let debouncer_for_watcher = Arc::clone(&debouncer);

        let matches = move |path: &Path| {
            let Ok(rel_path) = path.strip_prefix(&source_dir) else {
                return false;
            };
            patterns.is_empty() || patterns.iter().any(|p| p.matches_path(rel_path))
        };

        let source_dir_for_watcher = root.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let Ok(event) = res else {
                    return;
                };

                match event.kind {
                    EventKind::Modify(ModifyKind::Name(RenameMode::Both))
                        if event.paths.len() == 2 =>
                    {
                        let (from, to) = (&event.paths[0], &event.paths[1]);
                        if !matches(from.as_path()) && !matches(to.as_path()) {
                            return;
                        }
                        if let Some(from) = to_store_path(&source_dir_for_watcher, from) {
                            debouncer_for_watcher
                                .record(to.clone(), ChangeEventKind::Renamed { from });
                        }
                    }
                    EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
                        for path in event.paths.into_iter().filter(|p| matches(p.as_path())) {
                            debouncer_for_watcher.record(path, ChangeEventKind::Deleted);
                        }
                    }
                    EventKind::Create(_) | EventKind::Modify(_) => {
                        for path in event.paths.into_iter().filter(|p| matches(p.as_path())) {
                            debouncer_for_watcher.record(path, ChangeEventKind::Modified);
                        }
                    }
                    _ => {}
                }
            })
            .map_err(|e| {
                StoreError::new(StoreErrorKind::Unavailable)
                    .with_backend(BACKEND)
                    .with_source(e)
            })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| {
                StoreError::new(StoreErrorKind::Unavailable)
                    .with_backend(BACKEND)
                    .with_source(e)
            })?;

        let source_dir_for_drain = root;

        std::thread::spawn(move || {
            // Keep watcher alive for as long as this thread runs
            let _watcher_guard = watcher;

            loop {
                match shutdown_rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }

                for event in debouncer.drain_ready() {
                    let Some(path) = to_store_path(&source_dir_for_drain, &event.path) else {
                        continue;
                    };
                    tracing::debug!(path = %path, kind = ?event.kind, "Document changed");

                    if event_tx
                        .send(ChangeEvent {
                            path,
                            kind: event.kind,
                        })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });

        Ok((ChangeEventReceiver::new(event_rx), WatchHandle::new(shutdown_tx)))
    }
}
