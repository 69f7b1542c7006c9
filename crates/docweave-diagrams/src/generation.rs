//! Re-render coordination.
//!
//! A watcher starts a new generation for every re-render. Results of a run
//! whose generation is no longer current are discarded, so a slow render
//! never overwrites a newer one.

use std::sync::atomic::{AtomicU64, Ordering};

use docweave_include::DependencySet;
use docweave_storage::ChangeEvent;

/// Token identifying one render run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// Monotonic generation counter.
#[derive(Debug, Default)]
pub struct RenderGenerations {
    current: AtomicU64,
}

impl RenderGenerations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, superseding every earlier one.
    pub fn begin(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether no generation was started after `generation`.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current.load(Ordering::SeqCst) == generation.0
    }
}

/// Whether any change touches a dependency of the rendered document.
///
/// Renames match on both the old and the new path.
#[must_use]
pub fn needs_rerender(dependencies: &DependencySet, changed: &[ChangeEvent]) -> bool {
    changed
        .iter()
        .any(|event| dependencies.is_affected_by(event.paths()))
}
