//! Document store abstraction for docweave.
//!
//! The composition and diagram pipeline never touches the filesystem directly.
//! Everything it reads goes through the [`DocumentStore`] trait:
//!
//! - [`DocumentStore`] trait with `read()`, `exists()` and `watch()` methods
//! - [`FsStore`] implementation rooted at a directory, with debounced change events
//! - [`MockStore`] in-memory implementation for tests (behind `mock` feature flag)
//!
//! # Path Convention
//!
//! All paths are **store paths**: forward slashes, relative to the store root,
//! no leading slash (e.g. `"guide/index.adoc"`, `"diagrams/common.puml"`).
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use docweave_storage::{DocumentStore, FsStore};
//!
//! let store = FsStore::new(PathBuf::from("docs"));
//! if store.exists("guide.adoc") {
//!     let text = store.read("guide.adoc")?;
//! }
//! ```

mod debouncer;
mod event;
mod fs;
#[cfg(feature = "mock")]
mod mock;
mod store;

pub use event::{ChangeEvent, ChangeEventKind, ChangeEventReceiver, WatchHandle};
pub use fs::FsStore;
#[cfg(feature = "mock")]
pub use mock::MockStore;
pub use store::{DocumentStore, StoreError, StoreErrorKind};
