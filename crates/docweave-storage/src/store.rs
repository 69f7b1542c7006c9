//! Document store trait and error types.
//!
//! Provides the core [`DocumentStore`] trait consumed by the include resolvers
//! and the diagram pipeline, along with [`StoreError`] for unified error
//! handling across backends.

use crate::event::{ChangeEventReceiver, WatchHandle};

/// Semantic error categories.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorKind {
    /// Document does not exist.
    NotFound,
    /// Permission denied.
    PermissionDenied,
    /// Path escapes the store root or is otherwise malformed.
    InvalidPath,
    /// Document is not valid UTF-8 text.
    InvalidContent,
    /// Backend is temporarily unavailable.
    Unavailable,
    /// Operation timed out.
    Timeout,
    /// Other/unknown error category.
    Other,
}

/// Store error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct StoreError {
    /// Semantic error category.
    pub kind: StoreErrorKind,
    /// Store path context (if applicable).
    pub path: Option<String>,
    /// Backend identifier (e.g., "Fs", "Mock").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    /// Create a new store error.
    #[must_use]
    pub fn new(kind: StoreErrorKind) -> Self {
        Self {
            kind,
            path: None,
            backend: None,
            source: None,
        }
    }

    /// Attach store path context.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a not found error with path.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound).with_path(path)
    }

    /// Create a store error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error, path: Option<String>) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => StoreErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => StoreErrorKind::PermissionDenied,
            std::io::ErrorKind::InvalidData => StoreErrorKind::InvalidContent,
            std::io::ErrorKind::TimedOut => StoreErrorKind::Timeout,
            _ => StoreErrorKind::Other,
        };
        let mut error = Self::new(kind).with_source(err);
        if let Some(p) = path {
            error = error.with_path(p);
        }
        error
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (path: foo/bar.adoc)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            StoreErrorKind::NotFound => "Not found",
            StoreErrorKind::PermissionDenied => "Permission denied",
            StoreErrorKind::InvalidPath => "Invalid path",
            StoreErrorKind::InvalidContent => "Invalid content",
            StoreErrorKind::Unavailable => "Unavailable",
            StoreErrorKind::Timeout => "Timeout",
            StoreErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(path) = &self.path {
            write!(f, " (path: {path})")?;
        }

        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Read access to the documents a render pass may include.
///
/// This is the "host document store" collaborator: the pipeline only ever
/// asks whether a store path exists and for its text. Implementations decide
/// how store paths map onto their backing storage.
pub trait DocumentStore: Send + Sync {
    /// Read the full text of a document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the document doesn't exist or can't be read.
    fn read(&self, path: &str) -> Result<String, StoreError>;

    /// Check if a document exists at the given store path.
    ///
    /// Returns `false` on errors (treats errors as "doesn't exist").
    fn exists(&self, path: &str) -> bool;

    /// Start watching for document changes.
    ///
    /// Returns a receiver for events and a handle to stop watching.
    /// Events carry store paths. Default implementation returns a no-op
    /// receiver for backends that don't support change notification.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if watching cannot be started.
    fn watch(&self) -> Result<(ChangeEventReceiver, WatchHandle), StoreError> {
        Ok((ChangeEventReceiver::no_op(), WatchHandle::no_op()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_new() {
        let err = StoreError::new(StoreErrorKind::NotFound);

        assert_eq!(err.kind, StoreErrorKind::NotFound);
        assert!(err.path.is_none());
        assert!(err.backend.is_none());
    }

    #[test]
    fn test_store_error_not_found() {
        let err = StoreError::not_found("guide.adoc");

        assert_eq!(err.kind, StoreErrorKind::NotFound);
        assert_eq!(err.path.as_deref(), Some("guide.adoc"));
    }

    #[test]
    fn test_store_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StoreError::new(StoreErrorKind::NotFound).with_source(io_err);

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "file not found");
    }

    #[test]
    fn test_store_error_io_kinds() {
        let cases = [
            (std::io::ErrorKind::NotFound, StoreErrorKind::NotFound),
            (
                std::io::ErrorKind::PermissionDenied,
                StoreErrorKind::PermissionDenied,
            ),
            (std::io::ErrorKind::InvalidData, StoreErrorKind::InvalidContent),
            (std::io::ErrorKind::TimedOut, StoreErrorKind::Timeout),
            (std::io::ErrorKind::Other, StoreErrorKind::Other),
        ];

        for (io_kind, expected) in cases {
            let err = StoreError::io(std::io::Error::new(io_kind, "boom"), None);
            assert_eq!(err.kind, expected, "wrong kind for {io_kind:?}");
        }
    }

    #[test]
    fn test_store_error_io_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = StoreError::io(io_err, Some("slow.adoc".to_owned()));

        assert_eq!(err.path.as_deref(), Some("slow.adoc"));
        assert_eq!(err.to_string(), "Timeout: timed out (path: slow.adoc)");
    }

    #[test]
    fn test_store_error_display_simple() {
        let err = StoreError::new(StoreErrorKind::NotFound);

        assert_eq!(err.to_string(), "Not found");
    }

    #[test]
    fn test_store_error_display_full() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StoreError::new(StoreErrorKind::NotFound)
            .with_backend("Fs")
            .with_path("guide/intro.adoc")
            .with_source(io_err);

        assert_eq!(
            err.to_string(),
            "[Fs] Not found: file not found (path: guide/intro.adoc)"
        );
    }

    #[test]
    fn test_store_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
