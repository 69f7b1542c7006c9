//! CLI error types.

use docweave_config::ConfigError;
use docweave_diagrams::CacheError;
use docweave_storage::StoreError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Failed to save diagram cache: {0}")]
    Cache(#[from] CacheError),

    #[error("{0}")]
    Validation(String),

    #[error("Watch failed: {0}")]
    Watch(String),
}
