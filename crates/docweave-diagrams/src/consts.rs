//! Internal constants for diagram rendering.

use std::time::Duration;

/// Default HTTP timeout for Kroki requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of characters of an error response body kept in errors.
pub const ERROR_BODY_LIMIT: usize = 400;

/// Default number of rendered diagrams kept in the cache.
pub const DEFAULT_CACHE_MAX_ITEMS: usize = 500;

/// Version of the persisted cache layout.
pub const CACHE_VERSION: u32 = 1;
