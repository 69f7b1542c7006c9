//! Content-addressed cache of rendered diagrams.
//!
//! [`DiagramKey`] computes the fingerprint of a diagram request. [`RenderCache`]
//! maps fingerprints to rendered payloads, bounded by a maximum item count.
//! It persists to a single JSON file:
//!
//! ```json
//! { "version": 1, "items": { "<hex>": { "mime": "image/svg+xml", "payloadBase64": "...", "savedAt": 1700000000000 } } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::CACHE_VERSION;

/// Diagram parameters for cache key computation.
///
/// Contains everything that affects the rendered output.
#[derive(Debug, Clone, Copy)]
pub struct DiagramKey<'a> {
    /// Diagram kind (e.g., "plantuml", "mermaid").
    pub kind: &'a str,
    /// Output format ("svg" or "png").
    pub format: &'a str,
    /// Diagram source after include expansion.
    pub source: &'a str,
}

impl DiagramKey<'_> {
    /// Lowercase hex SHA-256 of `"{kind}\n{format}\n{source}"`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.format.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.source.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Error loading, saving or decoding cache data.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid cache file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported cache version {found}")]
    UnsupportedVersion { found: u32 },
    #[error("invalid cached payload: {0}")]
    Payload(#[from] base64::DecodeError),
}

/// A rendered payload stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub mime: String,
    pub payload_base64: String,
    /// Insertion time in Unix milliseconds.
    pub saved_at: u64,
}

impl CacheRecord {
    /// Create a record for `payload`, stamped with the current time.
    #[must_use]
    pub fn new(mime: impl Into<String>, payload: &[u8]) -> Self {
        Self::with_saved_at(mime, payload, now_millis())
    }

    #[must_use]
    pub fn with_saved_at(mime: impl Into<String>, payload: &[u8], saved_at: u64) -> Self {
        Self {
            mime: mime.into(),
            payload_base64: BASE64_STANDARD.encode(payload),
            saved_at,
        }
    }

    /// Decode the stored payload.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Payload`] if the payload is not valid base64.
    pub fn payload(&self) -> Result<Vec<u8>, CacheError> {
        Ok(BASE64_STANDARD.decode(&self.payload_base64)?)
    }
}

/// Persisted cache layout.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DiagramCache {
    pub version: u32,
    pub items: BTreeMap<String, CacheRecord>,
}

/// Bounded map from fingerprint to rendered payload.
///
/// Reads never refresh a record's age; [`trim`](Self::trim) evicts by
/// insertion time.
#[derive(Debug, Clone)]
pub struct RenderCache {
    max_items: usize,
    items: BTreeMap<String, CacheRecord>,
}

impl RenderCache {
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items,
            items: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<&CacheRecord> {
        self.items.get(fingerprint)
    }

    /// Insert or replace a record. Does not trim.
    pub fn insert(&mut self, fingerprint: impl Into<String>, record: CacheRecord) {
        self.items.insert(fingerprint.into(), record);
    }

    /// Evict the oldest records until at most `max_items` remain.
    ///
    /// Records with equal `saved_at` are evicted in fingerprint order.
    /// Returns the number of evicted records.
    pub fn trim(&mut self) -> usize {
        if self.items.len() <= self.max_items {
            return 0;
        }
        let excess = self.items.len() - self.max_items;

        let mut by_age: Vec<(u64, String)> = self
            .items
            .iter()
            .map(|(key, record)| (record.saved_at, key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(excess) {
            self.items.remove(&key);
        }
        tracing::info!(evicted = excess, remaining = self.items.len(), "Trimmed diagram cache");
        excess
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    #[must_use]
    pub fn items(&self) -> &BTreeMap<String, CacheRecord> {
        &self.items
    }

    /// Parse the persisted layout.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on malformed JSON or an unsupported version.
    pub fn from_json(json: &str, max_items: usize) -> Result<Self, CacheError> {
        let cache: DiagramCache = serde_json::from_str(json)?;
        if cache.version != CACHE_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: cache.version,
            });
        }
        Ok(Self {
            max_items,
            items: cache.items,
        })
    }

    /// Serialize to the persisted layout.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, CacheError> {
        let cache = DiagramCache {
            version: CACHE_VERSION,
            items: self.items.clone(),
        };
        Ok(serde_json::to_string_pretty(&cache)?)
    }

    /// Load the cache from `path`.
    ///
    /// A missing file gives an empty cache. An unreadable, corrupt or
    /// wrong-version file also gives an empty cache, with a warning.
    #[must_use]
    pub fn load(path: &Path, max_items: usize) -> Self {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::new(max_items),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read diagram cache");
                return Self::new(max_items);
            }
        };

        match Self::from_json(&json, max_items) {
            Ok(cache) => {
                tracing::debug!(path = %path.display(), items = cache.len(), "Loaded diagram cache");
                cache
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid diagram cache");
                Self::new(max_items)
            }
        }
    }

    /// Write the cache to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the file can't be written.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), items = self.len(), "Saved diagram cache");
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
