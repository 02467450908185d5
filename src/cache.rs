//! Persistent key-value cache for geocoding results.
//!
//! The geocoder takes the cache as an injected capability so callers can
//! choose between a process-local in-memory map (tests, one-shot CLI runs)
//! and a sled-backed store that survives restarts (`disk-cache` feature).
//! Values are JSON-serialized [`crate::Location`] records; entries are
//! never expired.

use std::collections::HashMap;
use std::sync::Mutex;

/// Prefix for geocode cache keys.
const CACHE_KEY_PREFIX: &str = "geocode_";

/// Compute the cache key for a place name: `geocode_<lowercased name>`.
/// Lookups for "Tokyo" and "tokyo" hit the same entry.
pub fn cache_key(name: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, name.trim().to_lowercase())
}

/// String key-value store capability consumed by the geocoder.
///
/// Implementations must tolerate concurrent use; a lost race between two
/// writers for the same key is benign because both write equivalent values.
pub trait LocationCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

/// In-memory cache, scoped to the process lifetime.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .map(|entries| entries.get(key).cloned())
            .unwrap_or(None)
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
    }
}

/// Durable cache backed by a sled database, shared across sessions.
#[cfg(feature = "disk-cache")]
pub struct SledCache {
    db: sled::Db,
}

#[cfg(feature = "disk-cache")]
impl SledCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

#[cfg(feature = "disk-cache")]
impl LocationCache for SledCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.db.get(key) {
            Ok(Some(raw)) => String::from_utf8(raw.to_vec()).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = key, error = %e, "Cache read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: String) {
        if let Err(e) = self.db.insert(key, value.as_bytes()) {
            tracing::warn!(key = key, error = %e, "Cache write failed");
        }
    }
}
