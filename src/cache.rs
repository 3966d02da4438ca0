//! Process-wide response cache capability.
//!
//! Adapters depend on this narrow get/set interface instead of a concrete
//! store, so the backing implementation can be swapped without touching them:
//! in-memory here, an external key-value service in deployment. The cache is
//! constructed once at process start and shared by handle; there is no
//! module-level mutable state. Cache failures are never surfaced to callers;
//! a broken cache degrades to a miss.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Fallback TTL for entries whose producer does not pick one.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Where a proxied response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Api,
}

/// Narrow get/set capability over string values with per-entry TTL.
pub trait ResponseCache: Send + Sync {
    /// Returns the cached value, or `None` if absent, expired, or the cache
    /// is unavailable.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores a value for at most `ttl`. Best effort; errors are swallowed.
    fn set(&self, key: &str, value: String, ttl: Duration);
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory LRU cache with per-entry deadlines.
///
/// Expired entries are dropped lazily on lookup; capacity pressure evicts
/// least-recently-used entries regardless of remaining TTL.
pub struct InMemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl ResponseCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.pop(key);
                debug!(key, "cache entry expired");
                None
            }
            None => {
                debug!(key, "cache miss");
                None
            }
        }
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key.to_string(),
                CacheEntry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            );
            debug!(key, ttl_secs = ttl.as_secs(), "cache set");
        }
    }
}

/// Reads and deserializes a cached JSON value. An entry that no longer
/// decodes (stale schema) is treated as a miss.
pub fn get_json<T: DeserializeOwned>(cache: &dyn ResponseCache, key: &str) -> Option<T> {
    let raw = cache.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, %err, "discarding undecodable cache entry");
            None
        }
    }
}

/// Serializes and stores a JSON value. Best effort.
pub fn set_json<T: Serialize>(cache: &dyn ResponseCache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, raw, ttl),
        Err(err) => warn!(key, %err, "failed to serialize cache value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let cache = InMemoryCache::new(10);
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_missing_key() {
        let cache = InMemoryCache::new(10);
        assert_eq!(cache.get("absent"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = InMemoryCache::new(10);
        cache.set("k", "v".to_string(), Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = InMemoryCache::new(2);
        cache.set("a", "1".to_string(), Duration::from_secs(60));
        cache.set("b", "2".to_string(), Duration::from_secs(60));
        cache.set("c", "3".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some("3".to_string()));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = InMemoryCache::new(0);
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_json_round_trip() {
        let cache = InMemoryCache::new(10);
        set_json(&cache, "nums", &vec![1, 2, 3], Duration::from_secs(60));
        assert_eq!(get_json::<Vec<i32>>(&cache, "nums"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_undecodable_entry_is_a_miss() {
        let cache = InMemoryCache::new(10);
        cache.set("bad", "not json".to_string(), Duration::from_secs(60));
        assert_eq!(get_json::<Vec<i32>>(&cache, "bad"), None);
    }
}
