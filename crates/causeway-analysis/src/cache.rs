//! Process-local TTL cache for repeated lookups
//!
//! Backed by moka. Entries expire after the TTL fixed at construction;
//! expired entries read as absent. The cache is local to one process and
//! unsynchronized across workers; staleness is bounded by the TTL.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Default time-to-live for cached query results
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Injectable TTL key/value cache
///
/// Values are stored type-erased; `get` downcasts back to the concrete
/// type. A `disabled()` cache stores nothing, so tests can opt out
/// without any global state.
#[derive(Debug, Clone)]
pub struct QueryCache {
    inner: Option<moka::sync::Cache<String, Arc<dyn Any + Send + Sync>>>,
}

impl QueryCache {
    /// Create a cache with the given capacity and entry TTL
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Some(
                moka::sync::Cache::builder()
                    .max_capacity(max_capacity)
                    .time_to_live(ttl)
                    .build(),
            ),
        }
    }

    /// Create a cache that never stores anything
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Get a cached value, if present and unexpired
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        self.inner
            .as_ref()?
            .get(key)
            .and_then(|entry| entry.downcast_ref::<T>().cloned())
    }

    /// Insert or overwrite a value under `key`
    pub fn insert<T: Send + Sync + 'static>(&self, key: String, value: T) {
        if let Some(cache) = &self.inner {
            cache.insert(key, Arc::new(value));
        }
    }

    /// Approximate number of live entries
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.as_ref().map_or(0, |cache| cache.entry_count())
    }
}

impl Default for QueryCache {
    /// Cache with default capacity (10,000 entries) and TTL
    fn default() -> Self {
        Self::with_ttl(10_000, DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let cache = QueryCache::with_ttl(100, Duration::from_secs(60));
        cache.insert("k".to_string(), 42u64);
        assert_eq!(cache.get::<u64>("k"), Some(42));
    }

    #[test]
    fn missing_key_is_none() {
        let cache = QueryCache::with_ttl(100, Duration::from_secs(60));
        assert_eq!(cache.get::<u64>("absent"), None);
    }

    #[test]
    fn wrong_type_is_none() {
        let cache = QueryCache::with_ttl(100, Duration::from_secs(60));
        cache.insert("k".to_string(), "text".to_string());
        assert_eq!(cache.get::<u64>("k"), None);
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = QueryCache::disabled();
        cache.insert("k".to_string(), 1u64);
        assert_eq!(cache.get::<u64>("k"), None);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn expired_entries_read_as_absent() {
        let cache = QueryCache::with_ttl(100, Duration::from_millis(10));
        cache.insert("k".to_string(), 1u64);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get::<u64>("k"), None);
    }
}
