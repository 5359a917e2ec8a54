//! Response caching with per-entry time-to-live
//!
//! Callers own the cache; the aggregation stages never see it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Stable key built from an operation name and its parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(operation: &str) -> Self {
        Self(operation.to_string())
    }

    pub fn param(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.0.push_str(&format!("|{}={}", name, value));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ResponseCache<V>: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<V>;

    async fn put(&self, key: CacheKey, value: V, ttl: Duration);
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-process cache; expired entries are evicted when read and on insert
pub struct TtlCache<V> {
    entries: Arc<Mutex<HashMap<CacheKey, Entry<V>>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        retain_live(&mut entries, Instant::now())
    }
}

fn retain_live<V>(entries: &mut HashMap<CacheKey, Entry<V>>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, e| e.expires_at > now);
    before - entries.len()
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> ResponseCache<V> for TtlCache<V> {
    async fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                debug!("Cache hit: {}", key);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!("Cache entry expired: {}", key);
            entries.remove(key);
        }
        None
    }

    /// Expired entries are swept on every insert, so keys never read again
    /// do not accumulate
    async fn put(&self, key: CacheKey, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let purged = retain_live(&mut entries, now);
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
        entries.insert(key, Entry { value, expires_at: now + ttl });
    }
}

/// Always misses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl<V: Send + 'static> ResponseCache<V> for NoCache {
    async fn get(&self, _key: &CacheKey) -> Option<V> {
        None
    }

    async fn put(&self, _key: CacheKey, _value: V, _ttl: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        let key = CacheKey::new("all").param("market", "sale").param("version", "yoy");
        assert_eq!(key.as_str(), "all|market=sale|version=yoy");
        assert_ne!(key, CacheKey::new("all").param("market", "rent").param("version", "yoy"));
    }

    #[tokio::test]
    async fn test_hit_then_expiry() {
        let cache: TtlCache<u32> = TtlCache::new();
        let live = CacheKey::new("live");
        let stale = CacheKey::new("stale");

        cache.put(live.clone(), 1, Duration::from_secs(300)).await;
        cache.put(stale.clone(), 2, Duration::ZERO).await;
        assert_eq!(cache.len().await, 2);

        assert_eq!(cache.get(&live).await, Some(1));
        assert_eq!(cache.get(&stale).await, None);
        // expired entry evicted on read
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache: TtlCache<&str> = TtlCache::new();
        cache.put(CacheKey::new("b"), "b", Duration::from_secs(60)).await;
        cache.put(CacheKey::new("a"), "a", Duration::ZERO).await;
        assert_eq!(cache.len().await, 2);

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_sweeps_unread_expired_keys() {
        let cache: TtlCache<u32> = TtlCache::new();
        for i in 0..5 {
            cache.put(CacheKey::new("properties").param("area", i), i, Duration::ZERO).await;
        }
        cache.put(CacheKey::new("fresh"), 9, Duration::from_secs(60)).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&CacheKey::new("fresh")).await, Some(9));
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache: TtlCache<u32> = TtlCache::new();
        let other = cache.clone();
        cache.put(CacheKey::new("k"), 7, Duration::from_secs(60)).await;
        assert_eq!(other.get(&CacheKey::new("k")).await, Some(7));
    }

    #[tokio::test]
    async fn test_no_cache_always_misses() {
        let cache = NoCache;
        ResponseCache::<u32>::put(&cache, CacheKey::new("k"), 7, Duration::from_secs(60)).await;
        assert_eq!(ResponseCache::<u32>::get(&cache, &CacheKey::new("k")).await, None);
    }
}
