//! TTL result cache keyed by query fingerprint, shared by [`crate::service`].
//!
//! Two key families share one cache: `search:{tenant}:{conversation}:{hash}`
//! for ranked retrieval responses and `embedding:{hash}` for individual
//! embedding vectors. [`ResultCache::delete_prefix`] lets the service
//! invalidate every search result for a `(tenant, conversation)` pair after
//! a write without touching unrelated entries.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use sha2::{Digest, Sha256};

/// Cache performance counters, exposed for the admin health endpoint.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

impl CacheMetrics {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Search(serde_json::Value),
    Embedding(Vec<f32>),
}

struct CachedEntry {
    value: Entry,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Bounded, TTL-aware cache for search responses and embedding vectors.
///
/// Size is bounded by an underlying [`lru::LruCache`]: when `max_items` is
/// exceeded the least-recently-used entry is evicted, which approximates
/// "drop the entry with the earliest expiration" closely enough for a
/// bounded total while staying O(1) per operation.
pub struct ResultCache {
    entries: RwLock<LruCache<String, CachedEntry>>,
    metrics: RwLock<CacheMetrics>,
}

impl ResultCache {
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(max_items.max(1)).expect("max_items > 0");
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            metrics: RwLock::new(CacheMetrics::default()),
        }
    }

    fn get_entry(&self, key: &str) -> Option<Entry> {
        let mut entries = self.entries.write().expect("result cache lock poisoned");
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                drop(entries);
                self.metrics.write().expect("result cache lock poisoned").hits += 1;
                Some(value)
            }
            Some(_) => {
                entries.pop(key);
                drop(entries);
                self.metrics.write().expect("result cache lock poisoned").misses += 1;
                None
            }
            None => {
                drop(entries);
                self.metrics.write().expect("result cache lock poisoned").misses += 1;
                None
            }
        }
    }

    /// Look up a cached search response.
    #[must_use]
    pub fn get_search(&self, key: &str) -> Option<serde_json::Value> {
        match self.get_entry(key)? {
            Entry::Search(v) => Some(v),
            Entry::Embedding(_) => None,
        }
    }

    /// Look up a cached embedding vector.
    #[must_use]
    pub fn get_embedding(&self, key: &str) -> Option<Vec<f32>> {
        match self.get_entry(key)? {
            Entry::Embedding(v) => Some(v),
            Entry::Search(_) => None,
        }
    }

    /// Store a search response under `key` with the given TTL.
    pub fn set_search(&self, key: String, value: serde_json::Value, ttl: Duration) {
        self.put(key, Entry::Search(value), ttl);
    }

    /// Store an embedding vector under `key` with the given TTL.
    pub fn set_embedding(&self, key: String, value: Vec<f32>, ttl: Duration) {
        self.put(key, Entry::Embedding(value), ttl);
    }

    fn put(&self, key: String, value: Entry, ttl: Duration) {
        let mut entries = self.entries.write().expect("result cache lock poisoned");
        let evicted = entries.len() == entries.cap().get() && !entries.contains(&key);
        entries.put(
            key,
            CachedEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        drop(entries);
        if evicted {
            self.metrics.write().expect("result cache lock poisoned").evictions += 1;
        }
    }

    /// Delete every key starting with `prefix`. Used to invalidate all
    /// cached search results for a `(tenant, conversation)` pair.
    pub fn delete_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().expect("result cache lock poisoned");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        let count = doomed.len() as u64;
        for key in doomed {
            entries.pop(&key);
        }
        drop(entries);
        if count > 0 {
            self.metrics.write().expect("result cache lock poisoned").invalidations += count;
        }
    }

    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.read().expect("result cache lock poisoned").clone()
    }
}

/// `search:{tenant}:{conversation|'*'}:sha256(tenant|conversation|top_k|candidate_limit|query)`
#[must_use]
pub fn search_cache_key(
    tenant_id: &str,
    conversation_id: Option<&str>,
    top_k: u32,
    candidate_limit: u32,
    query: &str,
) -> String {
    let conv = conversation_id.unwrap_or("*");
    let fingerprint = sha256_hex(&format!(
        "{tenant_id}|{conv}|{top_k}|{candidate_limit}|{query}"
    ));
    format!("search:{tenant_id}:{conv}:{fingerprint}")
}

/// The prefix to pass to [`ResultCache::delete_prefix`] to invalidate every
/// search entry for a `(tenant, conversation)` pair.
#[must_use]
pub fn search_invalidation_prefix(tenant_id: &str, conversation_id: &str) -> String {
    format!("search:{tenant_id}:{conversation_id}:")
}

/// `embedding:sha256(text)`
#[must_use]
pub fn embedding_cache_key(text: &str) -> String {
    format!("embedding:{}", sha256_hex(text))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_search_entries() {
        let cache = ResultCache::new(10);
        let key = search_cache_key("t1", Some("c1"), 5, 50, "hello");
        assert!(cache.get_search(&key).is_none());
        cache.set_search(key.clone(), serde_json::json!({"total": 0}), Duration::from_secs(60));
        assert_eq!(cache.get_search(&key).unwrap()["total"], 0);
    }

    #[test]
    fn expired_entries_are_treated_as_misses() {
        let cache = ResultCache::new(10);
        let key = embedding_cache_key("hi");
        cache.set_embedding(key.clone(), vec![1.0, 2.0], Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_embedding(&key).is_none());
    }

    #[test]
    fn delete_prefix_clears_only_matching_keys() {
        let cache = ResultCache::new(10);
        let k1 = search_cache_key("t1", Some("c1"), 5, 50, "a");
        let k2 = search_cache_key("t1", Some("c2"), 5, 50, "b");
        cache.set_search(k1.clone(), serde_json::json!({}), Duration::from_secs(60));
        cache.set_search(k2.clone(), serde_json::json!({}), Duration::from_secs(60));

        cache.delete_prefix(&search_invalidation_prefix("t1", "c1"));

        assert!(cache.get_search(&k1).is_none());
        assert!(cache.get_search(&k2).is_some());
    }

    #[test]
    fn eviction_bounds_total_size() {
        let cache = ResultCache::new(2);
        for i in 0..5 {
            cache.set_embedding(format!("embedding:{i}"), vec![i as f32], Duration::from_secs(60));
        }
        assert!(cache.metrics().evictions > 0);
    }
}
