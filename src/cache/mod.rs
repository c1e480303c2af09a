//! Keyword result cache.
//!
//! `KeyStore` is the backend seam (Redis or an in-process map, chosen once at startup).
//! `TrendCache` sits on top of it: it (de)serializes `CacheRecord`s, enforces lazy expiry,
//! keeps the hit/miss/error counters, and swallows every backend failure so that an
//! unavailable cache degrades to "always miss".

pub mod memory_store;
pub mod redis_store;

pub use memory_store::MemoryKeyStore;
pub use redis_store::RedisKeyStore;

use crate::error::Result;
use crate::types::CacheRecord;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Remaining lifetime of one stored key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTtl {
    pub key: String,
    pub ttl_seconds: u64,
}

/// Raw string storage with per-key TTL. Implementations report failures; they never count
/// or hide them.
#[async_trait]
pub trait KeyStore: Send + Sync {
    fn backend_name(&self) -> &'static str;
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    /// Removes every key starting with `prefix`, returning how many were removed.
    async fn clear(&self, prefix: &str) -> Result<usize>;
    async fn ttl_listing(&self, prefix: &str) -> Result<Vec<KeyTtl>>;
}

/// Process-lifetime cache counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };
        StatsSnapshot {
            hits,
            misses,
            errors,
            hit_rate,
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct TrendCache {
    store: Arc<dyn KeyStore>,
    stats: Arc<CacheStats>,
}

impl TrendCache {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn get(&self, key: &str) -> Option<CacheRecord> {
        let raw = match self.store.get_raw(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache MISS for key: {}", key);
                self.stats.record_miss();
                return None;
            }
            Err(e) => {
                error!("{} GET error for key {}: {}", self.backend_name(), key, e);
                self.stats.record_error();
                return None;
            }
        };

        let record = match serde_json::from_str::<CacheRecord>(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to deserialize cached record for key {}: {}", key, e);
                self.stats.record_error();
                return None;
            }
        };

        if !record.is_live_at(Utc::now()) {
            debug!("Cache entry for key {} expired at {}", key, record.expires_at);
            self.stats.record_miss();
            return None;
        }

        debug!("Cache HIT for key: {}", key);
        self.stats.record_hit();
        Some(record)
    }

    pub async fn set(&self, key: &str, record: &CacheRecord, ttl_secs: u64) {
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize record for key {}: {}", key, e);
                return;
            }
        };
        let ttl = ttl_secs.max(1);
        match self.store.set_raw(key, value, ttl).await {
            Ok(()) => debug!("Cache SET success for key: {} with TTL: {}s", key, ttl),
            Err(e) => warn!("Failed to SET key '{}' in {}: {}", key, self.backend_name(), e),
        }
    }

    /// Concurrent `get` for every key; absent or failed keys are missing from the map.
    pub async fn get_multiple(&self, keys: &[String]) -> HashMap<String, CacheRecord> {
        let lookups = keys.iter().map(|key| async move {
            let record = self.get(key).await;
            (key.clone(), record)
        });
        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(key, record)| record.map(|r| (key, r)))
            .collect()
    }

    /// Concurrent `set`; a key missing from `ttl_by_key` keeps the record's remaining lifetime.
    pub async fn set_multiple(&self, records: &[(String, CacheRecord)], ttl_by_key: &HashMap<String, u64>) {
        let now = Utc::now();
        let writes = records.iter().map(|(key, record)| {
            let ttl = ttl_by_key.get(key).copied().unwrap_or_else(|| {
                (record.expires_at - now).num_seconds().max(1) as u64
            });
            async move { self.set(key, record, ttl).await }
        });
        join_all(writes).await;
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to DEL key '{}' in {}: {}", key, self.backend_name(), e);
                false
            }
        }
    }

    pub async fn clear(&self, prefix: &str) -> usize {
        match self.store.clear(prefix).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to clear prefix '{}' in {}: {}", prefix, self.backend_name(), e);
                0
            }
        }
    }

    pub async fn ttl_listing(&self, prefix: &str) -> Vec<KeyTtl> {
        match self.store.ttl_listing(prefix).await {
            Ok(mut listing) => {
                listing.sort_by(|a, b| a.key.cmp(&b.key));
                listing
            }
            Err(e) => {
                warn!("Failed to list keys under '{}' in {}: {}", prefix, self.backend_name(), e);
                Vec::new()
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FailingKeyStore;
    use crate::types::{Topic, TrendingResult};
    use assert_approx_eq::assert_approx_eq;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn record(keyword: &str, ttl: u64) -> CacheRecord {
        let result = TrendingResult::fresh(
            keyword,
            vec![Topic {
                title: "Cached headline".to_string(),
                summary: "Something notable happened recently.".to_string(),
                search_url: "https://www.google.com/search?q=cached".to_string(),
                source_url: None,
            }],
        );
        CacheRecord::new(result, ttl)
    }

    fn memory_cache() -> TrendCache {
        TrendCache::new(Arc::new(MemoryKeyStore::new()))
    }

    #[tokio::test]
    async fn round_trip_then_expiry() {
        let cache = memory_cache();
        let rec = record("rust", 1);
        cache.set("trending:rust", &rec, 1).await;

        assert_eq!(cache.get("trending:rust").await, Some(rec));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("trending:rust").await, None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_approx_eq!(stats.hit_rate, 0.5);
    }

    #[tokio::test]
    async fn get_multiple_omits_absent_keys() {
        let cache = memory_cache();
        cache.set("trending:a", &record("a", 60), 60).await;
        cache.set("trending:c", &record("c", 60), 60).await;

        let keys = vec![
            "trending:a".to_string(),
            "trending:b".to_string(),
            "trending:c".to_string(),
        ];
        let found = cache.get_multiple(&keys).await;
        assert_eq!(found.len(), 2);
        assert!(found.contains_key("trending:a"));
        assert!(!found.contains_key("trending:b"));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.errors), (2, 1, 0));
    }

    #[tokio::test]
    async fn set_multiple_uses_per_key_ttl() {
        let cache = memory_cache();
        let records = vec![
            ("trending:a".to_string(), record("a", 60)),
            ("trending:b".to_string(), record("b", 600)),
        ];
        let ttl_by_key: HashMap<String, u64> =
            [("trending:a".to_string(), 30)].into_iter().collect();
        cache.set_multiple(&records, &ttl_by_key).await;

        let listing = cache.ttl_listing("trending:").await;
        assert_eq!(listing.len(), 2);
        assert!(listing[0].ttl_seconds <= 30);
        assert!(listing[1].ttl_seconds > 500);
    }

    #[tokio::test]
    async fn backend_failures_read_as_misses() {
        let cache = TrendCache::new(Arc::new(FailingKeyStore));
        cache.set("trending:x", &record("x", 60), 60).await;
        assert_eq!(cache.get("trending:x").await, None);
        assert!(!cache.delete("trending:x").await);
        assert_eq!(cache.clear("trending:").await, 0);
        assert!(cache.ttl_listing("trending:").await.is_empty());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.errors), (0, 0, 1));
    }

    #[tokio::test]
    async fn corrupt_payload_counts_as_error() {
        let store = Arc::new(MemoryKeyStore::new());
        store
            .set_raw("trending:bad", "{not json".to_string(), 60)
            .await
            .unwrap();
        let cache = TrendCache::new(store);
        assert_eq!(cache.get("trending:bad").await, None);
        assert_eq!(cache.stats().errors, 1);
    }

    #[tokio::test]
    async fn reset_zeroes_counters() {
        let cache = memory_cache();
        cache.get("trending:none").await;
        cache.reset_stats();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.errors), (0, 0, 0));
        assert_approx_eq!(stats.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn concurrent_reads_lose_no_updates() {
        let cache = memory_cache();
        cache.set("trending:hot", &record("hot", 60), 60).await;
        let keys: Vec<String> = (0..200)
            .map(|i| {
                if i % 2 == 0 {
                    "trending:hot".to_string()
                } else {
                    format!("trending:cold{}", i)
                }
            })
            .collect();
        let tasks = keys.into_iter().map(|key| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&key).await })
        });
        join_all(tasks).await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 100);
        assert_eq!(stats.misses, 100);
    }
}
