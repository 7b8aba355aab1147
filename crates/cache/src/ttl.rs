//! TTL-backed lookup cache.

use crate::error::{CacheError, Result};
use crate::{hit_rate, CacheHit, CacheStats, LookupCache};
use async_trait::async_trait;
use datagate_core::{Clock, Time};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Normalized cache key: lowercased organism, uppercased symbol.
///
/// Returns `None` when either part is blank.
pub fn cache_key(organism: &str, symbol: &str) -> Option<String> {
    let organism = organism.trim();
    let symbol = symbol.trim();
    if organism.is_empty() || symbol.is_empty() {
        return None;
    }
    Some(format!("{}:{}", organism.to_lowercase(), symbol.to_uppercase()))
}

/// One cached lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Normalized key
    pub key: String,

    /// Payload
    pub value: serde_json::Value,

    /// Provider tag
    pub provider: String,

    /// When written
    pub cached_at: Time,

    /// Absolute expiry
    pub expires_at: Time,

    /// Reads served from this entry
    pub hit_count: u64,

    /// Approximate payload size
    pub size_bytes: usize,
}

impl CacheEntry {
    fn is_expired(&self, now: Time) -> bool {
        now > self.expires_at
    }

    fn to_hit(&self) -> CacheHit {
        CacheHit {
            value: self.value.clone(),
            provider: self.provider.clone(),
            cached_at: self.cached_at,
            expires_at: self.expires_at,
            cache_hit: true,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
}

/// In-memory cache with absolute per-entry expiry.
///
/// Expired entries are removed lazily on read (and by `clear_expired`).
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl TtlCache {
    /// Create a cache with the given entry lifetime.
    pub fn new(ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
            counters: Counters::default(),
        }
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Read-only view of one entry, without touching counters.
    pub async fn peek(&self, organism: &str, symbol: &str) -> Option<CacheEntry> {
        let key = cache_key(organism, symbol)?;
        self.entries.read().await.get(&key).cloned()
    }

    fn invalid_key(&self, organism: &str, symbol: &str) -> CacheError {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        CacheError::InvalidKey {
            organism: organism.to_string(),
            symbol: symbol.to_string(),
        }
    }
}

#[async_trait]
impl LookupCache for TtlCache {
    async fn get(&self, organism: &str, symbol: &str) -> Option<CacheHit> {
        let Some(key) = cache_key(organism, symbol) else {
            let err = self.invalid_key(organism, symbol);
            warn!("Cache get rejected: {}", err);
            return None;
        };

        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        let expired = match entries.get_mut(&key) {
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                entry.hit_count += 1;
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.to_hit());
            }
        };

        if expired {
            entries.remove(&key);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache entry {} expired", key);
        }
        None
    }

    async fn set(
        &self,
        organism: &str,
        symbol: &str,
        value: serde_json::Value,
        provider: &str,
    ) -> Result<()> {
        let key = cache_key(organism, symbol).ok_or_else(|| self.invalid_key(organism, symbol))?;

        let now = self.clock.now();
        let size_bytes = key.len() + value.to_string().len();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            provider: provider.to_string(),
            cached_at: now,
            expires_at: now + self.ttl,
            hit_count: 0,
            size_bytes,
        };

        self.entries.write().await.insert(key, entry);
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut by_provider = BTreeMap::new();
        let mut size_bytes = 0;
        for entry in entries.values() {
            *by_provider.entry(entry.provider.clone()).or_insert(0) += 1;
            size_bytes += entry.size_bytes;
        }

        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        CacheStats {
            hits,
            misses,
            writes: self.counters.writes.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            hit_rate: hit_rate(hits, misses),
            entry_count: entries.len(),
            size_bytes,
            by_provider,
        }
    }

    async fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();
        self.counters.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            debug!("Cleared {} expired cache entries", removed);
        }
        removed
    }

    async fn clear_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::ManualClock;
    use serde_json::json;

    fn cache() -> (TtlCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = TtlCache::new(chrono::Duration::days(7), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_cache_key_normalization() {
        assert_eq!(cache_key(" Human ", "brca1"), Some("human:BRCA1".to_string()));
        assert_eq!(cache_key("", "BRCA1"), None);
        assert_eq!(cache_key("human", "  "), None);
    }

    #[tokio::test]
    async fn test_set_then_get_hits() {
        let (cache, _) = cache();
        cache.set("human", "BRCA1", json!({"id": 672}), "mygene").await.unwrap();

        let hit = cache.get("HUMAN", "brca1").await.unwrap();
        assert!(hit.cache_hit);
        assert_eq!(hit.value, json!({"id": 672}));
        assert_eq!(hit.provider, "mygene");

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.by_provider.get("mygene"), Some(&1));
        assert!(stats.size_bytes > 0);
        assert_eq!(cache.peek("human", "BRCA1").await.unwrap().hit_count, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_counts_one_eviction_and_miss() {
        let (cache, clock) = cache();
        cache.set("human", "TP53", json!(7157), "mygene").await.unwrap();

        clock.advance(chrono::Duration::days(7) + chrono::Duration::seconds(1));
        assert!(cache.get("human", "TP53").await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 0);

        // Entry is gone, so a second read is a plain miss.
        assert!(cache.get("human", "TP53").await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_entry_valid_exactly_at_expiry() {
        let (cache, clock) = cache();
        cache.set("mouse", "Trp53", json!(1), "mygene").await.unwrap();
        clock.advance(chrono::Duration::days(7));
        assert!(cache.get("mouse", "TRP53").await.is_some());
    }

    #[tokio::test]
    async fn test_refresh_replaces_value() {
        let (cache, _) = cache();
        cache.set("human", "EGFR", json!("old"), "ensembl").await.unwrap();
        cache.set("human", "EGFR", json!("new"), "mygene").await.unwrap();

        let hit = cache.get("human", "EGFR").await.unwrap();
        assert_eq!(hit.value, json!("new"));
        assert_eq!(hit.provider, "mygene");
        assert_eq!(cache.stats().await.writes, 2);
    }

    #[tokio::test]
    async fn test_invalid_key_counts_error() {
        let (cache, _) = cache();
        assert!(cache.set("", "EGFR", json!(1), "x").await.is_err());
        assert!(cache.get("human", "").await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_batch_operations() {
        let (cache, _) = cache();
        let written = cache
            .set_batch(
                "human",
                vec![("BRCA1".to_string(), json!(1)), ("BRCA2".to_string(), json!(2))],
                "mygene",
            )
            .await;
        assert_eq!(written, 2);

        let symbols = vec!["brca1".to_string(), "BRCA2".to_string(), "KRAS".to_string()];
        let found = cache.get_batch("human", &symbols).await;
        assert_eq!(found.len(), 2);
        assert_eq!(found["brca1"].value, json!(1));
        assert!(!found.contains_key("KRAS"));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_clear_expired_and_all() {
        let (cache, clock) = cache();
        cache.set("human", "A1", json!(1), "p").await.unwrap();
        clock.advance(chrono::Duration::days(8));
        cache.set("human", "A2", json!(2), "p").await.unwrap();

        assert_eq!(cache.clear_expired().await, 1);
        assert_eq!(cache.stats().await.entry_count, 1);
        assert_eq!(cache.clear_all().await, 1);
        assert_eq!(cache.stats().await.entry_count, 0);
        // Counters survive clearing.
        assert_eq!(cache.stats().await.writes, 2);
    }

    #[tokio::test]
    async fn test_concurrent_writers_and_readers() {
        let (cache, _) = cache();
        let cache = Arc::new(cache);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache.set("human", "MYC", json!(i), "p").await.unwrap();
                    cache.get("human", "MYC").await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert!(result.unwrap().is_some());
        }

        let stats = cache.stats().await;
        assert_eq!(stats.writes, 16);
        assert_eq!(stats.hits, 16);
        assert_eq!(stats.entry_count, 1);
    }
}
