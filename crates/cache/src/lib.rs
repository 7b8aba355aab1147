//! Lookup cache for external authority results.
//!
//! Deduplicates expensive gene/sequence authority calls across checkers and
//! across concurrent validation runs.

#![warn(missing_docs)]

mod error;
mod ttl;
mod noop;

pub use error::{CacheError, Result};
pub use ttl::{cache_key, CacheEntry, TtlCache};
pub use noop::NoopCache;

use async_trait::async_trait;
use datagate_config::CacheConfig;
use datagate_core::{Clock, Time};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A value served from the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHit {
    /// Cached payload
    pub value: serde_json::Value,

    /// Provider that produced the payload
    pub provider: String,

    /// When it was cached
    pub cached_at: Time,

    /// When it expires
    pub expires_at: Time,

    /// Always true for values served from the cache
    pub cache_hit: bool,
}

/// Cache counters. All counters only grow for the cache's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,

    /// Lookups not served from the cache
    pub misses: u64,

    /// Entries written
    pub writes: u64,

    /// Entries removed because they expired
    pub evictions: u64,

    /// Rejected operations (invalid keys)
    pub errors: u64,

    /// hits / (hits + misses)
    pub hit_rate: f64,

    /// Live entries
    pub entry_count: usize,

    /// Approximate payload size of live entries
    pub size_bytes: usize,

    /// Live entries per provider
    pub by_provider: BTreeMap<String, usize>,
}

/// Key-value store for authority lookups keyed by `(organism, symbol)`.
///
/// Implementations must be safe to share between concurrent runs.
#[async_trait]
pub trait LookupCache: Send + Sync {
    /// Look up one symbol.
    async fn get(&self, organism: &str, symbol: &str) -> Option<CacheHit>;

    /// Store one symbol.
    async fn set(
        &self,
        organism: &str,
        symbol: &str,
        value: serde_json::Value,
        provider: &str,
    ) -> Result<()>;

    /// Look up many symbols. The result is keyed by the symbol as given.
    async fn get_batch(&self, organism: &str, symbols: &[String]) -> HashMap<String, CacheHit> {
        let mut found = HashMap::new();
        for symbol in symbols {
            if let Some(hit) = self.get(organism, symbol).await {
                found.insert(symbol.clone(), hit);
            }
        }
        found
    }

    /// Store many symbols. Returns how many were written.
    async fn set_batch(
        &self,
        organism: &str,
        entries: Vec<(String, serde_json::Value)>,
        provider: &str,
    ) -> usize {
        let mut written = 0;
        for (symbol, value) in entries {
            if self.set(organism, &symbol, value, provider).await.is_ok() {
                written += 1;
            }
        }
        written
    }

    /// Current counters.
    async fn stats(&self) -> CacheStats;

    /// Drop every expired entry. Returns how many were dropped.
    async fn clear_expired(&self) -> usize;

    /// Drop every entry. Returns how many were dropped.
    async fn clear_all(&self) -> usize;
}

/// Longest TTL honoured (100 years).
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Build the cache described by configuration.
pub fn build_cache(config: &CacheConfig, clock: Arc<dyn Clock>) -> Arc<dyn LookupCache> {
    if config.enabled {
        let ttl = chrono::Duration::seconds(config.ttl_secs.min(MAX_TTL_SECS) as i64);
        Arc::new(TtlCache::new(ttl, clock))
    } else {
        tracing::info!("Lookup cache disabled");
        Arc::new(NoopCache::new())
    }
}

pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
