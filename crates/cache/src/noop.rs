//! Cache used when caching is disabled.

use crate::error::Result;
use crate::{CacheHit, CacheStats, LookupCache};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// A cache that stores nothing. Every lookup is a miss.
#[derive(Debug, Default)]
pub struct NoopCache {
    misses: AtomicU64,
}

impl NoopCache {
    /// Create a no-op cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LookupCache for NoopCache {
    async fn get(&self, _organism: &str, _symbol: &str) -> Option<CacheHit> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn set(
        &self,
        _organism: &str,
        _symbol: &str,
        _value: serde_json::Value,
        _provider: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            misses: self.misses.load(Ordering::Relaxed),
            ..Default::default()
        }
    }

    async fn clear_expired(&self) -> usize {
        0
    }

    async fn clear_all(&self) -> usize {
        0
    }
}
