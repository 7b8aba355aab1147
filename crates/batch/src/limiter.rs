//! Per-provider pacing.

use crate::error::{BatchError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Serializes calls to one provider and enforces a pause between them.
///
/// A permit is held for the whole duration of a batch call, so two callers
/// sharing a limiter never hit the provider at the same time, and the pause
/// set on release applies to whoever calls next.
#[derive(Debug)]
pub struct RateLimiter {
    provider: String,
    next_allowed: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for a provider.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            next_allowed: AsyncMutex::new(None),
        }
    }

    /// Provider tag.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Wait for the provider's next slot.
    ///
    /// Dropping the returned permit without calling `release` frees the
    /// provider without imposing a pause.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<LimiterPermit<'_>> {
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BatchError::Cancelled),
            guard = self.next_allowed.lock() => guard,
        };

        if let Some(at) = *guard {
            if at > Instant::now() {
                debug!("Pacing {} for {:?}", self.provider, at - Instant::now());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(BatchError::Cancelled),
                    _ = tokio::time::sleep_until(at) => {}
                }
            }
        }

        Ok(LimiterPermit { guard })
    }
}

/// Exclusive access to a provider.
#[derive(Debug)]
pub struct LimiterPermit<'a> {
    guard: MutexGuard<'a, Option<Instant>>,
}

impl LimiterPermit<'_> {
    /// Release the provider, keeping it idle for `pause`.
    pub fn release(mut self, pause: Duration) {
        *self.guard = Some(Instant::now() + pause);
    }
}

/// Shared registry of limiters, one per provider.
#[derive(Debug, Default)]
pub struct ProviderLimiters {
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl ProviderLimiters {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The limiter for a provider, created on first use.
    pub fn get(&self, provider: &str) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
        limiters
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(provider)))
            .clone()
    }
}
