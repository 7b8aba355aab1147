//! Batch processor with retry, backoff and fallback.

use crate::error::{BatchError, Result};
use crate::limiter::RateLimiter;
use datagate_config::BatchConfig;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tunables for one processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Default items per batch
    pub batch_size: usize,

    /// Pause after every batch except the last
    pub inter_batch_delay: Duration,

    /// Retries per failed batch
    pub max_retries: u32,

    /// Base retry delay, multiplied by the attempt number
    pub retry_delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for BatchSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Outcome for one input item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult<T, R> {
    /// The input item
    pub item: T,

    /// Value, or the error that remained after retries
    pub outcome: std::result::Result<R, String>,

    /// Provider that produced the outcome
    pub provider: String,

    /// Whether the fallback provider was used
    pub used_fallback: bool,
}

impl<T, R> ItemResult<T, R> {
    /// Whether the item succeeded.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Results of a whole job, one per input item in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRun<T, R> {
    /// Per-item results
    pub results: Vec<ItemResult<T, R>>,

    /// Number of batches
    pub batches: usize,

    /// Number of batch function invocations, retries included
    pub calls_made: u32,

    /// Batches that failed after every retry, summed over the primary and
    /// fallback passes
    pub failed_batches: usize,
}

impl<T, R> BatchRun<T, R> {
    fn empty() -> Self {
        Self {
            results: Vec::new(),
            batches: 0,
            calls_made: 0,
            failed_batches: 0,
        }
    }

    /// Items that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult<T, R>> {
        self.results.iter().filter(|r| !r.is_ok())
    }
}

/// Drives a batch function over a list of items against one provider.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    settings: BatchSettings,
    limiter: Arc<RateLimiter>,
}

impl BatchProcessor {
    /// Create a processor bound to a provider's limiter.
    pub fn new(settings: BatchSettings, limiter: Arc<RateLimiter>) -> Self {
        Self { settings, limiter }
    }

    /// Set the pause between batches.
    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.settings.inter_batch_delay = delay;
        self
    }

    /// Set the retry budget per batch.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.settings.max_retries = max_retries;
        self
    }

    /// Set the base retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.settings.retry_delay = delay;
        self
    }

    /// Processor settings.
    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Provider tag.
    pub fn provider(&self) -> &str {
        self.limiter.provider()
    }

    /// Run `batch_fn` over `items` in batches of `batch_size`.
    ///
    /// `batch_fn` must return one result per input item, in order. A batch
    /// that errors (or returns the wrong number of results) is retried up to
    /// `max_retries` times, waiting `retry_delay × attempt` between tries;
    /// if it still fails, each of its items gets an error result. The job
    /// only stops early when `cancel` fires.
    pub async fn process_batches<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        batch_size: usize,
        batch_fn: F,
        cancel: &CancellationToken,
    ) -> Result<BatchRun<T, R>>
    where
        T: Clone,
        E: Display,
        F: Fn(Vec<T>) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<R>, E>>,
    {
        if batch_size == 0 {
            return Err(BatchError::Invalid("batch_size must be at least 1".to_string()));
        }

        let mut run = BatchRun::empty();
        if items.is_empty() {
            return Ok(run);
        }

        let total_batches = items.len().div_ceil(batch_size);
        let mut items = items.into_iter();
        debug!(
            "Processing {} batches of up to {} against {}",
            total_batches,
            batch_size,
            self.provider()
        );

        for index in 0..total_batches {
            let batch: Vec<T> = items.by_ref().take(batch_size).collect();
            let permit = self.limiter.acquire(cancel).await?;

            let (outcome, calls) = self.run_with_retry(&batch, &batch_fn, cancel).await?;
            run.calls_made += calls;
            run.batches += 1;

            match outcome {
                Ok(values) => {
                    run.results.extend(batch.into_iter().zip(values).map(|(item, value)| ItemResult {
                        item,
                        outcome: Ok(value),
                        provider: self.provider().to_string(),
                        used_fallback: false,
                    }));
                }
                Err(error) => {
                    warn!(
                        "Batch {}/{} against {} failed after {} attempts: {}",
                        index + 1,
                        total_batches,
                        self.provider(),
                        calls,
                        error
                    );
                    run.failed_batches += 1;
                    run.results.extend(batch.into_iter().map(|item| ItemResult {
                        item,
                        outcome: Err(error.clone()),
                        provider: self.provider().to_string(),
                        used_fallback: false,
                    }));
                }
            }

            // The next acquire on this provider waits out the pause.
            permit.release(self.settings.inter_batch_delay);
        }

        Ok(run)
    }

    /// Run against this provider, then send failed items to `fallback`.
    ///
    /// Results stay in input order. Items rescued by the fallback carry
    /// `used_fallback = true`; items that fail both keep both errors.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_with_fallback<T, R, E1, F1, Fut1, E2, F2, Fut2>(
        &self,
        fallback: &BatchProcessor,
        items: Vec<T>,
        batch_size: usize,
        primary_fn: F1,
        fallback_fn: F2,
        cancel: &CancellationToken,
    ) -> Result<BatchRun<T, R>>
    where
        T: Clone,
        E1: Display,
        F1: Fn(Vec<T>) -> Fut1,
        Fut1: Future<Output = std::result::Result<Vec<R>, E1>>,
        E2: Display,
        F2: Fn(Vec<T>) -> Fut2,
        Fut2: Future<Output = std::result::Result<Vec<R>, E2>>,
    {
        let mut run = self.process_batches(items, batch_size, primary_fn, cancel).await?;

        let failed: Vec<usize> = run
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_ok())
            .map(|(i, _)| i)
            .collect();
        if failed.is_empty() {
            return Ok(run);
        }

        info!(
            "Retrying {} items against fallback provider {}",
            failed.len(),
            fallback.provider()
        );
        let retry_items: Vec<T> = failed.iter().map(|&i| run.results[i].item.clone()).collect();
        let rescue = fallback
            .process_batches(retry_items, batch_size, fallback_fn, cancel)
            .await?;

        run.calls_made += rescue.calls_made;
        run.batches += rescue.batches;
        run.failed_batches += rescue.failed_batches;

        for (slot, rescued) in failed.into_iter().zip(rescue.results) {
            let primary_error = match &run.results[slot].outcome {
                Err(e) => e.clone(),
                Ok(_) => String::new(),
            };
            run.results[slot] = ItemResult {
                item: rescued.item,
                outcome: rescued.outcome.map_err(|fallback_error| {
                    format!("primary: {}; fallback: {}", primary_error, fallback_error)
                }),
                provider: rescued.provider,
                used_fallback: true,
            };
        }

        Ok(run)
    }

    async fn run_with_retry<T, R, E, F, Fut>(
        &self,
        batch: &[T],
        batch_fn: &F,
        cancel: &CancellationToken,
    ) -> Result<(std::result::Result<Vec<R>, String>, u32)>
    where
        T: Clone,
        E: Display,
        F: Fn(Vec<T>) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<R>, E>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BatchError::Cancelled),
                result = batch_fn(batch.to_vec()) => result,
            };
            attempt += 1;

            let error = match result {
                Ok(values) if values.len() == batch.len() => return Ok((Ok(values), attempt)),
                Ok(values) => format!(
                    "provider returned {} results for {} items",
                    values.len(),
                    batch.len()
                ),
                Err(e) => e.to_string(),
            };

            if attempt > self.settings.max_retries {
                return Ok((Err(error), attempt));
            }

            let backoff = self.settings.retry_delay * attempt;
            debug!(
                "Batch against {} failed (attempt {}): {}; retrying in {:?}",
                self.provider(),
                attempt,
                error,
                backoff
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BatchError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
