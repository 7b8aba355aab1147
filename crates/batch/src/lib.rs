//! Rate-limited batch execution for external authority calls.
//!
//! Splits work into fixed-size batches, paces batches per provider, retries
//! failed batches with linear backoff, and prefers partial success to
//! aborting the whole job.

#![warn(missing_docs)]

mod error;
mod limiter;
mod processor;

pub use error::{BatchError, Result};
pub use limiter::{LimiterPermit, ProviderLimiters, RateLimiter};
pub use processor::{BatchProcessor, BatchRun, BatchSettings, ItemResult};
