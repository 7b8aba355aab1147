//! Batch processing errors.

/// Error type for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Errors that abort a batch job.
///
/// Individual batch failures never abort a job; they become per-item error
/// results. Only cancellation stops a job early.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// The caller cancelled the job
    #[error("batch job cancelled")]
    Cancelled,

    /// Invalid parameters
    #[error("invalid batch parameters: {0}")]
    Invalid(String),
}
