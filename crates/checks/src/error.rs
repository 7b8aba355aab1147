//! Checker errors.
//!
//! A `CheckError` is a system failure, not a data finding. The orchestrator
//! folds it into a synthetic critical issue for the failing stage.

use datagate_batch::BatchError;

/// Result type for checker operations.
pub type Result<T> = std::result::Result<T, CheckError>;

/// Errors raised while running a checker.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The run was cancelled
    #[error("check cancelled")]
    Cancelled,

    /// A column the checker depends on is absent
    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    /// A configured rule cannot be evaluated
    #[error("invalid rule {rule}: {message}")]
    InvalidRule {
        /// Rule id
        rule: String,
        /// What is wrong with it
        message: String,
    },

    /// Registry already holds a checker with this name
    #[error("checker '{0}' is already registered")]
    Duplicate(String),

    /// External authority returned an unusable response
    #[error("authority {provider} failed: {message}")]
    Authority {
        /// Provider tag
        provider: String,
        /// Failure description
        message: String,
    },

    /// HTTP transport failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The checker panicked
    #[error("checker panicked: {0}")]
    Panicked(String),

    /// Invalid batch parameters
    #[error("batch error: {0}")]
    Batch(String),
}

impl From<BatchError> for CheckError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Cancelled => CheckError::Cancelled,
            other => CheckError::Batch(other.to_string()),
        }
    }
}
