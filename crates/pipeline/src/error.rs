//! Pipeline errors.
//!
//! Checker failures never surface here; they are folded into the report.
//! These are setup failures and broken report invariants.

use datagate_checks::CheckError;
use datagate_config::ConfigError;
use datagate_core::CoreError;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A checker or authority client could not be built
    #[error("setup error: {0}")]
    Setup(#[from] CheckError),

    /// The report rejected a write
    #[error("report error: {0}")]
    Report(#[from] CoreError),
}
