//! Review errors.

use datagate_core::ReviewId;

/// Result type for review operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Errors from review task management.
///
/// Feedback capture never returns these; malformed feedback is reported as
/// an ignored outcome instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReviewError {
    /// No task with this id
    #[error("review {0} not found")]
    NotFound(ReviewId),

    /// The task is already completed
    #[error("review {0} is already completed")]
    Closed(ReviewId),

    /// A pattern snapshot with an unknown format version
    #[error("unsupported pattern snapshot version {0}")]
    UnsupportedSnapshot(u32),
}
