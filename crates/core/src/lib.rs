//! datagate core data models.
//!
//! Datasets, issues, check results, reports and the human review model
//! shared by every stage of the validation pipeline.

#![warn(missing_docs)]

mod id;
mod error;

mod dataset;
mod issue;
mod result;
mod report;
mod review;
mod clock;

// Re-exports
pub use id::{ReviewId, ValidationId};
pub use error::{CoreError, Result};

pub use dataset::{cell_is_blank, cell_number, cell_text, Dataset, DatasetMetadata};
pub use issue::{Issue, IssueSignature, Severity, SeverityCounts, SYSTEM_ERROR_RULE};
pub use result::{duration_seconds, CheckResult, StageCategory};
pub use report::{Decision, Report, RulesetMetadata, Stages};
pub use review::{
    IssueDecision, LearnedPattern, PrioritizedIssue, ReviewFeedback, ReviewPriority,
    ReviewStatus, ReviewTask, ReviewerRole,
};
pub use clock::{Clock, ManualClock, SystemClock};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
