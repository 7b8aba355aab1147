//! Human-in-the-loop review.
//!
//! Prioritizes the issues of a report, selects the most informative ones,
//! routes them to a specialist, and learns from reviewer feedback so that
//! consistently decided issue kinds can be resolved without a human.

#![warn(missing_docs)]

mod error;
mod scoring;
mod patterns;
mod coordinator;

pub use error::{ReviewError, Result};
pub use scoring::{informativeness, priority_for, route};
pub use patterns::{PatternSnapshot, PatternStore, SNAPSHOT_VERSION};
pub use coordinator::{FeedbackOutcome, ReviewCoordinator, ReviewOutcome, REVIEW_STAGE};
