//! Validation pipeline.
//!
//! Drives a dataset through the stage machine
//! `SCHEMA → RULES → FORMAT_CHECKS → POLICY → HUMAN_REVIEW → COMPLETE`
//! and produces a sealed [`Report`](datagate_core::Report).

#![warn(missing_docs)]

mod error;
mod stage;
mod orchestrator;

pub use error::{PipelineError, Result};
pub use stage::Stage;
pub use orchestrator::Orchestrator;
