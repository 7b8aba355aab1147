//! Checkers for the validation pipeline.
//!
//! Every checker implements either [`AsyncCheck`] (I/O-bound, runs on the
//! runtime) or [`BlockingCheck`] (CPU-bound, runs on the blocking pool).
//! The closed [`CheckerKind`] enum is the only dispatch point.

#![warn(missing_docs)]

mod error;
mod context;
mod checker;
mod registry;

mod schema;
mod rules;
mod guide;
mod variant;
mod matrix;
mod authority;
mod gene;

pub use error::{CheckError, Result};
pub use context::CheckContext;
pub use checker::{AsyncCheck, BlockingCheck, CheckerKind};
pub use registry::CheckerRegistry;

pub use schema::SchemaChecker;
pub use rules::{evaluate_predicate, RuleChecker};
pub use guide::GuideSequenceChecker;
pub use variant::VariantChecker;
pub use matrix::NumericMatrixChecker;
pub use authority::{
    build_authorities, Authorities, EnsemblClient, GeneAuthority, GeneRecord, MyGeneClient,
};
pub use gene::GeneSymbolChecker;

/// Stage name of the schema checker.
pub const SCHEMA_STAGE: &str = "schema";

/// Stage name of the rule checker.
pub const RULES_STAGE: &str = "rules";
