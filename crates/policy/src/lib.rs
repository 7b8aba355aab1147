//! Decision policy.
//!
//! Translates severity counts into an accepted / conditional_accept /
//! rejected verdict through an ordered table of structured rules, and
//! decides independently whether a human must look at the result.

#![warn(missing_docs)]

mod engine;
mod signals;

pub use engine::{PolicyEngine, PolicyOutcome, POLICY_STAGE};
pub use signals::ReviewSignals;
