//! Human review model - tasks, feedback and learned patterns.

use crate::id::{ReviewId, ValidationId};
use crate::issue::{Issue, IssueSignature};
use crate::report::Decision;
use crate::result::StageCategory;
use crate::Time;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Review priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Review task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InProgress,
    Completed,
    Escalated,
}

impl ReviewStatus {
    /// Whether feedback can still be captured.
    pub fn is_open(&self) -> bool {
        !matches!(self, ReviewStatus::Completed)
    }
}

/// Specialist role a review is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerRole {
    /// Domain (sequence/variant/gene) findings
    BiologicalCurator,
    /// Schema and column structure findings
    DataEngineer,
    /// Generic rule findings
    RulesAnalyst,
    /// Mixed or tied findings
    QualitySpecialist,
}

impl ReviewerRole {
    /// The specialist for a stage category.
    pub fn for_category(category: StageCategory) -> Self {
        match category {
            StageCategory::Biological => ReviewerRole::BiologicalCurator,
            StageCategory::Structural => ReviewerRole::DataEngineer,
            StageCategory::Rule => ReviewerRole::RulesAnalyst,
            StageCategory::Decision => ReviewerRole::QualitySpecialist,
        }
    }
}

/// An issue tagged with review priority and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedIssue {
    /// The issue
    pub issue: Issue,

    /// Stage that produced it
    pub stage: String,

    /// Category of that stage
    pub category: StageCategory,

    /// Assigned priority
    pub priority: ReviewPriority,

    /// Issue signature
    pub signature: IssueSignature,

    /// Informativeness score, 0..=1
    pub informativeness: f64,
}

/// A reviewer's decision about one issue kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDecision {
    /// Which issue kind
    pub signature: IssueSignature,

    /// The decision
    pub decision: Decision,
}

/// Feedback submitted by a reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    /// Who reviewed
    pub reviewer: String,

    /// Overall decision for the dataset
    pub decision: Decision,

    /// Per-issue decisions. When empty, the overall decision applies to
    /// every selected issue.
    #[serde(default)]
    pub issue_decisions: Vec<IssueDecision>,

    /// Free text
    #[serde(default)]
    pub comments: String,
}

/// A unit of work for a human reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewTask {
    /// Unique identifier
    pub review_id: ReviewId,

    /// Validation run under review
    pub validation_id: ValidationId,

    /// Dataset under review
    pub dataset_id: String,

    /// Highest priority among selected issues
    pub priority: ReviewPriority,

    /// Current status
    pub status: ReviewStatus,

    /// Issues selected for review
    pub issues: Vec<PrioritizedIssue>,

    /// Who should review
    pub reviewer_role: ReviewerRole,

    /// Decision reached without a human, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_decision: Option<Decision>,

    /// Feedback once resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<ReviewFeedback>,

    /// When created
    pub created_at: Time,

    /// When last changed
    pub updated_at: Time,
}

/// Accumulated reviewer decisions for one issue signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    /// Issue signature
    pub signature: IssueSignature,

    /// Times this signature was seen, in feedback or in a later review
    pub seen_count: u32,

    /// Number of feedback events
    pub feedback_count: u32,

    /// Past decisions, oldest first
    pub history: Vec<Decision>,

    /// Share of history held by the modal decision
    pub consistency: f64,

    /// When first recorded
    pub first_seen: Time,

    /// When last updated
    pub last_updated: Time,
}

impl LearnedPattern {
    /// Start an empty pattern.
    pub fn new(signature: IssueSignature, now: Time) -> Self {
        Self {
            signature,
            seen_count: 0,
            feedback_count: 0,
            history: Vec::new(),
            consistency: 0.0,
            first_seen: now,
            last_updated: now,
        }
    }

    /// Count a sighting in a review that carries no decision yet.
    pub fn observe(&mut self, now: Time) {
        self.seen_count += 1;
        self.last_updated = now;
    }

    /// Record one reviewer decision.
    pub fn record(&mut self, decision: Decision, now: Time) {
        self.seen_count += 1;
        self.feedback_count += 1;
        self.history.push(decision);
        self.consistency = self
            .modal()
            .map(|(_, count)| count as f64 / self.history.len() as f64)
            .unwrap_or(0.0);
        self.last_updated = now;
    }

    /// Most common past decision. Ties go to the stricter decision.
    pub fn modal_decision(&self) -> Option<Decision> {
        self.modal().map(|(d, _)| d)
    }

    fn modal(&self) -> Option<(Decision, usize)> {
        let mut counts: HashMap<Decision, usize> = HashMap::new();
        for d in &self.history {
            *counts.entry(*d).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by(|(da, ca), (db, cb)| ca.cmp(cb).then(da.cmp(db)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;

    fn sig() -> IssueSignature {
        IssueSignature::new(Some("gc_content"), "sequence", Severity::Warning)
    }

    #[test]
    fn test_pattern_consistency_tracks_modal_share() {
        let now = chrono::Utc::now();
        let mut p = LearnedPattern::new(sig(), now);
        assert_eq!(p.modal_decision(), None);

        p.record(Decision::Accepted, now);
        p.record(Decision::Accepted, now);
        p.record(Decision::Rejected, now);
        p.record(Decision::Accepted, now);

        assert_eq!(p.feedback_count, 4);
        assert_eq!(p.seen_count, 4);
        assert_eq!(p.modal_decision(), Some(Decision::Accepted));
        assert!((p.consistency - 0.75).abs() < 1e-9);

        p.observe(now);
        assert_eq!(p.seen_count, 5);
        assert_eq!(p.feedback_count, 4);
        assert!((p.consistency - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_modal_tie_prefers_stricter() {
        let now = chrono::Utc::now();
        let mut p = LearnedPattern::new(sig(), now);
        p.record(Decision::Accepted, now);
        p.record(Decision::Rejected, now);
        assert_eq!(p.modal_decision(), Some(Decision::Rejected));
        assert!((p.consistency - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(ReviewPriority::Critical > ReviewPriority::High);
        assert!(ReviewPriority::Medium > ReviewPriority::Low);
    }

    #[test]
    fn test_role_for_category() {
        assert_eq!(ReviewerRole::for_category(StageCategory::Biological), ReviewerRole::BiologicalCurator);
        assert_eq!(ReviewerRole::for_category(StageCategory::Structural), ReviewerRole::DataEngineer);
        assert_eq!(ReviewerRole::for_category(StageCategory::Rule), ReviewerRole::RulesAnalyst);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ReviewStatus::InProgress).unwrap(), "\"in_progress\"");
        assert!(ReviewStatus::Escalated.is_open());
        assert!(!ReviewStatus::Completed.is_open());
    }
}
