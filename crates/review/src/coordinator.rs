//! Review coordinator.

use crate::error::{ReviewError, Result};
use crate::patterns::{PatternSnapshot, PatternStore};
use crate::scoring::{informativeness, priority_for, route};
use datagate_config::{ReviewConfig, ValidationConfig};
use datagate_core::{
    CheckResult, Clock, Decision, Issue, IssueSignature, LearnedPattern, PrioritizedIssue, Report,
    ReviewFeedback, ReviewId, ReviewPriority, ReviewStatus, ReviewTask, ReviewerRole, StageCategory, SystemClock,
};
use datagate_policy::{PolicyEngine, ReviewSignals};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Stage name under which the review outcome is recorded.
pub const REVIEW_STAGE: &str = "human_review";

/// A review task opened for a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// The stored task
    pub task: ReviewTask,

    /// Decision reached from learned patterns, replacing the policy verdict
    pub override_decision: Option<Decision>,

    /// Explanation for the report
    pub rationale: String,
}

impl ReviewOutcome {
    /// Whether the task was closed without a human.
    pub fn auto_resolved(&self) -> bool {
        self.override_decision.is_some()
    }

    /// Record this outcome as a pipeline stage.
    pub fn to_check_result(&self, records_processed: usize, elapsed: Duration) -> CheckResult {
        let task = &self.task;
        CheckResult::from_issues(REVIEW_STAGE, StageCategory::Decision, Vec::new(), records_processed, elapsed)
            .with_metadata("review_id", task.review_id.to_string())
            .with_metadata("status", serde_json::to_value(task.status).unwrap_or_default())
            .with_metadata("priority", serde_json::to_value(task.priority).unwrap_or_default())
            .with_metadata("reviewer_role", serde_json::to_value(task.reviewer_role).unwrap_or_default())
            .with_metadata("selected_issues", task.issues.len())
            .with_metadata("auto_resolved", self.auto_resolved())
    }
}

/// What happened to submitted feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    /// Feedback was stored and patterns learned from it
    Applied {
        /// Signatures whose pattern changed
        patterns_updated: usize,
    },
    /// Feedback was rejected; nothing changed
    Ignored {
        /// Why
        reason: String,
    },
}

/// Prioritizes issues, opens review tasks and learns from feedback.
///
/// Shared across concurrent validation runs: tasks and patterns sit behind
/// async locks and every feedback event is applied under one write lock.
pub struct ReviewCoordinator {
    config: ReviewConfig,
    policy: PolicyEngine,
    patterns: Arc<PatternStore>,
    tasks: RwLock<HashMap<ReviewId, ReviewTask>>,
    clock: Arc<dyn Clock>,
}

impl ReviewCoordinator {
    /// Create a coordinator with an empty pattern store.
    pub fn new(config: ReviewConfig, policy: PolicyEngine) -> Self {
        Self {
            config,
            policy,
            patterns: Arc::new(PatternStore::new()),
            tasks: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a coordinator from a full configuration.
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.review.clone(), PolicyEngine::from_config(&config.policy))
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a pattern store, e.g. one restored from a snapshot.
    pub fn with_patterns(mut self, patterns: Arc<PatternStore>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Review settings.
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// The pattern store.
    pub fn patterns(&self) -> &Arc<PatternStore> {
        &self.patterns
    }

    /// Whether a report needs a human, judged by the policy's triggers.
    pub fn should_trigger(&self, report: &Report) -> bool {
        !self
            .policy
            .review_reasons(&report.severity_counts(), &ReviewSignals::from_report(report))
            .is_empty()
    }

    /// Every issue of the report with priority and informativeness, most
    /// urgent first.
    pub async fn prioritize(&self, report: &Report) -> Vec<PrioritizedIssue> {
        let candidates: Vec<(&str, StageCategory, &Issue)> = report
            .stages
            .iter()
            .filter(|(_, result)| result.category != StageCategory::Decision)
            .flat_map(|(stage, result)| result.issues.iter().map(move |i| (stage, result.category, i)))
            .collect();

        let signatures: Vec<IssueSignature> = candidates.iter().map(|(_, _, i)| i.signature()).collect();
        let known = self.patterns.get_many(signatures.iter()).await;

        let mut prioritized: Vec<PrioritizedIssue> = candidates
            .into_iter()
            .zip(signatures)
            .map(|((stage, category, issue), signature)| {
                let pattern = known.get(&signature);
                PrioritizedIssue {
                    priority: priority_for(issue, pattern),
                    informativeness: informativeness(pattern, &self.config),
                    issue: issue.clone(),
                    stage: stage.to_string(),
                    category,
                    signature,
                }
            })
            .collect();

        prioritized.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.informativeness.total_cmp(&a.informativeness))
        });
        prioritized
    }

    /// Keep high-priority issues and those above the informativeness
    /// threshold, up to the configured maximum.
    pub fn select_informative(&self, prioritized: Vec<PrioritizedIssue>) -> Vec<PrioritizedIssue> {
        prioritized
            .into_iter()
            .filter(|p| p.priority >= ReviewPriority::High || p.informativeness > self.config.informativeness_threshold)
            .take(self.config.max_selected)
            .collect()
    }

    /// Reviewer role for a selection of issues.
    pub fn route_to_reviewer(&self, selected: &[PrioritizedIssue]) -> ReviewerRole {
        route(selected)
    }

    /// Decision learned for an issue, if its pattern is settled enough.
    ///
    /// System errors are never resolved automatically.
    pub async fn try_auto_resolve(&self, issue: &Issue) -> Option<Decision> {
        if issue.is_system_error() {
            return None;
        }
        let pattern = self.patterns.get(&issue.signature()).await?;
        self.settled(&pattern)
    }

    fn settled(&self, pattern: &LearnedPattern) -> Option<Decision> {
        if pattern.consistency > self.config.auto_resolve_consistency
            && pattern.feedback_count > self.config.auto_resolve_min_feedback
        {
            pattern.modal_decision()
        } else {
            None
        }
    }

    /// Open a review task for a report.
    ///
    /// When every selected issue has a settled pattern the task is completed
    /// immediately and the strictest learned decision overrides the policy.
    pub async fn open_review(&self, report: &Report) -> ReviewOutcome {
        let reasons = self
            .policy
            .review_reasons(&report.severity_counts(), &ReviewSignals::from_report(report));
        let selected = self.select_informative(self.prioritize(report).await);
        let sighted: HashSet<&IssueSignature> = selected.iter().map(|p| &p.signature).collect();
        self.patterns.observe_all(sighted, self.clock.now()).await;

        let mut learned = Vec::with_capacity(selected.len());
        for p in &selected {
            learned.push(self.try_auto_resolve(&p.issue).await);
        }
        let override_decision = if selected.is_empty() {
            None
        } else {
            learned.iter().copied().collect::<Option<Vec<_>>>().and_then(|d| d.into_iter().max())
        };

        let priority = selected.iter().map(|p| p.priority).max().unwrap_or(ReviewPriority::Low);
        let status = if override_decision.is_some() {
            ReviewStatus::Completed
        } else if priority == ReviewPriority::Critical {
            ReviewStatus::Escalated
        } else {
            ReviewStatus::Pending
        };

        let now = self.clock.now();
        let task = ReviewTask {
            review_id: ReviewId::new(),
            validation_id: report.validation_id,
            dataset_id: report.dataset_id.clone(),
            priority,
            status,
            reviewer_role: self.route_to_reviewer(&selected),
            issues: selected,
            auto_decision: override_decision,
            feedback: None,
            created_at: now,
            updated_at: now,
        };

        let rationale = match override_decision {
            Some(decision) => format!(
                "auto-resolved as {} from learned patterns for {} issue(s)",
                decision,
                task.issues.len()
            ),
            None => format!(
                "review required ({}); {} issue(s) routed to {:?}",
                if reasons.is_empty() { "requested".to_string() } else { reasons.join(", ") },
                task.issues.len(),
                task.reviewer_role
            ),
        };

        info!(
            "Opened review {} for dataset {} ({:?}, {:?}, {} issues)",
            task.review_id,
            task.dataset_id,
            task.status,
            task.priority,
            task.issues.len()
        );
        self.tasks.write().await.insert(task.review_id, task.clone());

        ReviewOutcome {
            task,
            override_decision,
            rationale,
        }
    }

    /// Mark a task as being worked on.
    pub async fn start_review(&self, review_id: ReviewId) -> Result<ReviewTask> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&review_id).ok_or(ReviewError::NotFound(review_id))?;
        if !task.status.is_open() {
            return Err(ReviewError::Closed(review_id));
        }
        task.status = ReviewStatus::InProgress;
        task.updated_at = self.clock.now();
        Ok(task.clone())
    }

    /// Apply reviewer feedback.
    ///
    /// Invalid feedback is logged and ignored; it never fails the caller and
    /// never touches the pattern store.
    pub async fn capture_feedback(&self, review_id: ReviewId, feedback: ReviewFeedback) -> FeedbackOutcome {
        let mut tasks = self.tasks.write().await;

        let decisions = match tasks.get(&review_id) {
            None => Err(format!("unknown review {}", review_id)),
            Some(task) => validate_feedback(task, &feedback),
        };
        let decisions = match decisions {
            Ok(d) => d,
            Err(reason) => {
                warn!("Ignoring feedback for review {}: {}", review_id, reason);
                return FeedbackOutcome::Ignored { reason };
            }
        };

        let now = self.clock.now();
        self.patterns.record_all(&decisions, now).await;

        if let Some(task) = tasks.get_mut(&review_id) {
            task.status = ReviewStatus::Completed;
            task.feedback = Some(feedback);
            task.updated_at = now;
        }
        info!("Captured feedback for review {} ({} patterns)", review_id, decisions.len());

        FeedbackOutcome::Applied {
            patterns_updated: decisions.len(),
        }
    }

    /// Apply feedback in its JSON form. Malformed payloads are ignored.
    pub async fn capture_feedback_json(&self, review_id: ReviewId, payload: serde_json::Value) -> FeedbackOutcome {
        match serde_json::from_value::<ReviewFeedback>(payload) {
            Ok(feedback) => self.capture_feedback(review_id, feedback).await,
            Err(e) => {
                warn!("Ignoring malformed feedback for review {}: {}", review_id, e);
                FeedbackOutcome::Ignored {
                    reason: format!("malformed feedback: {}", e),
                }
            }
        }
    }

    /// A task by id.
    pub async fn task(&self, review_id: ReviewId) -> Option<ReviewTask> {
        self.tasks.read().await.get(&review_id).cloned()
    }

    /// Open tasks, most urgent first.
    pub async fn pending_tasks(&self) -> Vec<ReviewTask> {
        let mut open: Vec<ReviewTask> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.status.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        open
    }

    /// Learned pattern for a signature.
    pub async fn pattern(&self, signature: &IssueSignature) -> Option<LearnedPattern> {
        self.patterns.get(signature).await
    }

    /// Snapshot the learned patterns.
    pub async fn export_patterns(&self) -> PatternSnapshot {
        self.patterns.export(self.clock.now()).await
    }

    /// Restore learned patterns from a snapshot.
    pub async fn import_patterns(&self, snapshot: PatternSnapshot) -> Result<usize> {
        self.patterns.import(snapshot).await
    }
}

impl std::fmt::Debug for ReviewCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One decision per distinct selected signature, or why the feedback is
/// unusable.
fn validate_feedback(
    task: &ReviewTask,
    feedback: &ReviewFeedback,
) -> std::result::Result<Vec<(IssueSignature, Decision)>, String> {
    if !task.status.is_open() {
        return Err(format!("review {} is already completed", task.review_id));
    }
    if feedback.reviewer.trim().is_empty() {
        return Err("reviewer is empty".to_string());
    }
    if feedback.decision == Decision::Error || feedback.issue_decisions.iter().any(|d| d.decision == Decision::Error) {
        return Err("error is not a reviewer decision".to_string());
    }

    let in_task: HashSet<&IssueSignature> = task.issues.iter().map(|p| &p.signature).collect();
    let mut overrides = HashMap::new();
    for d in &feedback.issue_decisions {
        if !in_task.contains(&d.signature) {
            return Err(format!("signature {} is not part of this review", d.signature));
        }
        overrides.insert(&d.signature, d.decision);
    }

    let mut seen = HashSet::new();
    let decisions = task
        .issues
        .iter()
        .filter(|p| seen.insert(&p.signature))
        .map(|p| {
            let decision = overrides.get(&p.signature).copied().unwrap_or(feedback.decision);
            (p.signature.clone(), decision)
        })
        .collect();
    debug!("Feedback for review {} validated", task.review_id);
    Ok(decisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{IssueDecision, ManualClock, ReviewerRole, RulesetMetadata, Severity};

    fn result(name: &str, category: StageCategory, issues: Vec<Issue>) -> CheckResult {
        CheckResult::from_issues(name, category, issues, 10, Duration::ZERO)
    }

    fn report(stages: Vec<CheckResult>) -> Report {
        let mut report = Report::begin("ds-1", RulesetMetadata::default(), chrono::Utc::now());
        for stage in stages {
            let name = stage.checker_name.clone();
            report.record_stage(name, stage).unwrap();
        }
        report
    }

    fn gc_warning() -> Issue {
        Issue::new("sequence", "GC content 0.85 outside 0.2..0.8", Severity::Warning).with_rule("guide.gc_content")
    }

    fn warnings(n: usize) -> Vec<Issue> {
        (0..n).map(|_| gc_warning()).collect()
    }

    fn coordinator() -> ReviewCoordinator {
        ReviewCoordinator::new(ReviewConfig::default(), PolicyEngine::default())
    }

    fn feedback(decision: Decision) -> ReviewFeedback {
        ReviewFeedback {
            reviewer: "alice".to_string(),
            decision,
            issue_decisions: Vec::new(),
            comments: String::new(),
        }
    }

    async fn teach(coordinator: &ReviewCoordinator, signature: &IssueSignature, decisions: &[Decision]) {
        let pairs: Vec<_> = decisions.iter().map(|d| (signature.clone(), *d)).collect();
        coordinator.patterns().record_all(&pairs, chrono::Utc::now()).await;
    }

    #[test]
    fn test_should_trigger_follows_policy() {
        let c = coordinator();
        assert!(!c.should_trigger(&report(vec![result("guide_sequence", StageCategory::Biological, warnings(2))])));
        assert!(c.should_trigger(&report(vec![result("guide_sequence", StageCategory::Biological, warnings(15))])));
        assert!(c.should_trigger(&report(vec![result(
            "rules",
            StageCategory::Rule,
            vec![Issue::new("x", "bad", Severity::Critical)]
        )])));
    }

    #[tokio::test]
    async fn test_prioritize_orders_by_priority() {
        let c = coordinator();
        let r = report(vec![
            result("rules", StageCategory::Rule, vec![Issue::new("a", "m", Severity::Info), Issue::new("b", "m", Severity::Warning)]),
            result("variant", StageCategory::Biological, vec![Issue::new("c", "m", Severity::Error)]),
        ]);

        let prioritized = c.prioritize(&r).await;
        let priorities: Vec<_> = prioritized.iter().map(|p| p.priority).collect();
        assert_eq!(priorities, vec![ReviewPriority::Critical, ReviewPriority::Medium, ReviewPriority::Low]);
        assert_eq!(prioritized[0].stage, "variant");
        assert_eq!(prioritized[0].category, StageCategory::Biological);
    }

    #[tokio::test]
    async fn test_known_error_is_high_and_less_informative() {
        let c = coordinator();
        let issue = Issue::new("chrom", "unknown contig", Severity::Error).with_rule("variant.unknown_chromosome");
        teach(&c, &issue.signature(), &[Decision::Accepted; 5]).await;

        let prioritized = c.prioritize(&report(vec![result("variant", StageCategory::Biological, vec![issue])])).await;
        assert_eq!(prioritized[0].priority, ReviewPriority::High);
        assert!((prioritized[0].informativeness - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_repeat_sightings_lower_novelty() {
        let c = coordinator();
        let issue = Issue::new("chrom", "unknown contig", Severity::Error).with_rule("variant.unknown_chromosome");
        teach(&c, &issue.signature(), &[Decision::Accepted; 5]).await;
        let r = report(vec![result("variant", StageCategory::Biological, vec![issue.clone()])]);

        c.open_review(&r).await;

        let pattern = c.pattern(&issue.signature()).await.unwrap();
        assert_eq!(pattern.seen_count, 6);
        assert_eq!(pattern.feedback_count, 5);
        // 0.6 * (1 - 5/10) + 0.4 * (1 - 6/10)
        let prioritized = c.prioritize(&r).await;
        assert!((prioritized[0].informativeness - 0.46).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_selection_threshold_and_cap() {
        let c = ReviewCoordinator::new(
            ReviewConfig {
                max_selected: 3,
                ..ReviewConfig::default()
            },
            PolicyEngine::default(),
        );
        let settled = gc_warning();
        teach(&c, &settled.signature(), &[Decision::Accepted; 10]).await;

        let prioritized = c.prioritize(&report(vec![result("guide_sequence", StageCategory::Biological, warnings(2))])).await;
        assert!(c.select_informative(prioritized).is_empty());

        let novel: Vec<Issue> = (0..5).map(|i| Issue::new(format!("col{}", i), "m", Severity::Warning)).collect();
        let prioritized = c.prioritize(&report(vec![result("rules", StageCategory::Rule, novel)])).await;
        assert_eq!(c.select_informative(prioritized).len(), 3);
    }

    #[tokio::test]
    async fn test_auto_resolve_gate() {
        let c = coordinator();
        let issue = gc_warning();

        let mut history = vec![Decision::Accepted; 9];
        history.push(Decision::Rejected);
        teach(&c, &issue.signature(), &history).await;
        assert_eq!(c.try_auto_resolve(&issue).await, Some(Decision::Accepted));

        let other = Issue::new("sequence", "poly-T run", Severity::Warning).with_rule("guide.homopolymer");
        teach(&c, &other.signature(), &[Decision::Accepted; 3]).await;
        assert_eq!(c.try_auto_resolve(&other).await, None);

        assert_eq!(c.try_auto_resolve(&Issue::new("x", "never seen", Severity::Info)).await, None);
    }

    #[tokio::test]
    async fn test_system_errors_never_auto_resolve() {
        let c = coordinator();
        let issue = Issue::system_error("gene_symbol", "authority unreachable");
        teach(&c, &issue.signature(), &[Decision::Accepted; 20]).await;
        assert_eq!(c.try_auto_resolve(&issue).await, None);
    }

    #[tokio::test]
    async fn test_open_review_routes_and_escalates() {
        let c = coordinator();
        let r = report(vec![
            result("schema", StageCategory::Structural, vec![Issue::new("id", "missing", Severity::Error)]),
            result(
                "variant",
                StageCategory::Biological,
                vec![Issue::new("ref", "bad", Severity::Error), Issue::new("alt", "bad", Severity::Error)],
            ),
        ]);

        let outcome = c.open_review(&r).await;
        assert!(!outcome.auto_resolved());
        assert_eq!(outcome.task.status, ReviewStatus::Escalated);
        assert_eq!(outcome.task.priority, ReviewPriority::Critical);
        assert_eq!(outcome.task.reviewer_role, ReviewerRole::BiologicalCurator);
        assert_eq!(outcome.task.validation_id, r.validation_id);
        assert!(outcome.rationale.contains("error=3 >= 3"));

        let pending = c.pending_tasks().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(c.task(outcome.task.review_id).await.unwrap(), outcome.task);
    }

    #[tokio::test]
    async fn test_open_review_auto_resolves_settled_issues() {
        let c = coordinator();
        let issue = gc_warning();
        let mut history = vec![Decision::ConditionalAccept; 9];
        history.push(Decision::Accepted);
        teach(&c, &issue.signature(), &history).await;

        // Settled patterns are not selected on informativeness alone, so
        // use an error that is known and therefore high priority.
        let error = Issue::new("pam", "non-canonical PAM", Severity::Error).with_rule("guide.pam");
        teach(&c, &error.signature(), &[Decision::Rejected; 8]).await;

        let outcome = c
            .open_review(&report(vec![result("guide_sequence", StageCategory::Biological, vec![issue, error])]))
            .await;
        assert!(outcome.auto_resolved());
        assert_eq!(outcome.override_decision, Some(Decision::Rejected));
        assert_eq!(outcome.task.status, ReviewStatus::Completed);
        assert_eq!(outcome.task.issues.len(), 1);
        assert!(c.pending_tasks().await.is_empty());

        let stage = outcome.to_check_result(10, Duration::ZERO);
        assert_eq!(stage.checker_name, REVIEW_STAGE);
        assert_eq!(stage.metadata["auto_resolved"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_feedback_teaches_patterns() {
        let c = coordinator();
        let variant = Issue::new("ref", "bad", Severity::Error).with_rule("variant.ref_allele");
        let r = report(vec![result("variant", StageCategory::Biological, vec![variant.clone(), variant.clone(), gc_warning()])]);
        let outcome = c.open_review(&r).await;
        let id = outcome.task.review_id;

        let mut fb = feedback(Decision::Accepted);
        fb.issue_decisions.push(IssueDecision {
            signature: variant.signature(),
            decision: Decision::Rejected,
        });
        assert_eq!(c.capture_feedback(id, fb).await, FeedbackOutcome::Applied { patterns_updated: 2 });

        let learned = c.pattern(&variant.signature()).await.unwrap();
        assert_eq!(learned.history, vec![Decision::Rejected]);
        assert_eq!(c.pattern(&gc_warning().signature()).await.unwrap().history, vec![Decision::Accepted]);

        let task = c.task(id).await.unwrap();
        assert_eq!(task.status, ReviewStatus::Completed);
        assert_eq!(task.feedback.unwrap().reviewer, "alice");

        // A second submission for the same task is ignored.
        let again = c.capture_feedback(id, feedback(Decision::Rejected)).await;
        assert!(matches!(again, FeedbackOutcome::Ignored { .. }));
        assert_eq!(c.pattern(&variant.signature()).await.unwrap().feedback_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_feedback_is_ignored() {
        let c = coordinator();
        let outcome = c
            .open_review(&report(vec![result("variant", StageCategory::Biological, vec![Issue::new("ref", "bad", Severity::Error)])]))
            .await;
        let id = outcome.task.review_id;

        let mut anonymous = feedback(Decision::Accepted);
        anonymous.reviewer = "  ".to_string();
        let mut stranger = feedback(Decision::Accepted);
        stranger.issue_decisions.push(IssueDecision {
            signature: IssueSignature::new(Some("other"), "x", Severity::Info),
            decision: Decision::Accepted,
        });

        for bad in [anonymous, feedback(Decision::Error), stranger] {
            assert!(matches!(c.capture_feedback(id, bad).await, FeedbackOutcome::Ignored { .. }));
        }
        assert!(matches!(
            c.capture_feedback(ReviewId::new(), feedback(Decision::Accepted)).await,
            FeedbackOutcome::Ignored { .. }
        ));
        assert!(matches!(
            c.capture_feedback_json(id, serde_json::json!({"decision": "accepted"})).await,
            FeedbackOutcome::Ignored { .. }
        ));

        assert!(c.patterns().is_empty().await);
        assert!(c.task(id).await.unwrap().status.is_open());
    }

    #[tokio::test]
    async fn test_feedback_json_and_lifecycle() {
        let clock = Arc::new(ManualClock::default());
        let c = coordinator().with_clock(clock.clone());
        let outcome = c
            .open_review(&report(vec![result("rules", StageCategory::Rule, warnings(15))]))
            .await;
        let id = outcome.task.review_id;
        assert_eq!(outcome.task.status, ReviewStatus::Pending);
        assert_eq!(outcome.task.reviewer_role, ReviewerRole::RulesAnalyst);

        clock.advance(chrono::Duration::minutes(5));
        let started = c.start_review(id).await.unwrap();
        assert_eq!(started.status, ReviewStatus::InProgress);
        assert!(started.updated_at > started.created_at);

        let applied = c
            .capture_feedback_json(id, serde_json::json!({"reviewer": "bob", "decision": "conditional_accept"}))
            .await;
        assert_eq!(applied, FeedbackOutcome::Applied { patterns_updated: 1 });
        assert_eq!(c.start_review(id).await, Err(ReviewError::Closed(id)));
        assert!(matches!(c.start_review(ReviewId::new()).await, Err(ReviewError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_patterns_roundtrip_through_coordinator() {
        let c = coordinator();
        teach(&c, &gc_warning().signature(), &[Decision::Accepted; 7]).await;
        let snapshot = c.export_patterns().await;

        let restored = coordinator();
        assert_eq!(restored.import_patterns(snapshot).await, Ok(1));
        assert_eq!(restored.pattern(&gc_warning().signature()).await.unwrap().feedback_count, 7);
    }
}
