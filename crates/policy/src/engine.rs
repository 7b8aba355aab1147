//! Rule-table decision engine.

use crate::signals::ReviewSignals;
use datagate_config::{CompareOp, CountCondition, CountField, PolicyConfig, PolicyRuleSpec, ReviewTriggers};
use datagate_core::{CheckResult, Decision, Report, SeverityCounts, StageCategory};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Stage name under which the policy outcome is recorded.
pub const POLICY_STAGE: &str = "policy";

/// Result of evaluating the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// Verdict
    pub decision: Decision,

    /// Human-readable explanation quoting the counts that drove the verdict
    pub rationale: String,

    /// Whether a human must review the result
    pub requires_review: bool,

    /// Name of the rule that matched
    pub matched_rule: String,

    /// Why review is required, empty when it is not
    pub review_reasons: Vec<String>,

    /// Counts the decision was made on
    pub counts: SeverityCounts,
}

impl PolicyOutcome {
    /// Record this outcome as a pipeline stage.
    pub fn to_check_result(&self, records_processed: usize, elapsed: Duration) -> CheckResult {
        CheckResult::from_issues(POLICY_STAGE, StageCategory::Decision, Vec::new(), records_processed, elapsed)
            .with_metadata("decision", self.decision.as_str())
            .with_metadata("matched_rule", self.matched_rule.clone())
            .with_metadata("requires_review", self.requires_review)
            .with_metadata("review_reasons", self.review_reasons.clone())
            .with_metadata("counts", serde_json::to_value(self.counts).unwrap_or_default())
    }
}

/// Evaluates an ordered rule table over severity counts.
///
/// Pure: the same counts and signals always give the same outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyEngine {
    rules: Vec<PolicyRuleSpec>,
    triggers: ReviewTriggers,
}

impl PolicyEngine {
    /// Create an engine over a rule table. Rules are ordered by priority;
    /// rules with equal priority keep their table order.
    pub fn new(mut rules: Vec<PolicyRuleSpec>, triggers: ReviewTriggers) -> Self {
        rules.sort_by_key(|r| r.priority);
        Self { rules, triggers }
    }

    /// Engine for a policy configuration, using its explicit table when
    /// present and the threshold table otherwise.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let rules = config
            .rules
            .clone()
            .unwrap_or_else(|| Self::default_rules(config));
        Self::new(rules, config.review.clone())
    }

    /// The threshold table.
    pub fn default_rules(config: &PolicyConfig) -> Vec<PolicyRuleSpec> {
        let rule = |name: &str, priority, conditions: Vec<CountCondition>, decision| PolicyRuleSpec {
            name: name.to_string(),
            priority,
            conditions,
            decision,
        };
        let cond = |field, op, threshold| CountCondition { field, op, threshold };

        vec![
            rule(
                "critical_threshold",
                10,
                vec![cond(CountField::Critical, CompareOp::Ge, config.critical_threshold)],
                Decision::Rejected,
            ),
            rule(
                "error_threshold",
                20,
                vec![cond(CountField::Error, CompareOp::Ge, config.error_threshold)],
                Decision::Rejected,
            ),
            rule(
                "warning_threshold",
                30,
                vec![cond(CountField::Warning, CompareOp::Ge, config.warning_threshold)],
                Decision::ConditionalAccept,
            ),
            rule(
                "moderate_warnings",
                40,
                vec![
                    cond(CountField::Warning, CompareOp::Ge, config.moderate_warning_threshold),
                    cond(CountField::Error, CompareOp::Eq, 0),
                ],
                Decision::ConditionalAccept,
            ),
            rule("default", 1000, Vec::new(), Decision::Accepted),
        ]
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[PolicyRuleSpec] {
        &self.rules
    }

    /// Review triggers.
    pub fn triggers(&self) -> &ReviewTriggers {
        &self.triggers
    }

    /// Decide on counts alone.
    pub fn decide(&self, counts: &SeverityCounts) -> PolicyOutcome {
        self.decide_with_signals(counts, &ReviewSignals::default())
    }

    /// Decide on counts, using confidence and novelty for the review trigger.
    pub fn decide_with_signals(&self, counts: &SeverityCounts, signals: &ReviewSignals) -> PolicyOutcome {
        let matched = self
            .rules
            .iter()
            .find(|rule| rule.conditions.iter().all(|c| holds(c, counts)));

        let (decision, matched_rule, mut rationale) = match matched {
            Some(rule) => (rule.decision, rule.name.clone(), explain(rule, counts)),
            None => (
                Decision::Accepted,
                "none".to_string(),
                "accepted: no policy rule matched".to_string(),
            ),
        };
        rationale.push_str(&format!(
            "; counts critical={}, error={}, warning={}, info={}",
            counts.critical, counts.error, counts.warning, counts.info
        ));

        let review_reasons = self.review_reasons(counts, signals);
        if !review_reasons.is_empty() {
            rationale.push_str(&format!("; review required: {}", review_reasons.join(", ")));
        }

        debug!("Policy decision {} via {}", decision, matched_rule);
        PolicyOutcome {
            decision,
            rationale,
            requires_review: !review_reasons.is_empty(),
            matched_rule,
            review_reasons,
            counts: *counts,
        }
    }

    /// Decide on everything recorded in a report so far.
    pub fn evaluate_report(&self, report: &Report) -> PolicyOutcome {
        self.decide_with_signals(&report.severity_counts(), &ReviewSignals::from_report(report))
    }

    /// Reasons a human must review the result. Empty when none apply.
    pub fn review_reasons(&self, counts: &SeverityCounts, signals: &ReviewSignals) -> Vec<String> {
        let t = &self.triggers;
        let mut reasons = Vec::new();
        if counts.critical > 0 {
            reasons.push(format!("critical={} > 0", counts.critical));
        }
        if counts.error >= t.review_error_threshold {
            reasons.push(format!("error={} >= {}", counts.error, t.review_error_threshold));
        }
        if counts.warning >= t.review_warning_threshold {
            reasons.push(format!("warning={} >= {}", counts.warning, t.review_warning_threshold));
        }
        if let Some(confidence) = signals.min_confidence {
            if confidence < t.confidence_floor {
                reasons.push(format!("confidence {:.2} < {:.2}", confidence, t.confidence_floor));
            }
        }
        if signals.has_novel {
            reasons.push("novel issue".to_string());
        }
        reasons
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

fn holds(condition: &CountCondition, counts: &SeverityCounts) -> bool {
    condition
        .op
        .apply(counts.get(condition.field.severity()), condition.threshold)
}

fn explain(rule: &PolicyRuleSpec, counts: &SeverityCounts) -> String {
    if rule.conditions.is_empty() {
        return format!("{}: no blocking findings", rule.decision);
    }
    let conditions: Vec<String> = rule
        .conditions
        .iter()
        .map(|c| {
            format!(
                "{}={} {} {}",
                c.field.severity(),
                counts.get(c.field.severity()),
                c.op.symbol(),
                c.threshold
            )
        })
        .collect();
    format!("{}: {} ({})", rule.decision, rule.name, conditions.join(" and "))
}
