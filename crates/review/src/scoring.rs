//! Priority, informativeness and routing.

use datagate_config::ReviewConfig;
use datagate_core::{Issue, LearnedPattern, PrioritizedIssue, ReviewPriority, ReviewerRole, Severity, StageCategory};
use std::collections::HashMap;

/// Review priority of an issue.
///
/// Errors whose signature has never been reviewed are escalated to
/// critical.
pub fn priority_for(issue: &Issue, pattern: Option<&LearnedPattern>) -> ReviewPriority {
    match issue.severity {
        Severity::Critical => ReviewPriority::Critical,
        Severity::Error if pattern.is_none() => ReviewPriority::Critical,
        Severity::Error => ReviewPriority::High,
        Severity::Warning => ReviewPriority::Medium,
        Severity::Info => ReviewPriority::Low,
    }
}

/// How much a reviewer decision on this signature would teach us, 0..=1.
///
/// Uncertainty falls with feedback, novelty with sightings; both reach zero
/// at the configured saturation count.
pub fn informativeness(pattern: Option<&LearnedPattern>, config: &ReviewConfig) -> f64 {
    let saturation = config.saturation.max(1) as f64;
    let (feedback, seen) = pattern.map_or((0, 0), |p| (p.feedback_count, p.seen_count));

    let uncertainty = 1.0 - (feedback as f64).min(saturation) / saturation;
    let novelty = 1.0 - (seen as f64).min(saturation) / saturation;
    (config.uncertainty_weight * uncertainty + config.novelty_weight * novelty).clamp(0.0, 1.0)
}

/// The specialist for a set of issues.
///
/// The category holding the most issues decides; a tie, or no issues at
/// all, goes to the quality specialist.
pub fn route(issues: &[PrioritizedIssue]) -> ReviewerRole {
    let mut counts: HashMap<StageCategory, usize> = HashMap::new();
    for issue in issues {
        if issue.category != StageCategory::Decision {
            *counts.entry(issue.category).or_insert(0) += 1;
        }
    }

    let Some(&top) = counts.values().max() else {
        return ReviewerRole::QualitySpecialist;
    };
    let mut leaders = counts.iter().filter(|(_, n)| **n == top).map(|(c, _)| *c);
    match (leaders.next(), leaders.next()) {
        (Some(category), None) => ReviewerRole::for_category(category),
        _ => ReviewerRole::QualitySpecialist,
    }
}
