//! Non-count inputs to the review trigger.

use datagate_core::{CheckResult, Report};
use serde::{Deserialize, Serialize};

/// Confidence and novelty observed across a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSignals {
    /// Lowest confidence reported by any stage or issue
    pub min_confidence: Option<f64>,

    /// Whether any issue was flagged novel
    pub has_novel: bool,
}

impl ReviewSignals {
    /// Collect signals from check results.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CheckResult>) -> Self {
        let mut signals = Self::default();
        for result in results {
            signals.observe(result.confidence);
            for issue in &result.issues {
                signals.observe(issue.confidence);
                signals.has_novel |= issue.novel;
            }
        }
        signals
    }

    /// Collect signals from every stage of a report.
    pub fn from_report(report: &Report) -> Self {
        Self::from_results(report.stages.iter().map(|(_, result)| result))
    }

    fn observe(&mut self, confidence: Option<f64>) {
        if let Some(c) = confidence {
            self.min_confidence = Some(self.min_confidence.map_or(c, |m| m.min(c)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{Issue, Severity, StageCategory};
    use std::time::Duration;

    #[test]
    fn test_collects_lowest_confidence_and_novelty() {
        let a = CheckResult::from_issues("a", StageCategory::Biological, vec![], 1, Duration::ZERO)
            .with_confidence(0.9);
        let b = CheckResult::from_issues(
            "b",
            StageCategory::Rule,
            vec![Issue::new("x", "m", Severity::Info).with_confidence(0.4).novel()],
            1,
            Duration::ZERO,
        );

        let signals = ReviewSignals::from_results([&a, &b]);
        assert_eq!(signals.min_confidence, Some(0.4));
        assert!(signals.has_novel);

        let empty = ReviewSignals::from_results([]);
        assert_eq!(empty, ReviewSignals::default());
    }
}
