//! Per-checker results.

use crate::issue::{Issue, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Which kind of stage produced a result. Used for reviewer routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageCategory {
    /// Column presence and typing
    Structural,
    /// Generic row-level rules
    #[default]
    Rule,
    /// Domain checks (sequences, variants, genes)
    Biological,
    /// Policy and review bookkeeping stages
    Decision,
}

/// Result of running one checker against one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the checker
    pub checker_name: String,

    /// Stage category
    #[serde(default)]
    pub category: StageCategory,

    /// Whether no error or critical issue was found
    pub passed: bool,

    /// Highest issue severity, `info` when there are no issues
    pub severity: Severity,

    /// Issues in discovery order
    pub issues: Vec<Issue>,

    /// Wall-clock time spent in the checker
    #[serde(rename = "execution_time_seconds", with = "duration_seconds")]
    pub execution_time: Duration,

    /// Number of records inspected
    pub records_processed: usize,

    /// Checker-reported confidence in its own result, 0..=1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Free-form metadata (lookup statistics, thresholds used)
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl CheckResult {
    /// Build a result from a list of issues.
    ///
    /// `passed` and `severity` are derived from the issues.
    pub fn from_issues(
        checker_name: impl Into<String>,
        category: StageCategory,
        issues: Vec<Issue>,
        records_processed: usize,
        execution_time: Duration,
    ) -> Self {
        let severity = issues
            .iter()
            .map(|i| i.severity)
            .max()
            .unwrap_or(Severity::Info);
        let passed = severity < Severity::Error;

        Self {
            checker_name: checker_name.into(),
            category,
            passed,
            severity,
            issues,
            execution_time,
            records_processed,
            confidence: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// A failed result holding one synthetic critical issue.
    pub fn system_error(
        checker_name: impl Into<String>,
        category: StageCategory,
        message: impl std::fmt::Display,
        execution_time: Duration,
    ) -> Self {
        let name = checker_name.into();
        let issue = Issue::system_error(&name, message);
        Self::from_issues(name, category, vec![issue], 0, execution_time)
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the reported confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Whether any issue is critical.
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }
}

/// Serialize a `Duration` as fractional seconds.
pub mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    /// Deserialize.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
