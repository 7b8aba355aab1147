//! Issues found by checkers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity level, ordered `info < warning < error < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule id attached to issues synthesized from system errors.
pub const SYSTEM_ERROR_RULE: &str = "system_error";

/// A single data-quality finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Column or logical field the issue refers to
    pub field: String,

    /// Human-readable description
    pub message: String,

    /// Severity
    pub severity: Severity,

    /// Rule that produced the issue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,

    /// Number of records affected
    #[serde(default)]
    pub affected_record_count: usize,

    /// Checker confidence in this finding, 0..=1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Whether the checker flagged this finding as unlike anything it knows
    #[serde(default)]
    pub novel: bool,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl Issue {
    /// Create an issue.
    pub fn new(field: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity,
            rule_id: None,
            affected_record_count: 0,
            confidence: None,
            novel: false,
            metadata: serde_json::Map::new(),
        }
    }

    /// Synthesize a critical issue from an unexpected failure inside a stage.
    pub fn system_error(stage: &str, message: impl std::fmt::Display) -> Self {
        Self::new(stage, format!("system error in {}: {}", stage, message), Severity::Critical)
            .with_rule(SYSTEM_ERROR_RULE)
    }

    /// Set the rule id.
    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Set the affected record count.
    pub fn with_affected(mut self, count: usize) -> Self {
        self.affected_record_count = count;
        self
    }

    /// Set the confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Mark as novel.
    pub fn novel(mut self) -> Self {
        self.novel = true;
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether this issue was synthesized from a system error.
    pub fn is_system_error(&self) -> bool {
        self.rule_id.as_deref() == Some(SYSTEM_ERROR_RULE)
    }

    /// Stable key used to recognize this kind of issue across runs.
    pub fn signature(&self) -> IssueSignature {
        IssueSignature::new(self.rule_id.as_deref(), &self.field, self.severity)
    }
}

/// Stable key (rule_id + field + severity) for recurring issue patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueSignature(String);

impl IssueSignature {
    /// Build a signature. A missing rule id is written as `-`.
    pub fn new(rule_id: Option<&str>, field: &str, severity: Severity) -> Self {
        Self(format!("{}|{}|{}", rule_id.unwrap_or("-"), field, severity))
    }

    /// The raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IssueSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issue counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub error: u32,
    pub warning: u32,
    pub info: u32,
}

impl SeverityCounts {
    /// Create counts directly.
    pub fn new(critical: u32, error: u32, warning: u32, info: u32) -> Self {
        Self { critical, error, warning, info }
    }

    /// Count a set of issues.
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            counts.add(issue.severity);
        }
        counts
    }

    /// Count one more issue of the given severity.
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }

    /// Count for one severity.
    pub fn get(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }

    /// Total issue count.
    pub fn total(&self) -> u32 {
        self.critical + self.error + self.warning + self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
        assert_eq!(
            [Severity::Warning, Severity::Critical, Severity::Info].iter().max(),
            Some(&Severity::Critical)
        );
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
        let s: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(s, Severity::Warning);
    }

    #[test]
    fn test_signature_is_stable() {
        let a = Issue::new("sequence", "bad base", Severity::Error).with_rule("seq_alphabet");
        let b = Issue::new("sequence", "different text", Severity::Error).with_rule("seq_alphabet");
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature().as_str(), "seq_alphabet|sequence|error");

        let c = Issue::new("sequence", "bad base", Severity::Warning).with_rule("seq_alphabet");
        assert_ne!(a.signature(), c.signature());
    }

    #[test]
    fn test_signature_without_rule() {
        let issue = Issue::new("gene", "unknown", Severity::Info);
        assert_eq!(issue.signature().as_str(), "-|gene|info");
    }

    #[test]
    fn test_system_error_issue() {
        let issue = Issue::system_error("guide_sequence", "worker panicked");
        assert_eq!(issue.severity, Severity::Critical);
        assert!(issue.is_system_error());
        assert!(issue.message.contains("worker panicked"));
    }

    #[test]
    fn test_counts_from_issues() {
        let issues = vec![
            Issue::new("a", "x", Severity::Error),
            Issue::new("a", "x", Severity::Error),
            Issue::new("b", "y", Severity::Warning),
            Issue::new("c", "z", Severity::Critical),
        ];
        let counts = SeverityCounts::from_issues(&issues);
        assert_eq!(counts, SeverityCounts::new(1, 2, 1, 0));
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let issue = Issue::new("a", "x", Severity::Info).with_confidence(1.7);
        assert_eq!(issue.confidence, Some(1.0));
    }
}
