//! Validation report.

use crate::error::{CoreError, Result};
use crate::id::{ReviewId, ValidationId};
use crate::issue::{Issue, SeverityCounts};
use crate::result::CheckResult;
use crate::Time;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Final decision for a dataset.
///
/// Variants are declared from least to most severe so that `Ord` can pick
/// the stricter of two decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Fit for use
    Accepted,
    /// Fit for use with caveats
    ConditionalAccept,
    /// Not fit for use
    Rejected,
    /// The run did not complete (timeout)
    Error,
}

impl Decision {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "accepted",
            Decision::ConditionalAccept => "conditional_accept",
            Decision::Rejected => "rejected",
            Decision::Error => "error",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accepted" | "accept" => Ok(Decision::Accepted),
            "conditional_accept" | "conditional" => Ok(Decision::ConditionalAccept),
            "rejected" | "reject" => Ok(Decision::Rejected),
            "error" => Ok(Decision::Error),
            other => Err(format!("unknown decision: {}", other)),
        }
    }
}

/// Identifies the configuration a report was produced under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetMetadata {
    /// Declared config version
    pub version: String,

    /// SHA-256 of the config content
    pub hash: String,

    /// Where the config came from
    pub source: String,
}

/// Stage results in execution-start order, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stages(Vec<(String, CheckResult)>);

impl Stages {
    /// Look up a stage.
    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Whether a stage was recorded.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Stage names in order.
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Iterate stages in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckResult)> {
        self.0.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no stage was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, name: String, result: CheckResult) -> Result<()> {
        if self.contains(&name) {
            return Err(CoreError::DuplicateStage(name));
        }
        self.0.push((name, result));
        Ok(())
    }
}

impl Serialize for Stages {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, result) in &self.0 {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Stages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct StagesVisitor;

        impl<'de> Visitor<'de> for StagesVisitor {
            type Value = Stages;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of stage name to check result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Stages, A::Error> {
                let mut stages = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, result)) = access.next_entry::<String, CheckResult>()? {
                    stages.push((name, result));
                }
                Ok(Stages(stages))
            }
        }

        deserializer.deserialize_map(StagesVisitor)
    }
}

/// The outcome of one validation run.
///
/// A report is created empty when a run starts, filled stage by stage by the
/// orchestrator, and sealed once a decision is made. Sealed reports reject
/// further writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Unique per run
    pub validation_id: ValidationId,

    /// Dataset identifier from metadata
    pub dataset_id: String,

    /// When the run started
    pub start_time: Time,

    /// When the run was sealed
    pub end_time: Option<Time>,

    /// Seconds between start and end
    pub execution_time_seconds: f64,

    /// Final decision, set when sealed
    pub final_decision: Option<Decision>,

    /// Why the decision was made
    pub decision_rationale: String,

    /// Whether a human has to look at this dataset
    pub requires_human_review: bool,

    /// Whether a gate stopped the pipeline early
    pub short_circuited: bool,

    /// Stage results in execution-start order
    pub stages: Stages,

    /// Configuration fingerprint
    pub ruleset_metadata: RulesetMetadata,

    /// Review task opened for this run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<ReviewId>,
}

impl Report {
    /// Start an empty report.
    pub fn begin(dataset_id: impl Into<String>, ruleset: RulesetMetadata, start_time: Time) -> Self {
        Self {
            validation_id: ValidationId::new(),
            dataset_id: dataset_id.into(),
            start_time,
            end_time: None,
            execution_time_seconds: 0.0,
            final_decision: None,
            decision_rationale: String::new(),
            requires_human_review: false,
            short_circuited: false,
            stages: Stages::default(),
            ruleset_metadata: ruleset,
            review_id: None,
        }
    }

    /// Whether the report has been finalized.
    pub fn is_sealed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Append a stage result.
    pub fn record_stage(&mut self, name: impl Into<String>, result: CheckResult) -> Result<()> {
        self.ensure_open()?;
        self.stages.push(name.into(), result)
    }

    /// Mark that a gate stopped the pipeline.
    pub fn mark_short_circuited(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.short_circuited = true;
        Ok(())
    }

    /// Attach the review task opened for this run.
    pub fn attach_review(&mut self, review_id: ReviewId) -> Result<()> {
        self.ensure_open()?;
        self.review_id = Some(review_id);
        Ok(())
    }

    /// Finalize the report.
    pub fn seal(
        &mut self,
        decision: Decision,
        rationale: impl Into<String>,
        requires_human_review: bool,
        end_time: Time,
    ) -> Result<()> {
        self.ensure_open()?;
        self.final_decision = Some(decision);
        self.decision_rationale = rationale.into();
        self.requires_human_review = requires_human_review;
        self.execution_time_seconds = (end_time - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.end_time = Some(end_time);
        Ok(())
    }

    /// Every issue from every stage, in stage order.
    pub fn all_issues(&self) -> impl Iterator<Item = (&str, &Issue)> {
        self.stages
            .iter()
            .flat_map(|(name, result)| result.issues.iter().map(move |i| (name, i)))
    }

    /// Severity counts over every stage.
    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts::from_issues(self.all_issues().map(|(_, i)| i))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_sealed() {
            return Err(CoreError::Sealed(self.validation_id.to_string()));
        }
        Ok(())
    }
}
