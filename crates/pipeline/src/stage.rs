//! Pipeline stages.

/// Position of a run in the stage machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Column presence, types and nullability
    Schema,
    /// Row-level structured rules
    Rules,
    /// Format-specific checkers, run concurrently
    FormatChecks,
    /// Severity counts to verdict
    Policy,
    /// Human-in-the-loop review
    HumanReview,
    /// Report sealed
    Complete,
}

impl Stage {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Schema => "schema",
            Stage::Rules => "rules",
            Stage::FormatChecks => "format_checks",
            Stage::Policy => "policy",
            Stage::HumanReview => "human_review",
            Stage::Complete => "complete",
        }
    }

    /// The stage that follows on the normal path.
    pub fn next(&self) -> Stage {
        match self {
            Stage::Schema => Stage::Rules,
            Stage::Rules => Stage::FormatChecks,
            Stage::FormatChecks => Stage::Policy,
            Stage::Policy => Stage::HumanReview,
            Stage::HumanReview | Stage::Complete => Stage::Complete,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_path_ends_complete() {
        let mut stage = Stage::Schema;
        let mut path = vec![stage];
        while stage != Stage::Complete {
            stage = stage.next();
            path.push(stage);
        }
        assert_eq!(path.len(), 6);
        assert!(path.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Stage::Complete.next(), Stage::Complete);
    }
}
