//! Guide RNA sequence checks.

use crate::checker::BlockingCheck;
use crate::context::CheckContext;
use crate::error::Result;
use datagate_config::GuideSequenceConfig;
use datagate_core::{cell_is_blank, cell_text, CheckResult, Issue, Severity};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Checks guide sequences: alphabet, length, GC content, homopolymer runs
/// and duplicates.
#[derive(Debug, Default, Clone, Copy)]
pub struct GuideSequenceChecker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Finding {
    InvalidBase,
    Length,
    GcContent,
    Homopolymer,
    Duplicate,
}

impl Finding {
    fn rule_id(&self) -> &'static str {
        match self {
            Finding::InvalidBase => "guide.invalid_base",
            Finding::Length => "guide.length",
            Finding::GcContent => "guide.gc_content",
            Finding::Homopolymer => "guide.homopolymer",
            Finding::Duplicate => "guide.duplicate",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Finding::InvalidBase | Finding::Length => Severity::Error,
            Finding::GcContent | Finding::Homopolymer | Finding::Duplicate => Severity::Warning,
        }
    }

    fn message(&self, count: usize, config: &GuideSequenceConfig) -> String {
        match self {
            Finding::InvalidBase => format!("{} sequences contain characters other than A, C, G, T", count),
            Finding::Length => format!(
                "{} sequences are outside {}-{} nt",
                count, config.min_length, config.max_length
            ),
            Finding::GcContent => format!(
                "{} sequences have GC content outside {:.0}%-{:.0}%",
                count,
                config.gc_min * 100.0,
                config.gc_max * 100.0
            ),
            Finding::Homopolymer => format!(
                "{} sequences have a single-base run longer than {}",
                count, config.max_homopolymer
            ),
            Finding::Duplicate => format!("{} sequences repeat an earlier guide", count),
        }
    }
}

impl BlockingCheck for GuideSequenceChecker {
    fn name(&self) -> &str {
        "guide_sequence"
    }

    fn check(&self, ctx: &CheckContext) -> Result<CheckResult> {
        let start = Instant::now();
        let config = &ctx.settings().checkers.guide_sequence;
        let column = ctx.require_column(&config.sequence_column)?;

        let mut findings: BTreeMap<Finding, usize> = BTreeMap::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut processed = 0;

        for row in ctx.dataset.rows() {
            ctx.ensure_active()?;
            let cell = &row[column];
            if cell_is_blank(cell) {
                continue;
            }
            let Some(text) = cell_text(cell) else { continue };
            let sequence = text.trim().to_uppercase();
            processed += 1;

            for finding in inspect(&sequence, config) {
                *findings.entry(finding).or_insert(0) += 1;
            }

            let count = seen.entry(sequence).or_insert(0);
            *count += 1;
            if *count > 1 {
                *findings.entry(Finding::Duplicate).or_insert(0) += 1;
            }
        }

        let issues = findings
            .into_iter()
            .map(|(finding, count)| {
                Issue::new(&config.sequence_column, finding.message(count, config), finding.severity())
                    .with_rule(finding.rule_id())
                    .with_affected(count)
            })
            .collect();

        Ok(CheckResult::from_issues(self.name(), self.category(), issues, processed, start.elapsed()))
    }
}

fn inspect(sequence: &str, config: &GuideSequenceConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !sequence.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'T')) {
        findings.push(Finding::InvalidBase);
    }

    let len = sequence.chars().count();
    if len < config.min_length || len > config.max_length {
        findings.push(Finding::Length);
    }

    if len > 0 {
        let gc = sequence.chars().filter(|c| matches!(c, 'G' | 'C')).count() as f64 / len as f64;
        if gc < config.gc_min || gc > config.gc_max {
            findings.push(Finding::GcContent);
        }
    }

    if longest_run(sequence) > config.max_homopolymer {
        findings.push(Finding::Homopolymer);
    }

    findings
}

fn longest_run(sequence: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for c in sequence.chars() {
        if Some(c) == previous {
            current += 1;
        } else {
            current = 1;
            previous = Some(c);
        }
        longest = longest.max(current);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::context;
    use crate::error::CheckError;
    use serde_json::{json, Value};

    fn guides(sequences: &[&str]) -> Vec<Vec<Value>> {
        sequences
            .iter()
            .enumerate()
            .map(|(i, s)| vec![json!(format!("g{}", i)), json!(s), json!("BRCA1")])
            .collect()
    }

    fn check(sequences: &[&str]) -> CheckResult {
        let ctx = context("crispr_guides", &["guide_id", "sequence", "gene_symbol"], guides(sequences));
        GuideSequenceChecker.check(&ctx).unwrap()
    }

    #[test]
    fn test_longest_run() {
        assert_eq!(longest_run(""), 0);
        assert_eq!(longest_run("ACGT"), 1);
        assert_eq!(longest_run("AAACCCCCG"), 5);
    }

    #[test]
    fn test_clean_guides_pass() {
        let result = check(&["ACGTACGTACGTACGTACGT", "TGCATGCATGCATGCATGCA"]);
        assert!(result.passed);
        assert!(result.issues.is_empty());
        assert_eq!(result.records_processed, 2);
    }

    #[test]
    fn test_findings_aggregate() {
        let result = check(&[
            "ACGTACGTACGTACGTACGN", // invalid base
            "ACGT",                 // too short
            "AAAAAAATTTTTTTATATAT", // gc too low, homopolymer
            "acgtacgtacgtacgtacgt",
            "ACGTACGTACGTACGTACGT", // duplicate after normalization
        ]);

        let by_rule: HashMap<_, _> = result
            .issues
            .iter()
            .map(|i| (i.rule_id.clone().unwrap(), (i.severity, i.affected_record_count)))
            .collect();
        assert_eq!(by_rule["guide.invalid_base"], (Severity::Error, 1));
        assert_eq!(by_rule["guide.length"], (Severity::Error, 1));
        assert_eq!(by_rule["guide.gc_content"], (Severity::Warning, 1));
        assert_eq!(by_rule["guide.homopolymer"], (Severity::Warning, 1));
        assert_eq!(by_rule["guide.duplicate"], (Severity::Warning, 1));
        assert!(!result.passed);
    }

    #[test]
    fn test_missing_sequence_column() {
        let ctx = context("crispr_guides", &["guide_id"], vec![vec![json!("g1")]]);
        let err = GuideSequenceChecker.check(&ctx).unwrap_err();
        assert!(matches!(err, CheckError::MissingColumn(c) if c == "sequence"));
    }

    #[test]
    fn test_cancelled_context_stops() {
        let ctx = context("crispr_guides", &["guide_id", "sequence", "gene_symbol"], guides(&["ACGT"]));
        ctx.cancel.cancel();
        assert!(matches!(GuideSequenceChecker.check(&ctx), Err(CheckError::Cancelled)));
    }
}
