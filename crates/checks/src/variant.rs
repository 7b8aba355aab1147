//! Variant record checks.

use crate::checker::BlockingCheck;
use crate::context::CheckContext;
use crate::error::Result;
use datagate_core::{cell_text, CheckResult, Issue, Severity};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Instant;

/// Checks chromosome names, positions and alleles of variant records.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariantChecker;

#[derive(Default)]
struct Tally {
    bad_position: usize,
    bad_ref: usize,
    bad_alt: usize,
    ref_equals_alt: usize,
    unknown_contigs: BTreeSet<String>,
    unknown_contig_rows: usize,
}

impl BlockingCheck for VariantChecker {
    fn name(&self) -> &str {
        "variant"
    }

    fn check(&self, ctx: &CheckContext) -> Result<CheckResult> {
        let start = Instant::now();
        let config = &ctx.settings().checkers.variant;
        let chrom = ctx.require_column(&config.chrom_column)?;
        let pos = ctx.require_column(&config.pos_column)?;
        let reference = ctx.require_column(&config.ref_column)?;
        let alt = ctx.require_column(&config.alt_column)?;

        let mut tally = Tally::default();
        for row in ctx.dataset.rows() {
            ctx.ensure_active()?;

            let contig = cell_text(&row[chrom]).unwrap_or_default();
            let contig = contig.trim();
            let bare = contig.strip_prefix("chr").unwrap_or(contig);
            if !config.chromosomes.iter().any(|c| c.eq_ignore_ascii_case(bare)) {
                tally.unknown_contig_rows += 1;
                tally.unknown_contigs.insert(contig.to_string());
            }

            if !is_positive_position(&row[pos]) {
                tally.bad_position += 1;
            }

            let ref_allele = allele(&row[reference]);
            let alt_allele = allele(&row[alt]);
            match &ref_allele {
                Some(r) if is_ref_allele(r) => {}
                _ => tally.bad_ref += 1,
            }
            match &alt_allele {
                Some(a) if is_alt_allele(a) => {}
                _ => tally.bad_alt += 1,
            }
            if let (Some(r), Some(a)) = (&ref_allele, &alt_allele) {
                if r == a {
                    tally.ref_equals_alt += 1;
                }
            }
        }

        let mut issues = Vec::new();
        if tally.unknown_contig_rows > 0 {
            let contigs: Vec<String> = tally.unknown_contigs.into_iter().collect();
            issues.push(
                Issue::new(
                    &config.chrom_column,
                    format!("{} records on unrecognized chromosomes: {}", tally.unknown_contig_rows, contigs.join(", ")),
                    Severity::Error,
                )
                .with_rule("variant.unknown_chromosome")
                .with_affected(tally.unknown_contig_rows)
                .with_metadata("contigs", contigs)
                .novel(),
            );
        }
        let counted = [
            (tally.bad_position, &config.pos_column, "variant.position", "positions are not positive integers", Severity::Error),
            (tally.bad_ref, &config.ref_column, "variant.ref_allele", "reference alleles are not A/C/G/T/N", Severity::Error),
            (tally.bad_alt, &config.alt_column, "variant.alt_allele", "alternate alleles are not valid", Severity::Error),
            (tally.ref_equals_alt, &config.alt_column, "variant.ref_equals_alt", "records have identical ref and alt", Severity::Warning),
        ];
        for (count, field, rule, text, severity) in counted {
            if count > 0 {
                issues.push(
                    Issue::new(field, format!("{} {}", count, text), severity)
                        .with_rule(rule)
                        .with_affected(count),
                );
            }
        }

        Ok(CheckResult::from_issues(self.name(), self.category(), issues, ctx.dataset.len(), start.elapsed()))
    }
}

fn allele(value: &Value) -> Option<String> {
    cell_text(value)
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

fn is_positive_position(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_u64().map_or(false, |p| p > 0),
        Value::String(s) => s.trim().parse::<u64>().map_or(false, |p| p > 0),
        _ => false,
    }
}

fn is_ref_allele(allele: &str) -> bool {
    allele.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'T' | 'N'))
}

/// Alternate alleles may also be a deletion marker or a comma-separated list.
fn is_alt_allele(allele: &str) -> bool {
    allele
        .split(',')
        .all(|a| a == "*" || a == "." || (!a.is_empty() && is_ref_allele(a)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::context;
    use serde_json::json;

    fn check(rows: Vec<Vec<Value>>) -> CheckResult {
        let ctx = context("variant_annotation", &["chrom", "pos", "ref", "alt"], rows);
        VariantChecker.check(&ctx).unwrap()
    }

    #[test]
    fn test_valid_records() {
        let result = check(vec![
            vec![json!("chr1"), json!(12345), json!("A"), json!("G")],
            vec![json!("X"), json!("999"), json!("ACG"), json!("A,T")],
            vec![json!("chrMT"), json!(1), json!("c"), json!("*")],
        ]);
        assert!(result.issues.is_empty(), "{:?}", result.issues);
    }

    #[test]
    fn test_invalid_records() {
        let result = check(vec![
            vec![json!("chrUn_gl000220"), json!(10), json!("A"), json!("G")],
            vec![json!("2"), json!(0), json!("A"), json!("A")],
            vec![json!("3"), json!(-5), json!("Q"), json!("")],
        ]);

        let rules: Vec<_> = result.issues.iter().filter_map(|i| i.rule_id.as_deref()).collect();
        assert_eq!(
            rules,
            vec!["variant.unknown_chromosome", "variant.position", "variant.ref_allele", "variant.alt_allele", "variant.ref_equals_alt"]
        );

        let contig = &result.issues[0];
        assert!(contig.novel);
        assert_eq!(contig.metadata["contigs"], json!(["chrUn_gl000220"]));
        assert_eq!(result.issues[1].affected_record_count, 2);
    }
}
