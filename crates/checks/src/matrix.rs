//! Numeric matrix checks.

use crate::checker::BlockingCheck;
use crate::context::CheckContext;
use crate::error::Result;
use datagate_core::{cell_is_blank, cell_number, CheckResult, Issue, Severity};
use std::time::Instant;

/// Checks that value columns are numeric, mostly filled and within sign
/// constraints.
///
/// Reports a confidence equal to the share of filled value cells, so a
/// sparse matrix can trigger review even without errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericMatrixChecker;

impl BlockingCheck for NumericMatrixChecker {
    fn name(&self) -> &str {
        "numeric_matrix"
    }

    fn check(&self, ctx: &CheckContext) -> Result<CheckResult> {
        let start = Instant::now();
        let config = &ctx.settings().checkers.numeric_matrix;
        let dataset = &ctx.dataset;
        let rows = dataset.len();

        let mut issues = Vec::new();
        let mut cells = 0usize;
        let mut missing_cells = 0usize;

        let value_columns = dataset
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, name)| !config.id_columns.contains(*name));

        for (index, name) in value_columns {
            ctx.ensure_active()?;
            let mut missing = 0;
            let mut non_numeric = 0;
            let mut negative = 0;

            for row in dataset.rows() {
                let cell = &row[index];
                if cell_is_blank(cell) {
                    missing += 1;
                    continue;
                }
                match cell_number(cell) {
                    Some(v) if v < 0.0 => negative += 1,
                    Some(_) => {}
                    None => non_numeric += 1,
                }
            }

            cells += rows;
            missing_cells += missing;

            if non_numeric > 0 {
                issues.push(
                    Issue::new(name, format!("{} non-numeric values", non_numeric), Severity::Error)
                        .with_rule("matrix.non_numeric")
                        .with_affected(non_numeric),
                );
            }
            if negative > 0 && !config.allow_negative {
                issues.push(
                    Issue::new(name, format!("{} negative values", negative), Severity::Error)
                        .with_rule("matrix.negative")
                        .with_affected(negative),
                );
            }
            if rows > 0 {
                let fraction = missing as f64 / rows as f64;
                if fraction > config.max_missing_fraction {
                    issues.push(
                        Issue::new(
                            name,
                            format!(
                                "{:.1}% of values missing, at most {:.1}% allowed",
                                fraction * 100.0,
                                config.max_missing_fraction * 100.0
                            ),
                            Severity::Warning,
                        )
                        .with_rule("matrix.missing")
                        .with_affected(missing)
                        .with_confidence(1.0 - fraction),
                    );
                }
            }
        }

        let filled = if cells == 0 {
            1.0
        } else {
            1.0 - missing_cells as f64 / cells as f64
        };

        Ok(CheckResult::from_issues(self.name(), self.category(), issues, rows, start.elapsed())
            .with_confidence(filled)
            .with_metadata("value_cells", cells)
            .with_metadata("missing_cells", missing_cells))
    }
}
