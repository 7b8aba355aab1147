//! Schema stage: column presence, typing and nullability.

use crate::checker::BlockingCheck;
use crate::context::CheckContext;
use crate::error::Result;
use crate::SCHEMA_STAGE;
use datagate_config::{ColumnType, SchemaConfig};
use datagate_core::{cell_is_blank, CheckResult, Issue, Severity, StageCategory};
use serde_json::Value;
use std::time::Instant;

/// Checks the dataset against the schema configured for its format.
///
/// Missing columns and too few rows are critical. Type and null violations
/// are errors. Unexpected columns are warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaChecker;

impl BlockingCheck for SchemaChecker {
    fn name(&self) -> &str {
        SCHEMA_STAGE
    }

    fn category(&self) -> StageCategory {
        StageCategory::Structural
    }

    fn check(&self, ctx: &CheckContext) -> Result<CheckResult> {
        let start = Instant::now();
        let format_type = &ctx.metadata.format_type;
        let mut issues = Vec::new();

        let fallback = SchemaConfig::default();
        let schema = match ctx.settings().format(format_type) {
            Some(format) => &format.schema,
            None => {
                issues.push(
                    Issue::new(
                        "format_type",
                        format!("no configuration for format '{}'", format_type),
                        Severity::Warning,
                    )
                    .with_rule("schema.unknown_format"),
                );
                &fallback
            }
        };

        let dataset = &ctx.dataset;
        if dataset.len() < schema.min_rows {
            issues.push(
                Issue::new(
                    "_dataset",
                    format!("dataset has {} rows, at least {} required", dataset.len(), schema.min_rows),
                    Severity::Critical,
                )
                .with_rule("schema.min_rows"),
            );
        }

        for spec in &schema.columns {
            ctx.ensure_active()?;

            let Some(values) = dataset.column(&spec.name) else {
                issues.push(
                    Issue::new(&spec.name, format!("required column '{}' is missing", spec.name), Severity::Critical)
                        .with_rule("schema.missing_column")
                        .with_affected(dataset.len()),
                );
                continue;
            };

            let mut blanks = 0;
            let mut mistyped = 0;
            for value in values {
                if cell_is_blank(value) {
                    blanks += 1;
                } else if !matches_type(value, spec.column_type) {
                    mistyped += 1;
                }
            }

            if blanks > 0 && !spec.nullable {
                issues.push(
                    Issue::new(&spec.name, format!("{} blank values in non-nullable column", blanks), Severity::Error)
                        .with_rule("schema.not_null")
                        .with_affected(blanks),
                );
            }
            if mistyped > 0 {
                issues.push(
                    Issue::new(
                        &spec.name,
                        format!("{} values are not of type {:?}", mistyped, spec.column_type).to_lowercase(),
                        Severity::Error,
                    )
                    .with_rule("schema.type")
                    .with_affected(mistyped),
                );
            }
        }

        if !schema.allow_extra_columns {
            for column in dataset.columns() {
                if !schema.columns.iter().any(|c| &c.name == column) {
                    issues.push(
                        Issue::new(column, format!("unexpected column '{}'", column), Severity::Warning)
                            .with_rule("schema.unexpected_column"),
                    );
                }
            }
        }

        Ok(CheckResult::from_issues(
            self.name(),
            self.category(),
            issues,
            dataset.len(),
            start.elapsed(),
        )
        .with_metadata("columns_expected", schema.columns.len())
        .with_metadata("columns_found", dataset.columns().len()))
    }
}

fn matches_type(value: &Value, expected: ColumnType) -> bool {
    match expected {
        ColumnType::Any => true,
        ColumnType::String => matches!(value, Value::String(_) | Value::Number(_)),
        ColumnType::Integer => match value {
            Value::Number(n) => n.is_i64() || n.is_u64(),
            Value::String(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        },
        ColumnType::Float => match value {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false),
            _ => false,
        },
        ColumnType::Boolean => match value {
            Value::Bool(_) => true,
            Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "false"),
            _ => false,
        },
    }
}
