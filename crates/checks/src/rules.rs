//! Rule stage: structured predicates evaluated row by row.
//!
//! Predicates are a closed set interpreted here; rule text is never
//! executed.

use crate::checker::BlockingCheck;
use crate::context::CheckContext;
use crate::error::{CheckError, Result};
use crate::RULES_STAGE;
use datagate_config::{Predicate, RuleSpec};
use datagate_core::{cell_is_blank, cell_number, cell_text, CheckResult, Issue, Severity, StageCategory};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Row indices kept on an issue as examples.
const SAMPLE_ROWS: usize = 10;

/// Evaluates the global rules plus the rules of the dataset's format.
///
/// Each violated rule yields one issue carrying the number of violating
/// rows. A rule whose column is absent yields a warning. A rule that cannot
/// be compiled is a system error.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleChecker;

impl BlockingCheck for RuleChecker {
    fn name(&self) -> &str {
        RULES_STAGE
    }

    fn category(&self) -> StageCategory {
        StageCategory::Rule
    }

    fn check(&self, ctx: &CheckContext) -> Result<CheckResult> {
        let start = Instant::now();
        let rules = ctx.settings().rules_for(&ctx.metadata.format_type);
        let mut issues = Vec::new();

        for rule in &rules {
            ctx.ensure_active()?;
            if let Some(issue) = evaluate_rule(ctx, rule)? {
                issues.push(issue);
            }
        }

        Ok(
            CheckResult::from_issues(self.name(), self.category(), issues, ctx.dataset.len(), start.elapsed())
                .with_metadata("rules_evaluated", rules.len()),
        )
    }
}

fn evaluate_rule(ctx: &CheckContext, rule: &RuleSpec) -> Result<Option<Issue>> {
    let Some(values) = ctx.dataset.column(&rule.field) else {
        return Ok(Some(
            Issue::new(
                &rule.field,
                format!("rule {} references missing column '{}'", rule.id, rule.field),
                Severity::Warning,
            )
            .with_rule(format!("{}.missing_column", rule.id)),
        ));
    };

    let compiled = CompiledPredicate::compile(rule)?;
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut violations = Vec::new();

    for (row, value) in values.enumerate() {
        if rule.skip_blank && cell_is_blank(value) {
            continue;
        }
        let ok = match &compiled {
            CompiledPredicate::Unique => match cell_text(value) {
                Some(text) => {
                    let count = seen.entry(text).or_insert(0);
                    *count += 1;
                    *count == 1
                }
                None => true,
            },
            CompiledPredicate::Regex(re) => cell_text(value).map(|t| re.is_match(&t)).unwrap_or(false),
            CompiledPredicate::Plain(predicate) => evaluate_predicate(predicate, value),
        };
        if !ok {
            violations.push(row);
        }
    }

    if violations.is_empty() {
        return Ok(None);
    }

    let message = rule
        .message
        .clone()
        .unwrap_or_else(|| format!("{} rows violate {}", violations.len(), describe(&rule.predicate)));
    let sample: Vec<usize> = violations.iter().take(SAMPLE_ROWS).copied().collect();

    Ok(Some(
        Issue::new(&rule.field, message, rule.severity)
            .with_rule(&rule.id)
            .with_affected(violations.len())
            .with_metadata("rows", sample),
    ))
}

enum CompiledPredicate<'a> {
    Regex(Regex),
    Unique,
    Plain(&'a Predicate),
}

impl<'a> CompiledPredicate<'a> {
    fn compile(rule: &'a RuleSpec) -> Result<Self> {
        match &rule.predicate {
            Predicate::Matches { pattern } => Regex::new(pattern)
                .map(CompiledPredicate::Regex)
                .map_err(|e| CheckError::InvalidRule {
                    rule: rule.id.clone(),
                    message: e.to_string(),
                }),
            Predicate::Unique => Ok(CompiledPredicate::Unique),
            other => Ok(CompiledPredicate::Plain(other)),
        }
    }
}

/// Evaluate a row-local predicate against one cell.
///
/// `Matches` compiles its pattern on every call and `Unique` needs the whole
/// column, so the rule checker handles both itself; here an invalid pattern
/// fails and `Unique` always holds.
pub fn evaluate_predicate(predicate: &Predicate, value: &Value) -> bool {
    match predicate {
        Predicate::NotBlank => !cell_is_blank(value),
        Predicate::Matches { pattern } => match (Regex::new(pattern), cell_text(value)) {
            (Ok(re), Some(text)) => re.is_match(&text),
            _ => false,
        },
        Predicate::InRange { min, max } => match cell_number(value) {
            Some(n) => min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m),
            None => false,
        },
        Predicate::Compare { op, value: expected } => match cell_number(value) {
            Some(n) => op.apply(n, *expected),
            None => false,
        },
        Predicate::OneOf { values } => match cell_text(value) {
            Some(text) => values.iter().any(|v| v == &text),
            None => false,
        },
        Predicate::Length { min, max } => match cell_text(value) {
            Some(text) => {
                let len = text.chars().count();
                min.map_or(true, |m| len >= m) && max.map_or(true, |m| len <= m)
            }
            None => false,
        },
        Predicate::Unique => true,
    }
}

fn describe(predicate: &Predicate) -> String {
    match predicate {
        Predicate::NotBlank => "not_blank".to_string(),
        Predicate::Matches { pattern } => format!("matches /{}/", pattern),
        Predicate::InRange { min, max } => format!(
            "in_range [{}, {}]",
            min.map_or("-inf".to_string(), |m| m.to_string()),
            max.map_or("inf".to_string(), |m| m.to_string())
        ),
        Predicate::Compare { op, value } => format!("value {} {}", op.symbol(), value),
        Predicate::OneOf { values } => format!("one_of [{}]", values.join(", ")),
        Predicate::Length { min, max } => format!(
            "length [{}, {}]",
            min.map_or("0".to_string(), |m| m.to_string()),
            max.map_or("inf".to_string(), |m| m.to_string())
        ),
        Predicate::Unique => "unique".to_string(),
    }
}
