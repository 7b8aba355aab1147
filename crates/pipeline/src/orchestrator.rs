//! The validation orchestrator.

use crate::error::Result;
use crate::stage::Stage;
use datagate_cache::build_cache;
use datagate_checks::{
    build_authorities, CheckContext, CheckerKind, CheckerRegistry, RuleChecker, SchemaChecker, RULES_STAGE,
    SCHEMA_STAGE,
};
use datagate_config::{ConfigStore, LoadedConfig};
use datagate_core::{
    CheckResult, Clock, Dataset, DatasetMetadata, Decision, Report, Severity, StageCategory, SystemClock,
};
use datagate_policy::{PolicyEngine, POLICY_STAGE};
use datagate_review::{ReviewCoordinator, REVIEW_STAGE};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Stage names format checkers may not take.
const RESERVED_STAGES: [&str; 4] = [SCHEMA_STAGE, RULES_STAGE, POLICY_STAGE, REVIEW_STAGE];

/// Runs datasets through the validation stages.
///
/// The orchestrator holds no per-run state, so one instance can serve many
/// concurrent `validate` calls. State shared between runs lives in the
/// checkers' lookup cache and the review coordinator's pattern store.
pub struct Orchestrator {
    config: Arc<ConfigStore>,
    registry: Arc<CheckerRegistry>,
    review: Arc<ReviewCoordinator>,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
}

/// Mutable state of one run.
struct Run {
    report: Report,
    stage: Stage,
    tasks: JoinSet<(usize, CheckResult)>,
}

impl Run {
    /// Move to the next stage on the normal path.
    fn advance(&mut self) {
        self.stage = self.stage.next();
        debug!("Entering stage {}", self.stage);
    }

    fn finish(&mut self) {
        self.stage = Stage::Complete;
    }
}

impl Orchestrator {
    /// Create an orchestrator over a checker registry.
    ///
    /// The review coordinator is built from the configuration current at
    /// construction time.
    pub fn new(config: Arc<ConfigStore>, registry: CheckerRegistry) -> Self {
        let review = ReviewCoordinator::from_config(&config.snapshot().config);
        Self {
            config,
            registry: Arc::new(registry),
            review: Arc::new(review),
            clock: Arc::new(SystemClock),
            timeout: None,
        }
    }

    /// Create an orchestrator with the built-in checkers, a lookup cache and
    /// the HTTP authorities named in the configuration.
    pub fn builtin(config: Arc<ConfigStore>) -> Result<Self> {
        let snapshot = config.snapshot();
        let cache = build_cache(&snapshot.config.cache, Arc::new(SystemClock));
        let authorities = build_authorities(&snapshot.config.authority)?;
        Ok(Self::new(config, CheckerRegistry::builtin(cache, authorities)))
    }

    /// Use a shared review coordinator.
    pub fn with_review(mut self, review: Arc<ReviewCoordinator>) -> Self {
        self.review = review;
        self
    }

    /// Use a different clock for report timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the configured per-run timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The configuration store.
    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// The checker registry.
    pub fn registry(&self) -> &CheckerRegistry {
        &self.registry
    }

    /// The review coordinator.
    pub fn review(&self) -> &Arc<ReviewCoordinator> {
        &self.review
    }

    /// Validate a dataset under the current configuration.
    ///
    /// The configuration is snapshotted once; a reload during the run does
    /// not affect it.
    pub async fn validate(&self, dataset: Dataset, metadata: DatasetMetadata) -> Result<Report> {
        let config = self.config.snapshot();
        self.validate_with_config(dataset, metadata, config).await
    }

    /// Validate a dataset under an explicit configuration snapshot.
    ///
    /// Checker failures, panics and timeouts are folded into the report.
    /// An error is returned only when the report itself rejects a write.
    pub async fn validate_with_config(
        &self,
        dataset: Dataset,
        metadata: DatasetMetadata,
        config: Arc<LoadedConfig>,
    ) -> Result<Report> {
        let report = Report::begin(metadata.dataset_id.clone(), config.ruleset.clone(), self.clock.now());
        let span = info_span!(
            "validation",
            validation_id = %report.validation_id,
            dataset_id = %report.dataset_id
        );
        self.execute(report, dataset, metadata, config).instrument(span).await
    }

    async fn execute(
        &self,
        report: Report,
        dataset: Dataset,
        metadata: DatasetMetadata,
        config: Arc<LoadedConfig>,
    ) -> Result<Report> {
        let timeout = self
            .timeout
            .unwrap_or_else(|| Duration::from_secs(config.config.pipeline.timeout_secs));
        let cancel = CancellationToken::new();
        let ctx = CheckContext::new(Arc::new(dataset), Arc::new(metadata), config, cancel.clone());
        info!(
            "Validating {} records of format {} (ruleset {})",
            ctx.dataset.len(),
            ctx.metadata.format_type,
            ctx.config.ruleset.version
        );

        let mut run = Run {
            report,
            stage: Stage::Schema,
            tasks: JoinSet::new(),
        };

        match tokio::time::timeout(timeout, self.run_stages(&ctx, &mut run)).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                cancel.cancel();
                run.tasks.abort_all();
                while run.tasks.join_next().await.is_some() {}

                warn!("Validation timed out after {:?} during {}", timeout, run.stage);
                let rationale = format!(
                    "validation timed out after {:.1}s during {}",
                    timeout.as_secs_f64(),
                    run.stage
                );
                run.report.seal(Decision::Error, rationale, false, self.clock.now())?;
                run.finish();
            }
        }

        info!(
            "Validation finished: {} in {:.3}s",
            run.report.final_decision.map(|d| d.as_str()).unwrap_or("unsealed"),
            run.report.execution_time_seconds
        );
        Ok(run.report)
    }

    async fn run_stages(&self, ctx: &CheckContext, run: &mut Run) -> Result<()> {
        debug!("Entering stage {}", run.stage);
        let schema = run_checker(&CheckerKind::blocking(SchemaChecker), ctx.clone()).await;
        let failure = system_error_of(&schema);
        let passed = schema.passed;
        run.report.record_stage(SCHEMA_STAGE, schema)?;
        if let Some(message) = failure {
            return self.short_circuit(run, format!("schema stage failed: {}", message));
        }
        if !passed {
            return self.short_circuit(run, "failed schema validation".to_string());
        }

        run.advance();
        let rules = run_checker(&CheckerKind::blocking(RuleChecker), ctx.clone()).await;
        let failure = system_error_of(&rules);
        let critical = rules.issues.iter().filter(|i| i.severity == Severity::Critical).count();
        run.report.record_stage(RULES_STAGE, rules)?;
        if let Some(message) = failure {
            return self.short_circuit(run, format!("rules stage failed: {}", message));
        }
        if critical > 0 {
            return self.short_circuit(run, format!("rules stage found {} critical issue(s)", critical));
        }

        run.advance();
        self.run_format_checks(ctx, run).await?;

        run.advance();
        let started = Instant::now();
        let outcome = PolicyEngine::from_config(&ctx.settings().policy).evaluate_report(&run.report);
        run.report
            .record_stage(POLICY_STAGE, outcome.to_check_result(ctx.dataset.len(), started.elapsed()))?;
        info!("Policy decided {} via {}", outcome.decision, outcome.matched_rule);

        let mut decision = outcome.decision;
        let mut rationale = outcome.rationale;
        let mut requires_review = outcome.requires_review;

        if requires_review {
            run.advance();
            let started = Instant::now();
            let review = self.review.open_review(&run.report).await;
            run.report
                .record_stage(REVIEW_STAGE, review.to_check_result(ctx.dataset.len(), started.elapsed()))?;
            run.report.attach_review(review.task.review_id)?;

            rationale = format!("{}; {}", rationale, review.rationale);
            if let Some(learned) = review.override_decision {
                info!("Review {} auto-resolved as {}", review.task.review_id, learned);
                decision = learned;
                requires_review = false;
            }
        }

        run.report.seal(decision, rationale, requires_review, self.clock.now())?;
        run.finish();
        Ok(())
    }

    /// Fan the format checkers out and record their results in start order.
    async fn run_format_checks(&self, ctx: &CheckContext, run: &mut Run) -> Result<()> {
        let names = selected_checkers(ctx);
        if names.is_empty() {
            debug!("No format checkers for {}", ctx.metadata.format_type);
            return Ok(());
        }

        let mut slots: Vec<Option<CheckResult>> = vec![None; names.len()];
        for (index, name) in names.iter().enumerate() {
            match self.registry.get(name) {
                Some(kind) => {
                    let kind = kind.clone();
                    let ctx = ctx.clone();
                    run.tasks.spawn(async move { (index, run_checker(&kind, ctx).await) });
                }
                None => {
                    warn!("Format checker {} is not registered", name);
                    slots[index] = Some(CheckResult::system_error(
                        name,
                        StageCategory::Biological,
                        format!("checker '{}' is not registered", name),
                        Duration::ZERO,
                    ));
                }
            }
        }

        while let Some(joined) = run.tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!("Format checker task did not complete: {}", e),
            }
        }

        for (name, slot) in names.into_iter().zip(slots) {
            let result = slot.unwrap_or_else(|| {
                CheckResult::system_error(&name, StageCategory::Biological, "checker task did not complete", Duration::ZERO)
            });
            run.report.record_stage(name, result)?;
        }
        Ok(())
    }

    fn short_circuit(&self, run: &mut Run, rationale: String) -> Result<()> {
        info!("Short-circuited at {}: {}", run.stage, rationale);
        run.report.mark_short_circuited()?;
        run.report.seal(Decision::Rejected, rationale, false, self.clock.now())?;
        run.finish();
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("checkers", &self.registry.names())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Run one checker, turning any failure into a system-error result.
async fn run_checker(kind: &CheckerKind, ctx: CheckContext) -> CheckResult {
    let started = Instant::now();
    match kind.run(ctx).await {
        Ok(result) => {
            debug!(
                "Checker {} finished: {} issues in {:?}",
                kind.name(),
                result.issues.len(),
                result.execution_time
            );
            result
        }
        Err(e) => {
            warn!("Checker {} failed: {}", kind.name(), e);
            CheckResult::system_error(kind.name(), kind.category(), e, started.elapsed())
        }
    }
}

fn system_error_of(result: &CheckResult) -> Option<String> {
    result
        .issues
        .iter()
        .find(|i| i.is_system_error())
        .map(|i| i.message.clone())
}

/// Format checkers configured for the dataset, deduplicated, in order.
fn selected_checkers(ctx: &CheckContext) -> Vec<String> {
    let Some(format) = ctx.settings().format(&ctx.metadata.format_type) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    format
        .checkers
        .iter()
        .filter(|name| {
            if RESERVED_STAGES.contains(&name.as_str()) {
                warn!("Ignoring format checker with reserved name {}", name);
                return false;
            }
            seen.insert(name.as_str())
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use datagate_cache::TtlCache;
    use datagate_checks::{AsyncCheck, Authorities, BlockingCheck, CheckError, GeneAuthority, GeneRecord};
    use datagate_config::{Predicate, RuleSpec, ValidationConfig};
    use datagate_core::{IssueSignature, ReviewStatus};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct KnownGenes {
        calls: AtomicU32,
    }

    #[async_trait]
    impl GeneAuthority for KnownGenes {
        fn provider(&self) -> &str {
            "mock"
        }

        async fn lookup(&self, _organism: &str, symbols: &[String]) -> datagate_checks::Result<Vec<Option<GeneRecord>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(symbols
                .iter()
                .map(|s| {
                    Some(GeneRecord {
                        symbol: s.clone(),
                        id: None,
                        name: None,
                    })
                })
                .collect())
        }
    }

    struct Slow;

    #[async_trait]
    impl AsyncCheck for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn check(&self, _ctx: &CheckContext) -> datagate_checks::Result<CheckResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(CheckError::Cancelled)
        }
    }

    struct Exploding;

    impl BlockingCheck for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn check(&self, _ctx: &CheckContext) -> datagate_checks::Result<CheckResult> {
            panic!("matrix index out of bounds");
        }
    }

    struct Unreachable;

    #[async_trait]
    impl AsyncCheck for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn check(&self, _ctx: &CheckContext) -> datagate_checks::Result<CheckResult> {
            Err(CheckError::Authority {
                provider: "mock".to_string(),
                message: "HTTP 503".to_string(),
            })
        }
    }

    fn orchestrator(config: ValidationConfig) -> (Orchestrator, Arc<KnownGenes>) {
        orchestrator_with(config, |_| {})
    }

    fn orchestrator_with(
        config: ValidationConfig,
        extra: impl FnOnce(&mut CheckerRegistry),
    ) -> (Orchestrator, Arc<KnownGenes>) {
        let genes = Arc::new(KnownGenes {
            calls: AtomicU32::new(0),
        });
        let cache = Arc::new(TtlCache::new(chrono::Duration::hours(1), Arc::new(SystemClock)));
        let mut registry = CheckerRegistry::builtin(cache, Authorities::new(genes.clone()));
        extra(&mut registry);
        let store = Arc::new(ConfigStore::from_config(config, "test").unwrap());
        (Orchestrator::new(store, registry), genes)
    }

    fn guides(n: usize) -> Dataset {
        const BASES: [char; 4] = ['A', 'C', 'G', 'T'];
        let rows = (0..n)
            .map(|i| {
                let suffix: String = [BASES[(i / 16) % 4], BASES[(i / 4) % 4], BASES[i % 4]].iter().collect();
                vec![
                    json!(format!("g{}", i)),
                    json!(format!("ACGTACGTACGTACGTC{}", suffix)),
                    json!(if i % 2 == 0 { "TP53" } else { "BRCA1" }),
                ]
            })
            .collect();
        Dataset::new(
            vec!["guide_id".to_string(), "sequence".to_string(), "gene_symbol".to_string()],
            rows,
        )
        .unwrap()
    }

    fn metadata() -> DatasetMetadata {
        DatasetMetadata::new("screen-42", "crispr_guides").with_organism("human")
    }

    fn failing_rules(n: usize, severity: Severity) -> Vec<RuleSpec> {
        (0..n)
            .map(|i| RuleSpec {
                id: format!("lab.rule{}", i),
                field: "guide_id".to_string(),
                predicate: Predicate::OneOf {
                    values: vec!["never".to_string()],
                },
                severity,
                message: None,
                skip_blank: true,
            })
            .collect()
    }

    fn stage_names(report: &Report) -> Vec<&str> {
        report.stages.names()
    }

    #[tokio::test]
    async fn test_clean_dataset_is_accepted() {
        let (orchestrator, _) = orchestrator(ValidationConfig::default());
        let report = orchestrator.validate(guides(20), metadata()).await.unwrap();

        assert_eq!(report.final_decision, Some(Decision::Accepted));
        assert!(!report.requires_human_review);
        assert!(!report.short_circuited);
        assert_eq!(stage_names(&report), vec!["schema", "rules", "guide_sequence", "gene_symbol", "policy"]);
        assert!(report.stages.iter().all(|(_, r)| r.passed));
        assert_eq!(report.stages.get("schema").unwrap().records_processed, 20);
        assert!(report.is_sealed());
        assert_eq!(report.ruleset_metadata.source, "inline:test");
    }

    #[tokio::test]
    async fn test_rule_errors_reject_without_short_circuit() {
        let mut config = ValidationConfig::default();
        config.rules = failing_rules(6, Severity::Error);
        let (orchestrator, _) = orchestrator(config);

        let report = orchestrator.validate(guides(20), metadata()).await.unwrap();
        assert_eq!(report.final_decision, Some(Decision::Rejected));
        assert!(!report.short_circuited);
        assert!(report.decision_rationale.contains("error_threshold"));
        assert!(report.stages.contains("guide_sequence"));
        assert!(report.stages.contains("gene_symbol"));

        // Six errors also trip the review trigger.
        assert!(report.requires_human_review);
        assert!(report.stages.contains(REVIEW_STAGE));
        let task = orchestrator.review().task(report.review_id.unwrap()).await.unwrap();
        assert_eq!(task.status, ReviewStatus::Escalated);
        assert_eq!(task.validation_id, report.validation_id);
    }

    #[tokio::test]
    async fn test_missing_columns_short_circuit() {
        let dataset = Dataset::new(
            vec!["guide_id".to_string(), "sequence".to_string()],
            vec![vec![json!("g1"), json!("ACGTACGTACGTACGTACGT")]],
        )
        .unwrap();
        let (orchestrator, genes) = orchestrator(ValidationConfig::default());

        let report = orchestrator.validate(dataset, metadata()).await.unwrap();
        assert!(report.short_circuited);
        assert_eq!(report.final_decision, Some(Decision::Rejected));
        assert_eq!(report.decision_rationale, "failed schema validation");
        assert_eq!(stage_names(&report), vec!["schema"]);
        assert_eq!(genes.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_moderate_warnings_conditionally_accept() {
        let mut config = ValidationConfig::default();
        config.rules = failing_rules(3, Severity::Warning);
        let (orchestrator, _) = orchestrator(config);

        let report = orchestrator.validate(guides(20), metadata()).await.unwrap();
        assert_eq!(report.final_decision, Some(Decision::ConditionalAccept));
        assert!(report.decision_rationale.contains("moderate_warnings"));
        assert!(!report.requires_human_review);
    }

    #[tokio::test]
    async fn test_repeated_lookup_is_served_from_cache() {
        let (orchestrator, genes) = orchestrator(ValidationConfig::default());

        let first = orchestrator.validate(guides(20), metadata()).await.unwrap();
        let second = orchestrator.validate(guides(20), metadata()).await.unwrap();

        let stats = |report: &Report, key: &str| -> u64 {
            report.stages.get("gene_symbol").unwrap().metadata[key].as_u64().unwrap()
        };
        assert!(stats(&second, "cache_hits") >= 1);
        assert!(stats(&second, "api_calls_made") < stats(&first, "api_calls_made"));
        assert_eq!(genes.calls.load(Ordering::SeqCst), 1);

        assert_ne!(first.validation_id, second.validation_id);
        assert_eq!(first.final_decision, second.final_decision);
    }

    #[tokio::test]
    async fn test_rule_critical_short_circuits() {
        let mut config = ValidationConfig::default();
        config.rules = failing_rules(1, Severity::Critical);
        let (orchestrator, _) = orchestrator(config);

        let report = orchestrator.validate(guides(5), metadata()).await.unwrap();
        assert!(report.short_circuited);
        assert_eq!(report.final_decision, Some(Decision::Rejected));
        assert_eq!(stage_names(&report), vec!["schema", "rules"]);
    }

    #[tokio::test]
    async fn test_invalid_rule_rejects_citing_error() {
        let mut config = ValidationConfig::default();
        config.rules = vec![RuleSpec {
            id: "lab.bad_regex".to_string(),
            field: "guide_id".to_string(),
            predicate: Predicate::Matches {
                pattern: "([".to_string(),
            },
            severity: Severity::Error,
            message: None,
            skip_blank: true,
        }];
        let (orchestrator, _) = orchestrator(config);

        let report = orchestrator.validate(guides(5), metadata()).await.unwrap();
        assert_eq!(report.final_decision, Some(Decision::Rejected));
        assert!(report.short_circuited);
        assert!(report.decision_rationale.starts_with("rules stage failed"));
        assert!(report.decision_rationale.contains("lab.bad_regex"));
    }

    #[tokio::test]
    async fn test_timeout_yields_error_decision() {
        let mut config = ValidationConfig::default();
        config.formats.get_mut("crispr_guides").unwrap().checkers.push("slow".to_string());
        let (orchestrator, _) = orchestrator_with(config, |r| r.register(CheckerKind::asynchronous(Slow)).unwrap());
        let orchestrator = orchestrator.with_timeout(Duration::from_millis(300));

        let report = orchestrator.validate(guides(5), metadata()).await.unwrap();
        assert_eq!(report.final_decision, Some(Decision::Error));
        assert!(report.decision_rationale.contains("timed out"));
        assert!(report.decision_rationale.contains("format_checks"));
        assert!(!report.stages.contains("slow"));
        assert!(!report.stages.contains("policy"));
    }

    #[tokio::test]
    async fn test_failing_checkers_do_not_abort_siblings() {
        let mut config = ValidationConfig::default();
        config.formats.get_mut("crispr_guides").unwrap().checkers = vec![
            "exploding".to_string(),
            "guide_sequence".to_string(),
            "unreachable".to_string(),
            "gene_symbol".to_string(),
            "not_installed".to_string(),
            "guide_sequence".to_string(),
            "policy".to_string(),
        ];
        let (orchestrator, _) = orchestrator_with(config, |r| {
            r.register(CheckerKind::blocking(Exploding)).unwrap();
            r.register(CheckerKind::asynchronous(Unreachable)).unwrap();
        });

        let report = orchestrator.validate(guides(20), metadata()).await.unwrap();
        assert_eq!(
            stage_names(&report),
            vec!["schema", "rules", "exploding", "guide_sequence", "unreachable", "gene_symbol", "not_installed", "policy", "human_review"]
        );

        for failed in ["exploding", "unreachable", "not_installed"] {
            let result = report.stages.get(failed).unwrap();
            assert!(!result.passed, "{}", failed);
            assert_eq!(result.issues.len(), 1);
            assert!(result.issues[0].is_system_error());
            assert_eq!(result.issues[0].severity, Severity::Critical);
        }
        assert!(report.stages.get("exploding").unwrap().issues[0].message.contains("index out of bounds"));
        assert!(report.stages.get("guide_sequence").unwrap().passed);
        assert!(report.stages.get("gene_symbol").unwrap().passed);

        assert_eq!(report.final_decision, Some(Decision::Rejected));
        assert!(report.requires_human_review);
    }

    #[tokio::test]
    async fn test_learned_patterns_override_policy() {
        let mut config = ValidationConfig::default();
        config.rules = failing_rules(3, Severity::Error);
        let (orchestrator, _) = orchestrator(config);

        let decisions: Vec<(IssueSignature, Decision)> = (0..3)
            .flat_map(|i| {
                let signature = IssueSignature::new(Some(format!("lab.rule{}", i).as_str()), "guide_id", Severity::Error);
                std::iter::repeat((signature, Decision::Rejected)).take(6)
            })
            .collect();
        orchestrator.review().patterns().record_all(&decisions, chrono::Utc::now()).await;

        let report = orchestrator.validate(guides(20), metadata()).await.unwrap();
        assert_eq!(report.final_decision, Some(Decision::Rejected));
        assert!(!report.requires_human_review);
        assert!(report.decision_rationale.contains("auto-resolved"));
        let review = report.stages.get(REVIEW_STAGE).unwrap();
        assert_eq!(review.metadata["auto_resolved"], Value::Bool(true));
    }

    #[tokio::test]
    async fn test_unknown_format_runs_no_format_checkers() {
        let (orchestrator, _) = orchestrator(ValidationConfig::default());
        let report = orchestrator
            .validate(guides(3), DatasetMetadata::new("odd", "proteomics"))
            .await
            .unwrap();

        assert_eq!(stage_names(&report), vec!["schema", "rules", "policy"]);
        assert_eq!(report.stages.get("schema").unwrap().issues[0].rule_id.as_deref(), Some("schema.unknown_format"));
        assert_eq!(report.final_decision, Some(Decision::Accepted));
    }

    #[tokio::test]
    async fn test_reload_does_not_change_snapshot() {
        let (orchestrator, _) = orchestrator(ValidationConfig::default());
        let pinned = orchestrator.config().snapshot();

        let mut strict = ValidationConfig::default();
        strict.version = "2".to_string();
        strict.rules = failing_rules(1, Severity::Critical);
        orchestrator
            .config()
            .replace(LoadedConfig::from_config(strict, &datagate_config::ConfigSource::Inline("strict".to_string())).unwrap())
            .unwrap();

        let report = orchestrator.validate_with_config(guides(20), metadata(), pinned).await.unwrap();
        assert_eq!(report.final_decision, Some(Decision::Accepted));
        assert_eq!(report.ruleset_metadata.version, "1");

        let report = orchestrator.validate(guides(20), metadata()).await.unwrap();
        assert_eq!(report.final_decision, Some(Decision::Rejected));
        assert_eq!(report.ruleset_metadata.version, "2");
    }
}
