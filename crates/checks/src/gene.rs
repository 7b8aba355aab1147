//! Gene symbol checks against external authorities.

use crate::authority::{Authorities, GeneAuthority, GeneRecord};
use crate::checker::AsyncCheck;
use crate::context::CheckContext;
use crate::error::Result;
use async_trait::async_trait;
use datagate_batch::{BatchProcessor, BatchRun, BatchSettings, ProviderLimiters};
use datagate_cache::LookupCache;
use datagate_core::{cell_is_blank, cell_text, CheckResult, Issue, Severity};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Symbols listed on an issue as examples.
const SAMPLE_SYMBOLS: usize = 20;

/// Resolves every distinct symbol of the dataset, cache first, then the
/// primary authority, then the fallback for whatever the primary failed on.
///
/// Unknown symbols are errors. Symbols only the fallback could resolve are
/// warnings; symbols neither authority could resolve are errors.
pub struct GeneSymbolChecker {
    cache: Arc<dyn LookupCache>,
    authorities: Authorities,
    limiters: Arc<ProviderLimiters>,
}

impl GeneSymbolChecker {
    /// Create a checker with its own rate limiters.
    pub fn new(cache: Arc<dyn LookupCache>, authorities: Authorities) -> Self {
        Self {
            cache,
            authorities,
            limiters: Arc::new(ProviderLimiters::new()),
        }
    }

    /// Share rate limiters with other callers of the same providers.
    pub fn with_limiters(mut self, limiters: Arc<ProviderLimiters>) -> Self {
        self.limiters = limiters;
        self
    }

    async fn query(
        &self,
        ctx: &CheckContext,
        organism: &str,
        symbols: Vec<String>,
    ) -> Result<Option<BatchRun<String, Option<GeneRecord>>>> {
        let Some(primary) = &self.authorities.primary else {
            return Ok(None);
        };

        let settings = BatchSettings::from(&ctx.settings().batch);
        let batch_size = settings.batch_size;
        let primary_processor =
            BatchProcessor::new(settings.clone(), self.limiters.get(primary.provider()));

        let run = match &self.authorities.fallback {
            Some(fallback) => {
                let fallback_processor =
                    BatchProcessor::new(settings, self.limiters.get(fallback.provider()));
                primary_processor
                    .process_with_fallback(
                        &fallback_processor,
                        symbols,
                        batch_size,
                        lookup_fn(primary.clone(), organism),
                        lookup_fn(fallback.clone(), organism),
                        &ctx.cancel,
                    )
                    .await?
            }
            None => {
                primary_processor
                    .process_batches(symbols, batch_size, lookup_fn(primary.clone(), organism), &ctx.cancel)
                    .await?
            }
        };
        Ok(Some(run))
    }
}

impl std::fmt::Debug for GeneSymbolChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneSymbolChecker")
            .field("authorities", &self.authorities)
            .finish()
    }
}

type LookupFuture = BoxFuture<'static, Result<Vec<Option<GeneRecord>>>>;

fn lookup_fn(authority: Arc<dyn GeneAuthority>, organism: &str) -> impl Fn(Vec<String>) -> LookupFuture {
    let organism = organism.to_string();
    move |batch| {
        let authority = authority.clone();
        let organism = organism.clone();
        async move { authority.lookup(&organism, &batch).await }.boxed()
    }
}

#[async_trait]
impl AsyncCheck for GeneSymbolChecker {
    fn name(&self) -> &str {
        "gene_symbol"
    }

    async fn check(&self, ctx: &CheckContext) -> Result<CheckResult> {
        let start = Instant::now();
        let config = &ctx.settings().checkers.gene_symbol;
        let column = ctx.require_column(&config.symbol_column)?;
        let organism = ctx
            .metadata
            .organism
            .clone()
            .unwrap_or_else(|| config.default_organism.clone());

        // Distinct normalized symbols and how many rows carry each.
        let mut occurrences: BTreeMap<String, usize> = BTreeMap::new();
        for row in ctx.dataset.rows() {
            let cell = &row[column];
            if cell_is_blank(cell) {
                continue;
            }
            if let Some(text) = cell_text(cell) {
                *occurrences.entry(text.trim().to_uppercase()).or_insert(0) += 1;
            }
        }
        let symbols: Vec<String> = occurrences.keys().cloned().collect();

        let mut resolved: HashMap<String, Option<GeneRecord>> = HashMap::new();
        let cached = self.cache.get_batch(&organism, &symbols).await;
        let cache_hits = cached.len();
        for (symbol, hit) in cached {
            match serde_json::from_value::<Option<GeneRecord>>(hit.value) {
                Ok(record) => {
                    resolved.insert(symbol, record);
                }
                Err(e) => warn!("Ignoring unreadable cache entry for {}: {}", symbol, e),
            }
        }

        let misses: Vec<String> = symbols.iter().filter(|s| !resolved.contains_key(*s)).cloned().collect();
        debug!(
            "Gene symbols for {}: {} distinct, {} cached, {} to query",
            organism,
            symbols.len(),
            resolved.len(),
            misses.len()
        );

        let mut issues = Vec::new();
        let mut api_calls = 0;
        let mut via_fallback = Vec::new();
        let mut failed: Vec<(String, String)> = Vec::new();
        let mut unchecked = 0;

        if !misses.is_empty() {
            match self.query(ctx, &organism, misses.clone()).await? {
                None => {
                    unchecked = misses.len();
                    issues.push(
                        Issue::new(
                            &config.symbol_column,
                            format!("no gene authority configured, {} symbols unchecked", misses.len()),
                            Severity::Warning,
                        )
                        .with_rule("gene.unchecked")
                        .with_affected(misses.iter().map(|s| occurrences[s]).sum()),
                    );
                }
                Some(run) => {
                    api_calls = run.calls_made;
                    for item in run.results {
                        match item.outcome {
                            Ok(record) => {
                                let value = serde_json::to_value(&record).unwrap_or_default();
                                if let Err(e) = self.cache.set(&organism, &item.item, value, &item.provider).await {
                                    warn!("Failed to cache {}: {}", item.item, e);
                                }
                                if item.used_fallback {
                                    via_fallback.push(item.item.clone());
                                }
                                resolved.insert(item.item, record);
                            }
                            Err(error) => failed.push((item.item, error)),
                        }
                    }
                }
            }
        }

        let rows_for = |list: &[String]| -> usize { list.iter().map(|s| occurrences[s]).sum() };

        let mut unknown: Vec<String> = resolved
            .iter()
            .filter(|(_, record)| record.is_none())
            .map(|(symbol, _)| symbol.clone())
            .collect();
        unknown.sort();
        if !unknown.is_empty() {
            issues.push(
                Issue::new(
                    &config.symbol_column,
                    format!("{} gene symbols not recognized for {}", unknown.len(), organism),
                    Severity::Error,
                )
                .with_rule("gene.unknown_symbol")
                .with_affected(rows_for(&unknown))
                .with_metadata("symbols", sample(&unknown)),
            );
        }

        let mut aliases: Vec<String> = resolved
            .iter()
            .filter_map(|(symbol, record)| {
                let record = record.as_ref()?;
                (!record.symbol.eq_ignore_ascii_case(symbol)).then(|| format!("{} -> {}", symbol, record.symbol))
            })
            .collect();
        aliases.sort();
        if !aliases.is_empty() {
            issues.push(
                Issue::new(
                    &config.symbol_column,
                    format!("{} symbols are aliases of an official symbol", aliases.len()),
                    Severity::Info,
                )
                .with_rule("gene.alias")
                .with_metadata("aliases", sample(&aliases)),
            );
        }

        if !via_fallback.is_empty() {
            via_fallback.sort();
            issues.push(
                Issue::new(
                    &config.symbol_column,
                    format!("{} symbols resolved by the fallback authority after the primary failed", via_fallback.len()),
                    Severity::Warning,
                )
                .with_rule("gene.fallback")
                .with_affected(rows_for(&via_fallback))
                .with_metadata("symbols", sample(&via_fallback)),
            );
        }

        if !failed.is_empty() {
            failed.sort();
            let symbols: Vec<String> = failed.iter().map(|(s, _)| s.clone()).collect();
            issues.push(
                Issue::new(
                    &config.symbol_column,
                    format!("{} symbols could not be checked: {}", failed.len(), failed[0].1),
                    Severity::Error,
                )
                .with_rule("gene.lookup_failed")
                .with_affected(rows_for(&symbols))
                .with_metadata("symbols", sample(&symbols)),
            );
        }

        let unresolved = failed.len() + unchecked;
        let confidence = if symbols.is_empty() {
            1.0
        } else {
            1.0 - unresolved as f64 / symbols.len() as f64
        };

        Ok(CheckResult::from_issues(self.name(), self.category(), issues, ctx.dataset.len(), start.elapsed())
            .with_confidence(confidence)
            .with_metadata("organism", organism)
            .with_metadata("symbols_checked", symbols.len())
            .with_metadata("cache_hits", cache_hits)
            .with_metadata("api_calls_made", api_calls)
            .with_metadata("fallback_used", via_fallback.len()))
    }
}

fn sample(list: &[String]) -> Vec<String> {
    list.iter().take(SAMPLE_SYMBOLS).cloned().collect()
}
