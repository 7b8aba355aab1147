//! Typed configuration.
//!
//! Every section carries `#[serde(default)]` so a partial document is a
//! valid configuration; missing values fall back to the defaults below.

use datagate_core::{Decision, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Declared version of this ruleset
    pub version: String,

    /// Orchestrator settings
    pub pipeline: PipelineConfig,

    /// Decision thresholds
    pub policy: PolicyConfig,

    /// Human review settings
    pub review: ReviewConfig,

    /// Lookup cache settings
    pub cache: CacheConfig,

    /// External call batching
    pub batch: BatchConfig,

    /// External authority endpoints
    pub authority: AuthorityConfig,

    /// Rules applied to every format
    pub rules: Vec<RuleSpec>,

    /// Per-format schema, rules and checker selection
    pub formats: BTreeMap<String, FormatConfig>,

    /// Settings for the built-in format checkers
    pub checkers: CheckerSettings,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let mut formats = BTreeMap::new();
        formats.insert(
            "crispr_guides".to_string(),
            FormatConfig {
                schema: SchemaConfig::required(&[
                    ("guide_id", ColumnType::String),
                    ("sequence", ColumnType::String),
                    ("gene_symbol", ColumnType::String),
                ]),
                rules: Vec::new(),
                checkers: vec!["guide_sequence".to_string(), "gene_symbol".to_string()],
            },
        );
        formats.insert(
            "variant_annotation".to_string(),
            FormatConfig {
                schema: SchemaConfig::required(&[
                    ("chrom", ColumnType::String),
                    ("pos", ColumnType::Integer),
                    ("ref", ColumnType::String),
                    ("alt", ColumnType::String),
                ]),
                rules: Vec::new(),
                checkers: vec!["variant".to_string()],
            },
        );
        formats.insert(
            "numeric_matrix".to_string(),
            FormatConfig {
                schema: SchemaConfig::default(),
                rules: Vec::new(),
                checkers: vec!["numeric_matrix".to_string()],
            },
        );

        Self {
            version: "1".to_string(),
            pipeline: PipelineConfig::default(),
            policy: PolicyConfig::default(),
            review: ReviewConfig::default(),
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            authority: AuthorityConfig::default(),
            rules: Vec::new(),
            formats,
            checkers: CheckerSettings::default(),
        }
    }
}

impl ValidationConfig {
    /// Format section for a format type, if configured.
    pub fn format(&self, format_type: &str) -> Option<&FormatConfig> {
        self.formats.get(format_type)
    }

    /// Global rules followed by the format's own rules.
    pub fn rules_for(&self, format_type: &str) -> Vec<&RuleSpec> {
        self.rules
            .iter()
            .chain(self.format(format_type).into_iter().flat_map(|f| f.rules.iter()))
            .collect()
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-run timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

/// Comparison operator for structured predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Equal
    Eq,
    /// Not equal
    Ne,
}

impl CompareOp {
    /// Apply the operator.
    pub fn apply<T: PartialOrd>(&self, actual: T, expected: T) -> bool {
        match self {
            CompareOp::Gt => actual > expected,
            CompareOp::Ge => actual >= expected,
            CompareOp::Lt => actual < expected,
            CompareOp::Le => actual <= expected,
            CompareOp::Eq => actual == expected,
            CompareOp::Ne => actual != expected,
        }
    }

    /// Operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }
}

/// Severity count a policy condition reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountField {
    Critical,
    Error,
    Warning,
    Info,
}

impl CountField {
    /// The severity counted by this field.
    pub fn severity(&self) -> Severity {
        match self {
            CountField::Critical => Severity::Critical,
            CountField::Error => Severity::Error,
            CountField::Warning => Severity::Warning,
            CountField::Info => Severity::Info,
        }
    }
}

/// One `(field, operator, threshold)` comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountCondition {
    /// Which count
    pub field: CountField,

    /// Comparison
    pub op: CompareOp,

    /// Right-hand side
    pub threshold: u32,
}

/// A policy table row. All conditions must hold for the rule to match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRuleSpec {
    /// Rule name, quoted in rationales
    pub name: String,

    /// Lower runs first
    pub priority: u32,

    /// Conjunction of conditions
    pub conditions: Vec<CountCondition>,

    /// Decision when matched
    pub decision: Decision,
}

/// Decision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Critical issues needed to reject
    pub critical_threshold: u32,

    /// Errors needed to reject
    pub error_threshold: u32,

    /// Warnings needed for a conditional accept
    pub warning_threshold: u32,

    /// Warnings (with no errors) needed for a conditional accept
    pub moderate_warning_threshold: u32,

    /// Review triggers
    pub review: ReviewTriggers,

    /// Explicit rule table. When absent, the table is built from the
    /// thresholds above.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<PolicyRuleSpec>>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            critical_threshold: 1,
            error_threshold: 5,
            warning_threshold: 10,
            moderate_warning_threshold: 3,
            review: ReviewTriggers::default(),
            rules: None,
        }
    }
}

/// Conditions that send a dataset to a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewTriggers {
    /// Errors that trigger review
    pub review_error_threshold: u32,

    /// Warnings that trigger review
    pub review_warning_threshold: u32,

    /// Stage confidence below this triggers review
    pub confidence_floor: f64,
}

impl Default for ReviewTriggers {
    fn default() -> Self {
        Self {
            review_error_threshold: 3,
            review_warning_threshold: 15,
            confidence_floor: 0.7,
        }
    }
}

/// Human review settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Non-priority issues above this informativeness are selected
    pub informativeness_threshold: f64,

    /// Most issues sent to a reviewer
    pub max_selected: usize,

    /// Weight of uncertainty in informativeness
    pub uncertainty_weight: f64,

    /// Weight of novelty in informativeness
    pub novelty_weight: f64,

    /// Feedback/seen count at which uncertainty and novelty reach zero
    pub saturation: u32,

    /// Consistency that must be exceeded to auto-resolve
    pub auto_resolve_consistency: f64,

    /// Feedback count that must be exceeded to auto-resolve
    pub auto_resolve_min_feedback: u32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            informativeness_threshold: 0.5,
            max_selected: 20,
            uncertainty_weight: 0.6,
            novelty_weight: 0.4,
            saturation: 10,
            auto_resolve_consistency: 0.8,
            auto_resolve_min_feedback: 5,
        }
    }
}

/// Lookup cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether lookups are cached
    pub enabled: bool,

    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// External call batching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items per request
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    pub inter_batch_delay_ms: u64,

    /// Retries per failed batch
    pub max_retries: u32,

    /// Base retry delay in milliseconds, multiplied by the attempt number
    pub retry_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            inter_batch_delay_ms: 350,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// One external authority endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Provider tag recorded on cache entries
    pub provider: String,

    /// Base URL
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_endpoint_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint_timeout() -> u64 {
    30
}

/// External authority endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Primary gene authority
    pub primary: Option<EndpointConfig>,

    /// Fallback gene authority
    pub fallback: Option<EndpointConfig>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            primary: Some(EndpointConfig {
                provider: "mygene".to_string(),
                base_url: "https://mygene.info/v3".to_string(),
                timeout_secs: default_endpoint_timeout(),
            }),
            fallback: Some(EndpointConfig {
                provider: "ensembl".to_string(),
                base_url: "https://rest.ensembl.org".to_string(),
                timeout_secs: default_endpoint_timeout(),
            }),
        }
    }
}

/// Expected column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// JSON string
    String,
    /// Whole number
    Integer,
    /// Any number
    Float,
    /// JSON boolean
    Boolean,
    /// No type constraint
    Any,
}

/// One expected column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,

    /// Expected type
    #[serde(rename = "type", default = "default_column_type")]
    pub column_type: ColumnType,

    /// Whether blank cells are allowed
    #[serde(default)]
    pub nullable: bool,
}

fn default_column_type() -> ColumnType {
    ColumnType::Any
}

/// Expected table shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Required columns
    pub columns: Vec<ColumnSpec>,

    /// Whether columns beyond the required ones are allowed
    pub allow_extra_columns: bool,

    /// Minimum number of rows
    pub min_rows: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            allow_extra_columns: true,
            min_rows: 1,
        }
    }
}

impl SchemaConfig {
    /// Schema with non-nullable required columns.
    pub fn required(columns: &[(&str, ColumnType)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnSpec {
                    name: name.to_string(),
                    column_type: *ty,
                    nullable: false,
                })
                .collect(),
            ..Default::default()
        }
    }
}

/// A structured cell predicate. Evaluated by an interpreter, never as an
/// expression string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Cell is not null or blank
    NotBlank,
    /// Cell text matches a regex
    Matches { pattern: String },
    /// Cell is numeric and within bounds (inclusive)
    InRange {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Cell is numeric and compares against a value
    Compare { op: CompareOp, value: f64 },
    /// Cell text is one of the allowed values
    OneOf { values: Vec<String> },
    /// Cell text length is within bounds (inclusive)
    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// No two rows share a value
    Unique,
}

/// A row-level rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule id, used in issue signatures
    pub id: String,

    /// Column the rule applies to
    pub field: String,

    /// Condition every row must satisfy
    pub predicate: Predicate,

    /// Severity of a violation
    pub severity: Severity,

    /// Message; defaults to a description of the predicate
    #[serde(default)]
    pub message: Option<String>,

    /// Whether blank cells skip the rule
    #[serde(default = "default_true")]
    pub skip_blank: bool,
}

fn default_true() -> bool {
    true
}

/// Per-format configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Expected shape
    pub schema: SchemaConfig,

    /// Format-specific rules
    pub rules: Vec<RuleSpec>,

    /// Format checkers to run, by registry name
    pub checkers: Vec<String>,
}

/// Settings for the built-in format checkers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerSettings {
    /// Guide sequence checker
    pub guide_sequence: GuideSequenceConfig,

    /// Variant checker
    pub variant: VariantConfig,

    /// Numeric matrix checker
    pub numeric_matrix: NumericMatrixConfig,

    /// Gene symbol checker
    pub gene_symbol: GeneSymbolConfig,
}

/// Guide sequence checker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideSequenceConfig {
    /// Column holding the sequence
    pub sequence_column: String,

    /// Minimum guide length
    pub min_length: usize,

    /// Maximum guide length
    pub max_length: usize,

    /// Lowest acceptable GC fraction
    pub gc_min: f64,

    /// Highest acceptable GC fraction
    pub gc_max: f64,

    /// Longest acceptable single-base run
    pub max_homopolymer: usize,
}

impl Default for GuideSequenceConfig {
    fn default() -> Self {
        Self {
            sequence_column: "sequence".to_string(),
            min_length: 17,
            max_length: 24,
            gc_min: 0.2,
            gc_max: 0.8,
            max_homopolymer: 4,
        }
    }
}

/// Variant checker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantConfig {
    /// Chromosome column
    pub chrom_column: String,

    /// Position column
    pub pos_column: String,

    /// Reference allele column
    pub ref_column: String,

    /// Alternate allele column
    pub alt_column: String,

    /// Accepted chromosome names, without a `chr` prefix
    pub chromosomes: Vec<String>,
}

impl Default for VariantConfig {
    fn default() -> Self {
        let mut chromosomes: Vec<String> = (1..=22).map(|n| n.to_string()).collect();
        chromosomes.extend(["X", "Y", "MT"].iter().map(|s| s.to_string()));
        Self {
            chrom_column: "chrom".to_string(),
            pos_column: "pos".to_string(),
            ref_column: "ref".to_string(),
            alt_column: "alt".to_string(),
            chromosomes,
        }
    }
}

/// Numeric matrix checker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericMatrixConfig {
    /// Columns treated as row labels rather than values
    pub id_columns: Vec<String>,

    /// Largest tolerated share of missing cells per column
    pub max_missing_fraction: f64,

    /// Whether negative values are allowed
    pub allow_negative: bool,
}

impl Default for NumericMatrixConfig {
    fn default() -> Self {
        Self {
            id_columns: vec!["id".to_string()],
            max_missing_fraction: 0.1,
            allow_negative: true,
        }
    }
}

/// Gene symbol checker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneSymbolConfig {
    /// Column holding gene symbols
    pub symbol_column: String,

    /// Organism used when metadata has none
    pub default_organism: String,
}

impl Default for GeneSymbolConfig {
    fn default() -> Self {
        Self {
            symbol_column: "gene_symbol".to_string(),
            default_organism: "human".to_string(),
        }
    }
}
