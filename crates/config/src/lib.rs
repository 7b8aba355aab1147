//! Configuration for the validation pipeline.
//!
//! Threshold tables, per-format checker selection and the versioned,
//! hot-reloadable store whose content hash stamps every report.

#![warn(missing_docs)]

mod error;
mod model;
mod store;

pub use error::{ConfigError, Result};
pub use model::{
    AuthorityConfig, BatchConfig, CacheConfig, CheckerSettings, ColumnSpec, ColumnType,
    CompareOp, CountCondition, CountField, EndpointConfig, FormatConfig, GeneSymbolConfig,
    GuideSequenceConfig, NumericMatrixConfig, PipelineConfig, PolicyConfig, PolicyRuleSpec,
    Predicate, ReviewConfig, ReviewTriggers, RuleSpec, SchemaConfig, ValidationConfig,
    VariantConfig,
};
pub use store::{ConfigSource, ConfigStore, LoadedConfig};
