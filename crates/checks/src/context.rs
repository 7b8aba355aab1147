//! Per-run checker input.

use crate::error::{CheckError, Result};
use datagate_config::{LoadedConfig, ValidationConfig};
use datagate_core::{Dataset, DatasetMetadata};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a checker may read during one run.
///
/// Cheap to clone; all parts are shared.
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// The dataset under validation
    pub dataset: Arc<Dataset>,

    /// Its metadata
    pub metadata: Arc<DatasetMetadata>,

    /// Configuration snapshot taken at run start
    pub config: Arc<LoadedConfig>,

    /// Fires when the run is cancelled or times out
    pub cancel: CancellationToken,
}

impl CheckContext {
    /// Create a context.
    pub fn new(
        dataset: Arc<Dataset>,
        metadata: Arc<DatasetMetadata>,
        config: Arc<LoadedConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            dataset,
            metadata,
            config,
            cancel,
        }
    }

    /// Shorthand for the configuration document.
    pub fn settings(&self) -> &ValidationConfig {
        &self.config.config
    }

    /// Fail with `Cancelled` if the run was cancelled.
    ///
    /// Blocking checkers call this between rows.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(CheckError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Index of a column the checker cannot run without.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.dataset
            .column_index(name)
            .ok_or_else(|| CheckError::MissingColumn(name.to_string()))
    }
}
