//! Versioned, hot-reloadable configuration store.

use crate::error::{ConfigError, Result};
use crate::model::ValidationConfig;
use datagate_core::RulesetMetadata;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Where a configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A JSON file that can be re-read
    File(PathBuf),
    /// An in-process value with a label
    Inline(String),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "file:{}", path.display()),
            ConfigSource::Inline(label) => write!(f, "inline:{}", label),
        }
    }
}

/// A parsed configuration and its fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    /// The configuration
    pub config: ValidationConfig,

    /// Version, content hash and source
    pub ruleset: RulesetMetadata,
}

impl LoadedConfig {
    /// Fingerprint an in-memory configuration.
    pub fn from_config(config: ValidationConfig, source: &ConfigSource) -> Result<Self> {
        validate(&config)?;
        let canonical = serde_json::to_vec(&config)?;
        Ok(Self::fingerprint(config, &canonical, source))
    }

    /// Parse and fingerprint a JSON document.
    pub fn from_json(content: &str, source: &ConfigSource) -> Result<Self> {
        let config: ValidationConfig = serde_json::from_str(content)?;
        validate(&config)?;
        Ok(Self::fingerprint(config, content.as_bytes(), source))
    }

    fn fingerprint(config: ValidationConfig, content: &[u8], source: &ConfigSource) -> Self {
        let hash = hex::encode(Sha256::digest(content));
        let ruleset = RulesetMetadata {
            version: config.version.clone(),
            hash,
            source: source.to_string(),
        };
        Self { config, ruleset }
    }
}

impl Default for LoadedConfig {
    fn default() -> Self {
        let source = ConfigSource::Inline("default".to_string());
        let config = ValidationConfig::default();
        let canonical = serde_json::to_vec(&config).unwrap_or_default();
        Self::fingerprint(config, &canonical, &source)
    }
}

/// Holds the active configuration and swaps it atomically on reload.
///
/// Readers take an `Arc` snapshot; a reload never changes a snapshot that
/// is already in use.
pub struct ConfigStore {
    source: ConfigSource,
    current: RwLock<Arc<LoadedConfig>>,
}

impl ConfigStore {
    /// Wrap an in-memory configuration.
    pub fn from_config(config: ValidationConfig, label: impl Into<String>) -> Result<Self> {
        let source = ConfigSource::Inline(label.into());
        let loaded = LoadedConfig::from_config(config, &source)?;
        Ok(Self {
            source,
            current: RwLock::new(Arc::new(loaded)),
        })
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let source = ConfigSource::File(path.clone());
        let loaded = read_file(&path, &source)?;
        info!(
            "Loaded config {} version {} ({})",
            path.display(),
            loaded.ruleset.version,
            &loaded.ruleset.hash[..12]
        );
        Ok(Self {
            source,
            current: RwLock::new(Arc::new(loaded)),
        })
    }

    /// Where this store reads from.
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// The active configuration.
    pub fn snapshot(&self) -> Arc<LoadedConfig> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Re-read the source. Returns whether the content hash changed.
    ///
    /// A failed reload keeps the previous configuration active.
    pub fn reload(&self) -> Result<bool> {
        let path = match &self.source {
            ConfigSource::File(path) => path.clone(),
            ConfigSource::Inline(_) => {
                debug!("Inline config has nothing to reload");
                return Ok(false);
            }
        };

        let loaded = match read_file(&path, &self.source) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Config reload failed, keeping previous version: {}", e);
                return Err(e);
            }
        };

        self.replace(loaded)
    }

    /// Swap in a new configuration. Returns whether the content hash changed.
    pub fn replace(&self, loaded: LoadedConfig) -> Result<bool> {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if current.ruleset.hash == loaded.ruleset.hash {
            return Ok(false);
        }

        info!(
            "Config changed: version {} -> {}",
            current.ruleset.version, loaded.ruleset.version
        );
        *current = Arc::new(loaded);
        Ok(true)
    }
}

fn read_file(path: &Path, source: &ConfigSource) -> Result<LoadedConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    LoadedConfig::from_json(&content, source)
}

fn validate(config: &ValidationConfig) -> Result<()> {
    if config.batch.batch_size == 0 {
        return Err(ConfigError::Invalid("batch.batch_size must be at least 1".to_string()));
    }
    if config.pipeline.timeout_secs == 0 {
        return Err(ConfigError::Invalid("pipeline.timeout_secs must be at least 1".to_string()));
    }
    if config.review.max_selected == 0 {
        return Err(ConfigError::Invalid("review.max_selected must be at least 1".to_string()));
    }
    let weights = config.review.uncertainty_weight + config.review.novelty_weight;
    if !(0.0..=1.0 + f64::EPSILON).contains(&weights) {
        return Err(ConfigError::Invalid(format!(
            "review weights must sum to at most 1.0, got {}",
            weights
        )));
    }
    for (name, format) in &config.formats {
        for spec in &format.schema.columns {
            if spec.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "format {} has a schema column with an empty name",
                    name
                )));
            }
        }
    }
    Ok(())
}
