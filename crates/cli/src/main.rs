//! datagate CLI - validate a dataset document and report the decision.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datagate_config::{ConfigStore, ValidationConfig};
use datagate_core::{Dataset, DatasetMetadata, Decision, Report};
use datagate_pipeline::Orchestrator;
use datagate_review::PatternSnapshot;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit status for usage and I/O failures.
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "datagate")]
#[command(about = "Data-quality gate for tabular datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a dataset document and print the report
    Validate {
        /// Dataset document (JSON with `metadata` and `dataset`)
        dataset: PathBuf,
        /// Configuration file; built-in defaults when absent
        #[arg(long)]
        config: Option<PathBuf>,
        /// Per-run timeout in seconds, overriding the configuration
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,
        /// Learned-pattern snapshot to load before and save after the run
        #[arg(long)]
        patterns: Option<PathBuf>,
        /// Print the report on one line
        #[arg(long)]
        compact: bool,
    },
    /// Load a configuration file and print its fingerprint
    CheckConfig {
        /// Configuration file
        config: PathBuf,
    },
    /// List the registered format checkers
    Checkers {
        /// Configuration file; built-in defaults when absent
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Input document for `validate`.
#[derive(Debug, Deserialize)]
struct DatasetDocument {
    metadata: DatasetMetadata,
    dataset: Dataset,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Validate {
            dataset,
            config,
            timeout,
            patterns,
            compact,
        } => {
            let document = read_document(&dataset)?;
            let mut orchestrator = Orchestrator::builtin(open_config(config.as_deref())?)?;
            if let Some(secs) = timeout {
                orchestrator = orchestrator.with_timeout(Duration::from_secs(secs));
            }

            if let Some(path) = patterns.as_deref().filter(|p| p.exists()) {
                let snapshot: PatternSnapshot = read_json(path)?;
                let loaded = orchestrator.review().import_patterns(snapshot).await?;
                info!("Loaded {} learned patterns from {}", loaded, path.display());
            }

            let report = orchestrator.validate(document.dataset, document.metadata).await?;

            if let Some(path) = patterns.as_deref() {
                let snapshot = orchestrator.review().export_patterns().await;
                write_json(path, &snapshot)?;
            }

            let rendered = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{}", rendered);
            Ok(ExitCode::from(exit_code(&report)))
        }
        Commands::CheckConfig { config } => {
            let store = ConfigStore::load(&config)?;
            let loaded = store.snapshot();
            println!("Config: {}", store.source());
            println!("  Version: {}", loaded.ruleset.version);
            println!("  Hash: {}", loaded.ruleset.hash);
            println!("  Formats: {}", loaded.config.formats.keys().cloned().collect::<Vec<_>>().join(", "));
            println!("  Global rules: {}", loaded.config.rules.len());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Checkers { config } => {
            let orchestrator = Orchestrator::builtin(open_config(config.as_deref())?)?;
            for name in orchestrator.registry().names() {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_config(path: Option<&Path>) -> Result<Arc<ConfigStore>> {
    let store = match path {
        Some(path) => ConfigStore::load(path)?,
        None => ConfigStore::from_config(ValidationConfig::default(), "default")?,
    };
    Ok(Arc::new(store))
}

fn read_document(path: &Path) -> Result<DatasetDocument> {
    let document: DatasetDocument = read_json(path)?;
    info!(
        "Read dataset {} ({} rows, {} columns)",
        document.metadata.dataset_id,
        document.dataset.len(),
        document.dataset.columns().len()
    );
    Ok(document)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

/// Process exit status for a sealed report.
fn exit_code(report: &Report) -> u8 {
    match report.final_decision {
        Some(Decision::Accepted) => 0,
        Some(Decision::ConditionalAccept) => 10,
        Some(Decision::Rejected) => 20,
        Some(Decision::Error) | None => 30,
    }
}
