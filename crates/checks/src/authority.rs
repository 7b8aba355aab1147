//! External gene authorities.

use crate::error::{CheckError, Result};
use async_trait::async_trait;
use datagate_config::{AuthorityConfig, EndpointConfig};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A gene resolved by an authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneRecord {
    /// Official symbol
    pub symbol: String,

    /// Authority identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Full gene name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Resolves gene symbols against an external source of truth.
#[async_trait]
pub trait GeneAuthority: Send + Sync {
    /// Provider tag, used for rate limiting and cache entries.
    fn provider(&self) -> &str;

    /// Resolve a batch of symbols.
    ///
    /// Returns one entry per input symbol, in input order; `None` when the
    /// authority does not know the symbol. A transport or protocol failure
    /// fails the whole batch.
    async fn lookup(&self, organism: &str, symbols: &[String]) -> Result<Vec<Option<GeneRecord>>>;
}

/// The primary and optional fallback authority.
#[derive(Clone, Default)]
pub struct Authorities {
    /// Queried first
    pub primary: Option<Arc<dyn GeneAuthority>>,

    /// Queried for symbols the primary failed on
    pub fallback: Option<Arc<dyn GeneAuthority>>,
}

impl Authorities {
    /// A primary authority without fallback.
    pub fn new(primary: Arc<dyn GeneAuthority>) -> Self {
        Self {
            primary: Some(primary),
            fallback: None,
        }
    }

    /// Add a fallback authority.
    pub fn with_fallback(mut self, fallback: Arc<dyn GeneAuthority>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl std::fmt::Debug for Authorities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorities")
            .field("primary", &self.primary.as_ref().map(|a| a.provider().to_string()))
            .field("fallback", &self.fallback.as_ref().map(|a| a.provider().to_string()))
            .finish()
    }
}

/// Build HTTP authorities from configuration.
///
/// The primary speaks the MyGene.info query protocol, the fallback the
/// Ensembl REST symbol lookup.
pub fn build_authorities(config: &AuthorityConfig) -> Result<Authorities> {
    let primary = match &config.primary {
        Some(endpoint) => Some(Arc::new(MyGeneClient::new(endpoint)?) as Arc<dyn GeneAuthority>),
        None => None,
    };
    let fallback = match &config.fallback {
        Some(endpoint) => Some(Arc::new(EnsemblClient::new(endpoint)?) as Arc<dyn GeneAuthority>),
        None => None,
    };
    Ok(Authorities { primary, fallback })
}

fn http_client(endpoint: &EndpointConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("datagate/", env!("CARGO_PKG_VERSION"))),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Ok(Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(endpoint.timeout_secs))
        .build()?)
}

async fn post_json(client: &Client, provider: &str, url: &str, body: &Value) -> Result<Value> {
    debug!("POST {} ({})", url, provider);
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CheckError::Authority {
            provider: provider.to_string(),
            message: format!("HTTP {} from {}", status, url),
        });
    }
    Ok(response.json().await?)
}

fn protocol_error(provider: &str, err: serde_json::Error) -> CheckError {
    CheckError::Authority {
        provider: provider.to_string(),
        message: format!("unexpected response: {}", err),
    }
}

/// MyGene.info-style client (`POST /query`).
#[derive(Debug, Clone)]
pub struct MyGeneClient {
    client: Client,
    provider: String,
    base_url: String,
}

impl MyGeneClient {
    /// Create a client for an endpoint.
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(endpoint)?,
            provider: endpoint.provider.clone(),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MyGeneHit {
    query: String,
    #[serde(default)]
    notfound: bool,
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

fn parse_mygene(symbols: &[String], body: Value) -> serde_json::Result<Vec<Option<GeneRecord>>> {
    let hits: Vec<MyGeneHit> = serde_json::from_value(body)?;
    let mut by_query: HashMap<String, GeneRecord> = HashMap::new();
    for hit in hits {
        if hit.notfound {
            continue;
        }
        let key = hit.query.to_uppercase();
        by_query.entry(key).or_insert_with(|| GeneRecord {
            symbol: hit.symbol.unwrap_or_else(|| hit.query.clone()),
            id: hit.id,
            name: hit.name,
        });
    }
    Ok(symbols.iter().map(|s| by_query.get(&s.to_uppercase()).cloned()).collect())
}

#[async_trait]
impl GeneAuthority for MyGeneClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn lookup(&self, organism: &str, symbols: &[String]) -> Result<Vec<Option<GeneRecord>>> {
        let url = format!("{}/query", self.base_url);
        let body = json!({
            "q": symbols,
            "scopes": "symbol",
            "species": organism,
            "fields": "symbol,name",
        });
        let response = post_json(&self.client, &self.provider, &url, &body).await?;
        parse_mygene(symbols, response).map_err(|e| protocol_error(&self.provider, e))
    }
}

/// Ensembl REST-style client (`POST /lookup/symbol/{species}`).
#[derive(Debug, Clone)]
pub struct EnsemblClient {
    client: Client,
    provider: String,
    base_url: String,
}

impl EnsemblClient {
    /// Create a client for an endpoint.
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(endpoint)?,
            provider: endpoint.provider.clone(),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Ensembl species name for a common organism name.
fn ensembl_species(organism: &str) -> String {
    match organism.trim().to_lowercase().as_str() {
        "human" | "homo sapiens" => "homo_sapiens".to_string(),
        "mouse" | "mus musculus" => "mus_musculus".to_string(),
        "rat" | "rattus norvegicus" => "rattus_norvegicus".to_string(),
        "zebrafish" | "danio rerio" => "danio_rerio".to_string(),
        "fly" | "drosophila melanogaster" => "drosophila_melanogaster".to_string(),
        "yeast" | "saccharomyces cerevisiae" => "saccharomyces_cerevisiae".to_string(),
        other => other.replace(' ', "_"),
    }
}

#[derive(Debug, Deserialize)]
struct EnsemblGene {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn parse_ensembl(symbols: &[String], body: Value) -> serde_json::Result<Vec<Option<GeneRecord>>> {
    let genes: HashMap<String, EnsemblGene> = serde_json::from_value(body)?;
    let by_symbol: HashMap<String, EnsemblGene> =
        genes.into_iter().map(|(k, v)| (k.to_uppercase(), v)).collect();

    Ok(symbols
        .iter()
        .map(|s| {
            by_symbol.get(&s.to_uppercase()).map(|gene| GeneRecord {
                symbol: gene.display_name.clone().unwrap_or_else(|| s.clone()),
                id: gene.id.clone(),
                name: gene.description.clone(),
            })
        })
        .collect())
}

#[async_trait]
impl GeneAuthority for EnsemblClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn lookup(&self, organism: &str, symbols: &[String]) -> Result<Vec<Option<GeneRecord>>> {
        let url = format!("{}/lookup/symbol/{}", self.base_url, ensembl_species(organism));
        let body = json!({ "symbols": symbols });
        let response = post_json(&self.client, &self.provider, &url, &body).await?;
        parse_ensembl(symbols, response).map_err(|e| protocol_error(&self.provider, e))
    }
}
