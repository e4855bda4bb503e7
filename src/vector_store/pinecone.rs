//! Pinecone vector store implementation.
//!
//! Talks to the Pinecone REST API. The index host is resolved once on first use;
//! the first `add` creates the index when it does not exist yet.

use super::{Document, SearchResult, VectorStore};
use crate::embedding::Embedder;
use crate::error::{Result, VidqaError};
use crate::openai::DEFAULT_TIMEOUT_SECS;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Pinecone control plane for index management.
pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
/// Metadata key holding the chunk text.
const TEXT_KEY: &str = "text";
/// Metadata key holding the insertion timestamp (microseconds), used for tie-breaks.
const INDEXED_AT_KEY: &str = "indexed_at";
const UPSERT_BATCH_SIZE: usize = 100;
const DELETE_BATCH_SIZE: usize = 1000;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_POLL_ATTEMPTS: usize = 60;

/// Connection settings for a Pinecone index.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    pub namespace: Option<String>,
    /// Cloud for index creation (e.g. "aws").
    pub cloud: String,
    /// Region for index creation (e.g. "us-east-1").
    pub region: String,
    /// Control plane base URL.
    pub control_plane_url: String,
}

impl PineconeConfig {
    /// Config for `index_name` on the public control plane, serverless on aws/us-east-1.
    pub fn new(api_key: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_name: index_name.into(),
            namespace: None,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            control_plane_url: CONTROL_PLANE_URL.to_string(),
        }
    }
}

/// Persistent vector store backed by a Pinecone serverless index.
pub struct PineconeVectorStore {
    client: reqwest::Client,
    config: PineconeConfig,
    embedder: Arc<dyn Embedder>,
    host: OnceCell<String>,
    ready_poll_interval: Duration,
}

impl PineconeVectorStore {
    /// Create a store for the configured index. No network calls are made here.
    pub fn new(config: PineconeConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if config.index_name.trim().is_empty() {
            return Err(VidqaError::Config("Pinecone index name is empty".to_string()));
        }
        if config.api_key.trim().is_empty() {
            return Err(VidqaError::Config("Pinecone API key is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(config.api_key.trim())
                .map_err(|_| VidqaError::Config("Invalid Pinecone API key".to_string()))?,
        );
        headers.insert("x-pinecone-api-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .map_err(|e| VidqaError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            embedder,
            host: OnceCell::new(),
            ready_poll_interval: READY_POLL_INTERVAL,
        })
    }

    /// Override the delay between readiness checks after index creation.
    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    fn control_plane(&self) -> &str {
        self.config.control_plane_url.trim_end_matches('/')
    }

    /// Name of the remote index.
    pub fn index_name(&self) -> &str {
        &self.config.index_name
    }

    /// Resolve the data-plane host, creating the index when `create_dimension` is given.
    async fn ensure_host(&self, create_dimension: Option<usize>) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = match self.describe_index().await? {
                    Some(description) => description,
                    None => {
                        let dimension = create_dimension.ok_or_else(|| {
                            VidqaError::Retrieval(format!(
                                "Pinecone index '{}' does not exist",
                                self.config.index_name
                            ))
                        })?;
                        self.create_index(dimension).await?;
                        self.wait_until_ready().await?
                    }
                };

                let expected = self.embedder.dimensions();
                if description.dimension.is_some_and(|d| d != expected) {
                    return Err(VidqaError::Config(format!(
                        "Pinecone index '{}' has dimension {:?}, embedder produces {}",
                        self.config.index_name, description.dimension, expected
                    )));
                }

                let description = if description.is_ready() {
                    description
                } else {
                    self.wait_until_ready().await?
                };
                info!("Using Pinecone index {} at {}", self.config.index_name, description.host);
                Ok::<_, VidqaError>(normalize_host(&description.host))
            })
            .await?;

        Ok(host.as_str())
    }

    #[instrument(skip(self))]
    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.control_plane(), self.config.index_name);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response, "describe index").await?;
        Ok(Some(response.json().await?))
    }

    #[instrument(skip(self))]
    async fn create_index(&self, dimension: usize) -> Result<()> {
        info!(
            "Creating Pinecone index {} ({} dimensions, {}/{})",
            self.config.index_name, dimension, self.config.cloud, self.config.region
        );

        let request = CreateIndexRequest {
            name: &self.config.index_name,
            dimension,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.config.cloud,
                    region: &self.config.region,
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/indexes", self.control_plane()))
            .json(&request)
            .send()
            .await?;

        // Another process may have created it in the meantime.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        check_status(response, "create index").await?;
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<IndexDescription> {
        for attempt in 0..READY_POLL_ATTEMPTS {
            if let Some(description) = self.describe_index().await? {
                if description.is_ready() {
                    return Ok(description);
                }
            }
            debug!("Waiting for Pinecone index to become ready (attempt {})", attempt + 1);
            tokio::time::sleep(self.ready_poll_interval).await;
        }

        Err(VidqaError::VectorStore(format!(
            "Pinecone index '{}' did not become ready in time",
            self.config.index_name
        )))
    }

    async fn upsert(&self, host: &str, vectors: &[PineconeVector]) -> Result<()> {
        let request = UpsertRequest {
            vectors,
            namespace: self.config.namespace.as_deref(),
        };
        let response = self
            .client
            .post(format!("{}/vectors/upsert", host))
            .json(&request)
            .send()
            .await?;
        check_status(response, "upsert").await?;
        Ok(())
    }

    async fn delete(&self, host: &str, ids: &[&str]) -> Result<()> {
        let request = DeleteRequest {
            ids,
            namespace: self.config.namespace.as_deref(),
        };
        let response = self
            .client
            .post(format!("{}/vectors/delete", host))
            .json(&request)
            .send()
            .await?;
        check_status(response, "delete").await?;
        Ok(())
    }

    /// Best-effort removal of vectors written by a failed `add`.
    async fn rollback(&self, host: &str, vectors: &[PineconeVector]) {
        let ids: Vec<&str> = vectors.iter().map(|v| v.id.as_str()).collect();
        warn!("Rolling back {} vectors in {}", ids.len(), self.config.index_name);

        for batch in ids.chunks(DELETE_BATCH_SIZE) {
            if let Err(e) = self.delete(host, batch).await {
                warn!("Rollback of {} vectors failed: {}", batch.len(), e);
            }
        }
    }
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    #[instrument(skip(self, docs), fields(index = %self.config.index_name, count = docs.len()))]
    async fn add(&self, docs: &[Document]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != docs.len() {
            return Err(VidqaError::Embedding(format!(
                "Expected {} embeddings, got {}",
                docs.len(),
                embeddings.len()
            )));
        }

        let host = self.ensure_host(Some(self.embedder.dimensions())).await?;
        let indexed_at = Utc::now().timestamp_micros();

        let vectors: Vec<PineconeVector> = docs
            .iter()
            .zip(embeddings)
            .map(|(doc, values)| PineconeVector {
                id: Uuid::new_v4().to_string(),
                values,
                metadata: to_pinecone_metadata(doc, indexed_at),
            })
            .collect();

        let mut attempted = 0;
        for batch in vectors.chunks(UPSERT_BATCH_SIZE) {
            attempted += batch.len();
            if let Err(e) = self.upsert(host, batch).await {
                // The failed batch may have been partially written.
                self.rollback(host, &vectors[..attempted]).await;
                return Err(e);
            }
        }

        info!("Upserted {} vectors into {}", vectors.len(), self.config.index_name);
        Ok(vectors.len())
    }

    #[instrument(skip(self, query), fields(index = %self.config.index_name))]
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let host = match self.host.get() {
            Some(host) => host.as_str(),
            None => {
                if self.describe_index().await.map_err(as_retrieval)?.is_none() {
                    return Ok(Vec::new());
                }
                self.ensure_host(None).await.map_err(as_retrieval)?
            }
        };

        let vector = self.embedder.embed(query).await?;
        let request = QueryRequest {
            vector: &vector,
            top_k: k,
            include_metadata: true,
            include_values: false,
            namespace: self.config.namespace.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/query", host))
            .json(&request)
            .send()
            .await
            .map_err(|e| VidqaError::Retrieval(e.to_string()))?;
        let response = check_status(response, "query").await.map_err(as_retrieval)?;
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| VidqaError::Retrieval(format!("Malformed query response: {}", e)))?;

        let mut results = rank_matches(body.matches);
        results.truncate(k);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    async fn len(&self) -> Result<usize> {
        let host = match self.host.get() {
            Some(host) => host.as_str(),
            None => {
                if self.describe_index().await?.is_none() {
                    return Ok(0);
                }
                self.ensure_host(None).await?
            }
        };

        let response = self
            .client
            .post(format!("{}/describe_index_stats", host))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let stats: IndexStats = check_status(response, "describe index stats").await?.json().await?;
        Ok(stats.count(self.config.namespace.as_deref()))
    }

    fn backend(&self) -> &'static str {
        "pinecone"
    }
}

fn as_retrieval(err: VidqaError) -> VidqaError {
    match err {
        e @ (VidqaError::Retrieval(_) | VidqaError::Config(_)) => e,
        e => VidqaError::Retrieval(e.to_string()),
    }
}

async fn check_status(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(VidqaError::VectorStore(format!(
        "Pinecone {} failed ({}): {}",
        action, status, body
    )))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Flatten a document into Pinecone metadata.
///
/// Pinecone only accepts strings, numbers, booleans and lists of strings;
/// other values are dropped.
fn to_pinecone_metadata(doc: &Document, indexed_at: i64) -> Map<String, Value> {
    let mut metadata = Map::new();
    for (key, value) in &doc.metadata {
        let supported = match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => true,
            Value::Array(items) => items.iter().all(Value::is_string),
            Value::Null | Value::Object(_) => false,
        };
        if supported {
            metadata.insert(key.clone(), value.clone());
        } else {
            debug!("Dropping unsupported metadata field {}", key);
        }
    }
    metadata.insert(TEXT_KEY.to_string(), Value::from(doc.content.as_str()));
    metadata.insert(INDEXED_AT_KEY.to_string(), Value::from(indexed_at));
    metadata
}

/// Turn query matches into results, best first, breaking ties by insertion order.
fn rank_matches(matches: Vec<QueryMatch>) -> Vec<SearchResult> {
    let mut keyed: Vec<((f64, f64), SearchResult)> = matches
        .into_iter()
        .map(|m| {
            let mut metadata = m.metadata.unwrap_or_default();
            let content = match metadata.remove(TEXT_KEY) {
                Some(Value::String(text)) => text,
                _ => {
                    warn!("Pinecone match {} has no text metadata", m.id);
                    String::new()
                }
            };
            let indexed_at = metadata
                .remove(INDEXED_AT_KEY)
                .and_then(|v| v.as_f64())
                .unwrap_or(f64::MAX);
            let chunk_index = metadata
                .get("chunk_index")
                .and_then(Value::as_f64)
                .unwrap_or(f64::MAX);

            (
                (indexed_at, chunk_index),
                SearchResult {
                    document: Document::new(content, metadata),
                    score: m.score,
                },
            )
        })
        .collect();

    keyed.sort_by(|(key_a, a), (key_b, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| key_a.partial_cmp(key_b).unwrap_or(Ordering::Equal))
    });

    keyed.into_iter().map(|(_, result)| result).collect()
}

// === Wire types ===

#[derive(Debug, Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: String,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

impl IndexDescription {
    fn is_ready(&self) -> bool {
        !self.host.is_empty() && self.status.as_ref().is_some_and(|s| s.ready)
    }
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [PineconeVector],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    total_vector_count: usize,
    #[serde(default)]
    namespaces: std::collections::HashMap<String, NamespaceStats>,
}

impl IndexStats {
    fn count(&self, namespace: Option<&str>) -> usize {
        match namespace {
            Some(ns) => self.namespaces.get(ns).map_or(0, |s| s.vector_count),
            None => self.total_vector_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}
