//! Vector store abstraction for vidqa.
//!
//! Two interchangeable backends share one capability set: an ephemeral
//! in-process store and a persistent Pinecone index. The backend is chosen once
//! from configuration when a pipeline is built.

mod memory;
mod pinecone;

pub use memory::MemoryVectorStore;
pub use pinecone::{PineconeConfig, PineconeVectorStore};

use crate::config::{Settings, VectorStoreProvider};
use crate::embedding::Embedder;
use crate::error::{Result, VidqaError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A passage of text with free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content of this chunk.
    pub content: String,
    /// Metadata such as `source`, `chunk_index` and `start_index`.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Create a new document.
    pub fn new(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Create a document without metadata.
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(content, Map::new())
    }
}

/// A search result with score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Trait for vector store implementations.
///
/// Stores embed documents themselves through the embedder they were built with.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and store documents, returning how many were stored.
    ///
    /// Not idempotent: adding the same documents twice stores them twice.
    async fn add(&self, docs: &[Document]) -> Result<usize>;

    /// Return up to `k` documents most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order. An empty store yields no results.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored entries.
    async fn len(&self) -> Result<usize>;

    /// Short backend name for logs and status output.
    fn backend(&self) -> &'static str;
}

/// Build the vector store selected in the settings.
pub fn create_vector_store(
    settings: &Settings,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn VectorStore>> {
    match settings.vector_store.provider {
        VectorStoreProvider::Memory => Ok(Arc::new(MemoryVectorStore::new(embedder))),
        VectorStoreProvider::Pinecone => {
            let index_name = settings.index_name().ok_or_else(|| {
                VidqaError::Config(
                    "vector_store.index_name required for the pinecone vector store".to_string(),
                )
            })?;
            let api_key = settings.credentials.pinecone_api_key.clone().ok_or_else(|| {
                VidqaError::Config("PINECONE_API_KEY required for the pinecone vector store".to_string())
            })?;

            let config = PineconeConfig {
                namespace: settings.vector_store.namespace.clone(),
                cloud: settings.vector_store.cloud.clone(),
                region: settings.vector_store.region.clone(),
                ..PineconeConfig::new(api_key, index_name)
            };
            Ok(Arc::new(PineconeVectorStore::new(config, embedder)?))
        }
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort results best first, keeping the existing order for equal scores.
pub(crate) fn rank_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}
