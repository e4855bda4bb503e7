//! In-memory vector store implementation.
//!
//! Entries live for the lifetime of the store and are lost on restart.

use super::{cosine_similarity, rank_by_score, Document, SearchResult, VectorStore};
use crate::embedding::Embedder;
use crate::error::{Result, VidqaError};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};

/// A stored document and its embedding.
#[derive(Debug, Clone)]
struct IndexEntry {
    document: Document,
    embedding: Vec<f32>,
}

/// In-memory vector store.
pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<IndexEntry>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }
}

fn lock_error<E: std::fmt::Display>(e: E) -> VidqaError {
    VidqaError::VectorStore(format!("Failed to acquire lock: {}", e))
}

fn retrieval_lock_error<E: std::fmt::Display>(e: E) -> VidqaError {
    VidqaError::Retrieval(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    #[instrument(skip(self, docs), fields(count = docs.len()))]
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

        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.extend(
            docs.iter()
                .cloned()
                .zip(embeddings)
                .map(|(document, embedding)| IndexEntry { document, embedding }),
        );

        debug!("Stored {} documents ({} total)", docs.len(), entries.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if self.entries.read().map_err(retrieval_lock_error)?.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let entries = self.entries.read().map_err(retrieval_lock_error)?;
        let mut results: Vec<SearchResult> = entries
            .iter()
            .map(|entry| SearchResult {
                document: entry.document.clone(),
                score: cosine_similarity(&query_embedding, &entry.embedding),
            })
            .collect();

        rank_by_score(&mut results);
        results.truncate(k);

        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    async fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
