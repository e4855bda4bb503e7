//! Network-free fakes shared by unit tests.

use crate::embedding::Embedder;
use crate::error::{Result, VidqaError};
use crate::rag::Generator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Deterministic embedder that maps each distinct word to its own dimension.
///
/// Texts sharing words score higher under cosine similarity, and identical
/// texts score exactly 1.0.
pub struct BagOfWordsEmbedder {
    dimensions: usize,
    vocabulary: Mutex<HashMap<String, usize>>,
}

impl BagOfWordsEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vocabulary: Mutex::new(HashMap::new()),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimensions];
        let mut vocabulary = self.vocabulary.lock().unwrap();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            let next = vocabulary.len();
            let slot = *vocabulary.entry(word).or_insert(next) % self.dimensions;
            vector[slot] += 1.0;
        }
        vector
    }
}

impl Default for BagOfWordsEmbedder {
    fn default() -> Self {
        Self::new(512)
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embedder that always fails, as a provider outage would.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(VidqaError::Embedding("provider unavailable".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(VidqaError::Embedding("provider unavailable".to_string()))
    }

    fn dimensions(&self) -> usize {
        8
    }
}

/// Generator that answers with the question and the context it was given.
pub struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, context: &str, question: &str) -> Result<String> {
        Ok(format!("Q: {question}\nContext: {context}"))
    }
}

/// Generator that always fails.
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _context: &str, _question: &str) -> Result<String> {
        Err(VidqaError::Generation("model unavailable".to_string()))
    }
}

/// Generator that signals when generation starts and waits for a release.
///
/// Answers with the context it was given.
#[derive(Clone, Default)]
pub struct GatedGenerator {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl Generator for GatedGenerator {
    async fn generate(&self, context: &str, _question: &str) -> Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(context.to_string())
    }
}
