//! OpenAI embeddings implementation.

use super::Embedder;
use crate::error::{Result, VidqaError};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, Embedding, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Maximum number of inputs OpenAI accepts in a single embeddings request.
const MAX_INPUTS_PER_REQUEST: usize = 2048;

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder with a model and its output dimensions.
    pub fn new(api_key: &str, model: &str, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: create_client(api_key)?,
            model: model.to_string(),
            dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Only the text-embedding-3 family accepts a `dimensions` parameter.
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }
}

/// Order embeddings by their response index and check their shape.
fn collect_embeddings(
    mut data: Vec<Embedding>,
    expected_count: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected_count {
        return Err(VidqaError::Embedding(format!(
            "Provider returned {} embeddings for {} inputs",
            data.len(),
            expected_count
        )));
    }

    data.sort_by_key(|e| e.index);

    data.into_iter()
        .map(|e| {
            if e.embedding.len() == dimensions {
                Ok(e.embedding)
            } else {
                Err(VidqaError::Embedding(format!(
                    "Expected {} dimensions, provider returned {}",
                    dimensions,
                    e.embedding.len()
                )))
            }
        })
        .collect()
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| VidqaError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            let mut args = CreateEmbeddingRequestArgs::default();
            args.model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()));
            if self.supports_dimensions() {
                args.dimensions(self.dimensions as u32);
            }
            let request = args
                .build()
                .map_err(|e| VidqaError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| VidqaError::Embedding(format!("Embedding API error: {}", e)))?;

            all_embeddings.extend(collect_embeddings(response.data, chunk.len(), self.dimensions)?);
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(index: u32, values: Vec<f32>) -> Embedding {
        Embedding {
            index,
            object: "embedding".to_string(),
            embedding: values,
        }
    }

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::new("sk-test", "text-embedding-3-small", 1536).unwrap();
        assert_eq!(embedder.dimensions(), 1536);
        assert!(embedder.supports_dimensions());

        let embedder = OpenAIEmbedder::new("sk-test", "text-embedding-ada-002", 1536).unwrap();
        assert_eq!(embedder.model(), "text-embedding-ada-002");
        assert!(!embedder.supports_dimensions());
    }

    #[test]
    fn test_collect_embeddings_restores_input_order() {
        let data = vec![
            embedding(2, vec![0.0, 0.0, 1.0]),
            embedding(0, vec![1.0, 0.0, 0.0]),
            embedding(1, vec![0.0, 1.0, 0.0]),
        ];
        let vectors = collect_embeddings(data, 3, 3).unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0, 0.0]);
        assert_eq!(vectors[2], vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_collect_embeddings_rejects_malformed_output() {
        let wrong_count = vec![embedding(0, vec![1.0, 0.0])];
        assert!(matches!(
            collect_embeddings(wrong_count, 2, 2),
            Err(VidqaError::Embedding(_))
        ));

        let wrong_dims = vec![embedding(0, vec![1.0, 0.0, 0.0])];
        assert!(matches!(
            collect_embeddings(wrong_dims, 1, 2),
            Err(VidqaError::Embedding(_))
        ));
    }
}
