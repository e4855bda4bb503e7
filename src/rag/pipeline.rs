//! The ingest and query pipeline over one corpus.
//!
//! Ingest: read, chunk, embed and index. Query: retrieve the top passages,
//! format them as context, then generate an answer.

use super::context::format_context;
use super::generator::{Generator, OpenAIGenerator};
use crate::chunking::RecursiveChunker;
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, VidqaError};
use crate::vector_store::{create_vector_store, SearchResult, VectorStore};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument};

/// Where the text to ingest comes from.
#[derive(Debug, Clone)]
pub enum IngestSource {
    /// Raw transcript text.
    Text(String),
    /// A UTF-8 text file holding the transcript.
    File(PathBuf),
}

impl IngestSource {
    async fn read(&self) -> Result<String> {
        match self {
            IngestSource::Text(text) => Ok(text.clone()),
            IngestSource::File(path) => Ok(tokio::fs::read_to_string(path).await?),
        }
    }

    /// Default source label recorded in chunk metadata.
    fn label(&self) -> Option<String> {
        match self {
            IngestSource::Text(_) => None,
            IngestSource::File(path) => Some(path.display().to_string()),
        }
    }
}

/// A generated answer with the passages it was grounded on, best first.
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Uninitialized,
    Ready { chunks_indexed: usize },
}

/// Chunker, vector store and generator wired together for one corpus.
pub struct Pipeline {
    chunker: RecursiveChunker,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    top_k: usize,
    state: RwLock<PipelineState>,
}

impl Pipeline {
    pub fn new(
        chunker: RecursiveChunker,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        top_k: usize,
    ) -> Self {
        Self {
            chunker,
            store,
            generator,
            top_k,
            state: RwLock::new(PipelineState::Uninitialized),
        }
    }

    /// Build a pipeline with the providers and backend selected in the settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.credentials.openai_api_key.as_deref().ok_or_else(|| {
            VidqaError::Config("OPENAI_API_KEY required to build the pipeline".to_string())
        })?;

        let chunker = RecursiveChunker::new(
            settings.chunking.chunk_size,
            settings.chunking.chunk_overlap,
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(
            api_key,
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);
        let store = create_vector_store(settings, embedder)?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let generator = Arc::new(OpenAIGenerator::new(api_key, &settings.llm)?.with_prompts(prompts));

        Ok(Self::new(chunker, store, generator, settings.vector_store.top_k))
    }

    fn state(&self) -> PipelineState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), PipelineState::Ready { .. })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Total chunks indexed by this pipeline, zero before the first ingest.
    pub fn chunks_indexed(&self) -> usize {
        match self.state() {
            PipelineState::Uninitialized => 0,
            PipelineState::Ready { chunks_indexed } => chunks_indexed,
        }
    }

    /// Name of the vector store backend.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Ingest a document, returning the number of chunks indexed.
    pub async fn ingest(&self, source: IngestSource) -> Result<usize> {
        let label = source.label();
        self.ingest_as(source, label.as_deref()).await
    }

    /// Ingest a document, recording `label` as the `source` of every chunk.
    ///
    /// On failure the pipeline keeps its previous state.
    #[instrument(skip(self, source))]
    pub async fn ingest_as(&self, source: IngestSource, label: Option<&str>) -> Result<usize> {
        let added = self
            .index_source(&source, label)
            .await
            .map_err(VidqaError::ingestion)?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let total = match *state {
            PipelineState::Uninitialized => added,
            PipelineState::Ready { chunks_indexed } => chunks_indexed + added,
        };
        *state = PipelineState::Ready { chunks_indexed: total };

        info!("Indexed {} chunks ({} total) in {} store", added, total, self.store.backend());
        Ok(added)
    }

    async fn index_source(&self, source: &IngestSource, label: Option<&str>) -> Result<usize> {
        let text = source.read().await?;
        if text.trim().is_empty() {
            return Err(VidqaError::InvalidInput("transcript is empty".to_string()));
        }

        let docs = self.chunker.split(&text, label);
        if docs.is_empty() {
            return Err(VidqaError::InvalidInput("transcript produced no chunks".to_string()));
        }

        self.store.add(&docs).await
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(VidqaError::NotReady)
        }
    }

    /// Answer a question from the ingested corpus.
    pub async fn query(&self, question: &str) -> Result<String> {
        Ok(self.query_with_sources(question).await?.answer)
    }

    /// Answer a question and return the passages the answer was generated from.
    #[instrument(skip(self))]
    pub async fn query_with_sources(&self, question: &str) -> Result<RagResponse> {
        self.ensure_ready()?;

        let sources = self.retrieve(question, self.top_k).await?;
        let context = format_context(&sources);
        debug!("Answering from {} passages", sources.len());

        let answer = self.generator.generate(&context, question).await?;
        Ok(RagResponse { answer, sources })
    }

    /// Return the passages most similar to `query` without generating an answer.
    ///
    /// `None` or `Some(0)` falls back to the configured top-k.
    #[instrument(skip(self))]
    pub async fn search_similar(&self, query: &str, k: Option<usize>) -> Result<Vec<SearchResult>> {
        self.ensure_ready()?;

        let k = k.filter(|&k| k > 0).unwrap_or(self.top_k);
        self.retrieve(query, k).await
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.store.search(query, k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BagOfWordsEmbedder, EchoGenerator, FailingEmbedder, FailingGenerator};
    use crate::vector_store::MemoryVectorStore;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    const SCENARIO: &str = "The cat sat. The dog ran. Neural networks learn patterns.";

    fn pipeline_with(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Pipeline {
        Pipeline::new(
            RecursiveChunker::new(20, 5).unwrap(),
            Arc::new(MemoryVectorStore::new(embedder)),
            generator,
            2,
        )
    }

    fn pipeline() -> Pipeline {
        pipeline_with(Arc::new(BagOfWordsEmbedder::default()), Arc::new(EchoGenerator))
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let pipeline = pipeline();
        let chunks = assert_ok!(pipeline.ingest(IngestSource::Text(SCENARIO.to_string())).await);
        assert!(chunks >= 3);
        assert!(pipeline.is_ready());
        assert_eq!(pipeline.chunks_indexed(), chunks);

        let results = pipeline.search_similar("neural networks", Some(1)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].document.content.contains("Neural networks"));

        let answer = pipeline.query("What do neural networks learn?").await.unwrap();
        assert!(!answer.is_empty());
        assert!(answer.contains("Neural networks"));
    }

    #[tokio::test]
    async fn test_query_with_sources_returns_prompt_passages() {
        let pipeline = pipeline();
        pipeline.ingest(IngestSource::Text(SCENARIO.to_string())).await.unwrap();

        let response = pipeline.query_with_sources("neural networks").await.unwrap();
        assert_eq!(response.sources.len(), pipeline.top_k());
        assert!(response.sources[0].document.content.contains("Neural networks"));
        assert!(response.answer.contains(&format_context(&response.sources)));
    }

    #[tokio::test]
    async fn test_not_ready_before_ingest() {
        let pipeline = pipeline();
        assert!(!pipeline.is_ready());
        assert_eq!(pipeline.chunks_indexed(), 0);

        let err = assert_err!(pipeline.query("anything?").await);
        assert!(matches!(err, VidqaError::NotReady));

        let err = assert_err!(pipeline.search_similar("anything", Some(3)).await);
        assert!(matches!(err, VidqaError::NotReady));
    }

    #[tokio::test]
    async fn test_default_k_falls_back_to_top_k() {
        let pipeline = pipeline();
        pipeline.ingest(IngestSource::Text(SCENARIO.to_string())).await.unwrap();

        assert_eq!(pipeline.search_similar("the cat", None).await.unwrap().len(), 2);
        assert_eq!(pipeline.search_similar("the cat", Some(0)).await.unwrap().len(), 2);
        assert_eq!(pipeline.search_similar("the cat", Some(3)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_chunk_metadata_records_source() {
        let pipeline = pipeline();
        pipeline
            .ingest_as(IngestSource::Text(SCENARIO.to_string()), Some("lecture-1"))
            .await
            .unwrap();

        let results = pipeline.search_similar("dog", Some(1)).await.unwrap();
        let metadata = &results[0].document.metadata;
        assert_eq!(metadata["source"], "lecture-1");
        assert!(metadata.contains_key("chunk_index"));
    }

    #[tokio::test]
    async fn test_ingest_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", SCENARIO).unwrap();

        let pipeline = pipeline();
        let chunks = pipeline.ingest(IngestSource::File(file.path().to_path_buf())).await.unwrap();
        assert!(chunks >= 3);

        let results = pipeline.search_similar("dog", Some(1)).await.unwrap();
        assert_eq!(
            results[0].document.metadata["source"],
            file.path().display().to_string()
        );
    }

    #[tokio::test]
    async fn test_failed_ingest_keeps_state() {
        let pipeline = pipeline_with(Arc::new(FailingEmbedder), Arc::new(EchoGenerator));
        let err = assert_err!(pipeline.ingest(IngestSource::Text(SCENARIO.to_string())).await);
        match err {
            VidqaError::Ingestion(inner) => assert!(matches!(*inner, VidqaError::Embedding(_))),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!pipeline.is_ready());
    }

    #[tokio::test]
    async fn test_empty_and_missing_input_are_ingestion_errors() {
        let pipeline = pipeline();

        let err = assert_err!(pipeline.ingest(IngestSource::Text("   \n".to_string())).await);
        assert_eq!(err.code(), "ingestion_error");

        let missing = IngestSource::File(PathBuf::from("/nonexistent/transcript.txt"));
        let err = assert_err!(pipeline.ingest(missing).await);
        match err {
            VidqaError::Ingestion(inner) => assert!(matches!(*inner, VidqaError::Io(_))),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!pipeline.is_ready());
    }

    #[tokio::test]
    async fn test_generation_failure_surfaces() {
        let pipeline = pipeline_with(Arc::new(BagOfWordsEmbedder::default()), Arc::new(FailingGenerator));
        pipeline.ingest(IngestSource::Text(SCENARIO.to_string())).await.unwrap();

        let err = assert_err!(pipeline.query("What did the cat do?").await);
        assert!(matches!(err, VidqaError::Generation(_)));
    }

    #[tokio::test]
    async fn test_second_ingest_accumulates() {
        let pipeline = pipeline();
        let first = pipeline.ingest(IngestSource::Text(SCENARIO.to_string())).await.unwrap();
        let second = pipeline.ingest(IngestSource::Text("More text here.".to_string())).await.unwrap();
        assert_eq!(pipeline.chunks_indexed(), first + second);
    }
}
