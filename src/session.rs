//! The long-lived question-answering session.
//!
//! A session owns at most one active [`Pipeline`] plus metadata about the
//! last ingested corpus. It is created once at startup and shared with every
//! request handler through an `Arc<Session>`.
//!
//! Ingests are serialised. Each builds and fills a fresh pipeline outside the
//! state lock and swaps it in only on success, so a failed ingest leaves the
//! previous corpus answerable. Queries run against a snapshot of the pipeline
//! taken when they start.

use crate::config::Settings;
use crate::error::{Result, VidqaError};
use crate::rag::{IngestSource, Pipeline};
use crate::vector_store::SearchResult;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

/// Number of passages returned by [`Session::search`] when none is requested.
pub const DEFAULT_SEARCH_K: usize = 3;

/// Largest number of passages a single search may request.
pub const MAX_SEARCH_K: usize = 10;

/// Builds an empty pipeline for each ingest.
pub trait PipelineFactory: Send + Sync {
    fn build(&self) -> Result<Pipeline>;
}

impl<F> PipelineFactory for F
where
    F: Fn() -> Result<Pipeline> + Send + Sync,
{
    fn build(&self) -> Result<Pipeline> {
        self()
    }
}

/// Builds pipelines from the loaded settings.
pub struct SettingsPipelineFactory {
    settings: Settings,
}

impl SettingsPipelineFactory {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl PipelineFactory for SettingsPipelineFactory {
    fn build(&self) -> Result<Pipeline> {
        Pipeline::from_settings(&self.settings)
    }
}

/// Result of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub chunk_count: usize,
    /// Transcript length in characters.
    pub transcript_length: usize,
    pub corpus_id: String,
}

/// Snapshot of the session for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub ready: bool,
    pub corpus_id: Option<String>,
    pub transcript_available: bool,
}

#[derive(Default)]
struct SessionState {
    pipeline: Option<Arc<Pipeline>>,
    corpus_id: Option<String>,
    transcript: Option<String>,
}

pub struct Session {
    factory: Box<dyn PipelineFactory>,
    ingest_lock: Mutex<()>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Create a session that builds pipelines from `settings`.
    ///
    /// Fails fast when the settings lack a credential the selected backends need.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::with_factory(SettingsPipelineFactory::new(settings)))
    }

    pub fn with_factory(factory: impl PipelineFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            ingest_lock: Mutex::new(()),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Ingest a transcript, replacing the active corpus on success.
    ///
    /// `source` names the corpus; a random identifier is used when absent.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn process(&self, text: &str, source: Option<&str>) -> Result<ProcessOutcome> {
        let _guard = self.ingest_lock.lock().await;

        let corpus_id = source
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let pipeline = self.factory.build().map_err(VidqaError::ingestion)?;
        let chunk_count = match pipeline
            .ingest_as(IngestSource::Text(text.to_string()), Some(&corpus_id))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!("Ingest of {} failed, keeping previous corpus: {}", corpus_id, e);
                return Err(e);
            }
        };

        let outcome = ProcessOutcome {
            chunk_count,
            transcript_length: text.chars().count(),
            corpus_id: corpus_id.clone(),
        };

        let mut state = self.state.write().await;
        *state = SessionState {
            pipeline: Some(Arc::new(pipeline)),
            corpus_id: Some(corpus_id),
            transcript: Some(text.to_string()),
        };

        info!(
            "Corpus {} ready with {} chunks",
            outcome.corpus_id, outcome.chunk_count
        );
        Ok(outcome)
    }

    async fn pipeline(&self) -> Result<Arc<Pipeline>> {
        self.state
            .read()
            .await
            .pipeline
            .clone()
            .ok_or(VidqaError::NotReady)
    }

    /// Answer a question about the active corpus.
    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(VidqaError::InvalidInput("question cannot be empty".to_string()));
        }

        let pipeline = self.pipeline().await?;
        pipeline.query(question).await
    }

    /// Return up to `k` passages similar to `query` (default 3, at most 10).
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VidqaError::InvalidInput("query cannot be empty".to_string()));
        }

        let k = k.unwrap_or(DEFAULT_SEARCH_K);
        if !(1..=MAX_SEARCH_K).contains(&k) {
            return Err(VidqaError::InvalidInput(format!(
                "number of chunks must be between 1 and {}, got {}",
                MAX_SEARCH_K, k
            )));
        }

        let pipeline = self.pipeline().await?;
        pipeline.search_similar(query, Some(k)).await
    }

    /// The last successfully ingested transcript, if any.
    pub async fn transcript(&self) -> Option<String> {
        self.state.read().await.transcript.clone()
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.read().await;
        SessionStatus {
            ready: state.pipeline.as_ref().is_some_and(|p| p.is_ready()),
            corpus_id: state.corpus_id.clone(),
            transcript_available: state.transcript.is_some(),
        }
    }
}
