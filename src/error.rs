//! Error types for vidqa.

use thiserror::Error;

/// Library-level error type for vidqa operations.
#[derive(Error, Debug)]
pub enum VidqaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingestion failed: {0}")]
    Ingestion(#[source] Box<VidqaError>),

    #[error("No document has been ingested yet. Process a transcript first.")]
    NotReady,

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl VidqaError {
    /// Wrap any failure that happened while ingesting a document.
    ///
    /// Errors that are already ingestion errors are passed through unchanged.
    pub fn ingestion(err: VidqaError) -> Self {
        match err {
            e @ VidqaError::Ingestion(_) => e,
            e => VidqaError::Ingestion(Box::new(e)),
        }
    }

    /// Stable machine-readable code for structured error responses.
    pub fn code(&self) -> &'static str {
        match self {
            VidqaError::Config(_) => "config_error",
            VidqaError::Ingestion(_) => "ingestion_error",
            VidqaError::NotReady => "not_ready",
            VidqaError::Embedding(_) => "embedding_error",
            VidqaError::Generation(_) => "generation_error",
            VidqaError::Retrieval(_) => "retrieval_error",
            VidqaError::VectorStore(_) => "vector_store_error",
            VidqaError::InvalidInput(_) => "invalid_input",
            VidqaError::Io(_) => "io_error",
            VidqaError::Json(_) => "json_error",
            VidqaError::TomlParse(_) => "config_error",
            VidqaError::Http(_) => "http_error",
        }
    }

    /// Whether the caller can fix this by changing the request.
    pub fn is_user_error(&self) -> bool {
        matches!(self, VidqaError::NotReady | VidqaError::InvalidInput(_))
    }
}

/// Result type alias for vidqa operations.
pub type Result<T> = std::result::Result<T, VidqaError>;
