//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for ingesting a transcript, asking questions about
//! it and searching its passages. Every handler shares one [`Session`].

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::VidqaError;
use crate::session::{Session, DEFAULT_SEARCH_K, MAX_SEARCH_K};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings, None) {
        Output::error(&format!("{}", e));
        Output::info("Run 'vidqa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let backend = settings.vector_store.provider;
    let session = Arc::new(Session::new(settings)?);
    let app = router(session);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("vidqa API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Vector store", &backend.to_string());
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Process", "POST /process");
    Output::kv("Chat (RAG)", "POST /chat");
    Output::kv("Search", "POST /search");
    Output::kv("Transcript", "GET  /transcription");
    Output::kv("Status", "GET  /status");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router around a shared session.
pub fn router(session: Arc<Session>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/process", post(process))
        .route("/chat", post(chat))
        .route("/search", post(search))
        .route("/transcription", get(transcription))
        .route("/status", get(status))
        .layer(cors)
        .with_state(session)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ProcessRequest {
    /// Transcript text
    text: String,
    /// Optional corpus identifier
    #[serde(default)]
    source: Option<String>,
}

#[derive(Serialize)]
struct ProcessResponse {
    success: bool,
    message: String,
    source: String,
    transcript_length: usize,
    chunks_created: usize,
}

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_num_chunks")]
    num_chunks: usize,
}

fn default_num_chunks() -> usize {
    DEFAULT_SEARCH_K
}

#[derive(Serialize)]
struct SearchResponse {
    chunks: Vec<ChunkData>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ChunkData {
    content: String,
    metadata: Map<String, Value>,
    score: f32,
}

#[derive(Serialize)]
struct TranscriptionResponse {
    transcription: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    initialized: bool,
    source: Option<String>,
    transcription_available: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

fn error_response(status: StatusCode, err: &VidqaError) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: err.to_string(),
            code: err.code(),
        }),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        &VidqaError::InvalidInput(message.to_string()),
    )
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn process(State(session): State<Arc<Session>>, Json(req): Json<ProcessRequest>) -> Response {
    if req.text.trim().is_empty() {
        return bad_request("text is required");
    }

    match session.process(&req.text, req.source.as_deref()).await {
        Ok(outcome) => Json(ProcessResponse {
            success: true,
            message: "Transcript processed successfully".to_string(),
            source: outcome.corpus_id,
            transcript_length: outcome.transcript_length,
            chunks_created: outcome.chunk_count,
        })
        .into_response(),
        Err(e) => {
            warn!("Processing failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

async fn chat(State(session): State<Arc<Session>>, Json(req): Json<ChatRequest>) -> Response {
    if req.question.trim().is_empty() {
        return bad_request("question cannot be empty");
    }

    match session.ask(&req.question).await {
        Ok(answer) => Json(ChatResponse {
            answer,
            success: true,
            error: None,
        })
        .into_response(),
        Err(e) => Json(ChatResponse {
            answer: String::new(),
            success: false,
            error: Some(e.to_string()),
        })
        .into_response(),
    }
}

async fn search(State(session): State<Arc<Session>>, Json(req): Json<SearchRequest>) -> Response {
    if req.query.trim().is_empty() {
        return bad_request("query cannot be empty");
    }
    if !(1..=MAX_SEARCH_K).contains(&req.num_chunks) {
        return bad_request(&format!("num_chunks must be between 1 and {}", MAX_SEARCH_K));
    }

    match session.search(&req.query, Some(req.num_chunks)).await {
        Ok(results) => Json(SearchResponse {
            chunks: results
                .into_iter()
                .map(|r| ChunkData {
                    content: r.document.content,
                    metadata: r.document.metadata,
                    score: r.score,
                })
                .collect(),
            success: true,
            error: None,
        })
        .into_response(),
        Err(e) => Json(SearchResponse {
            chunks: Vec::new(),
            success: false,
            error: Some(e.to_string()),
        })
        .into_response(),
    }
}

async fn transcription(State(session): State<Arc<Session>>) -> Response {
    let response = match session.transcript().await {
        Some(transcription) => TranscriptionResponse {
            transcription,
            success: true,
            error: None,
        },
        None => TranscriptionResponse {
            transcription: String::new(),
            success: false,
            error: Some("No transcription available.".to_string()),
        },
    };
    Json(response).into_response()
}

async fn status(State(session): State<Arc<Session>>) -> Response {
    let status = session.status().await;
    Json(StatusResponse {
        initialized: status.ready,
        source: status.corpus_id,
        transcription_available: status.transcript_available,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::RecursiveChunker;
    use crate::rag::Pipeline;
    use crate::testing::{BagOfWordsEmbedder, EchoGenerator};
    use crate::vector_store::MemoryVectorStore;

    fn session() -> Arc<Session> {
        Arc::new(Session::with_factory(|| {
            Ok(Pipeline::new(
                RecursiveChunker::new(20, 5)?,
                Arc::new(MemoryVectorStore::new(Arc::new(BagOfWordsEmbedder::default()))),
                Arc::new(EchoGenerator),
                4,
            ))
        }))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn ingest(session: &Arc<Session>) {
        let response = process(
            State(session.clone()),
            Json(ProcessRequest {
                text: "The cat sat. The dog ran. Neural networks learn patterns.".to_string(),
                source: Some("lecture".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_process_and_status() {
        let session = session();

        let before = body_json(status(State(session.clone())).await).await;
        assert_eq!(before["initialized"], false);
        assert_eq!(before["transcription_available"], false);

        let response = process(
            State(session.clone()),
            Json(ProcessRequest {
                text: "hello world".to_string(),
                source: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["transcript_length"], 11);
        assert_eq!(body["chunks_created"], 1);

        let after = body_json(status(State(session.clone())).await).await;
        assert_eq!(after["initialized"], true);
        assert_eq!(after["transcription_available"], true);
        assert_eq!(after["source"], body["source"]);
    }

    #[tokio::test]
    async fn test_process_rejects_empty_text() {
        let response = process(
            State(session()),
            Json(ProcessRequest {
                text: "  ".to_string(),
                source: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn test_chat_before_ingest_is_flagged() {
        let response = chat(
            State(session()),
            Json(ChatRequest {
                question: "What is this about?".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("No document"));
    }

    #[tokio::test]
    async fn test_chat_after_ingest() {
        let session = session();
        ingest(&session).await;

        let body = body_json(
            chat(
                State(session),
                Json(ChatRequest {
                    question: "What do neural networks learn?".to_string(),
                }),
            )
            .await,
        )
        .await;
        assert_eq!(body["success"], true);
        assert!(!body["answer"].as_str().unwrap().is_empty());
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_search_validation_and_results() {
        let session = session();
        ingest(&session).await;

        let response = search(
            State(session.clone()),
            Json(SearchRequest {
                query: "neural networks".to_string(),
                num_chunks: 11,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = search(
            State(session.clone()),
            Json(SearchRequest {
                query: "neural networks".to_string(),
                num_chunks: 2,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let chunks = body["chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0]["content"].as_str().unwrap().contains("Neural networks"));
        assert_eq!(chunks[0]["metadata"]["source"], "lecture");
    }

    #[tokio::test]
    async fn test_transcription_flagged_when_missing() {
        let session = session();
        let body = body_json(transcription(State(session.clone())).await).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["transcription"], "");

        ingest(&session).await;
        let body = body_json(transcription(State(session)).await).await;
        assert_eq!(body["success"], true);
        assert!(body["transcription"].as_str().unwrap().starts_with("The cat sat."));
    }

    #[tokio::test]
    async fn test_search_request_defaults() {
        let req: SearchRequest = serde_json::from_str(r#"{"query": "cats"}"#).unwrap();
        assert_eq!(req.num_chunks, DEFAULT_SEARCH_K);
    }
}
