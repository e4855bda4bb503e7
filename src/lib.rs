//! vidqa - Question answering over a video transcript
//!
//! Ingests a single transcript, indexes it for semantic retrieval and answers
//! natural-language questions about it with a language model grounded in the
//! retrieved passages.
//!
//! # Overview
//!
//! vidqa allows you to:
//! - Split a transcript into overlapping passages
//! - Index the passages in memory or in a persistent Pinecone index
//! - Ask questions and get answers drawn from the transcript
//! - Search the transcript semantically
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `chunking` - Recursive character chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector store abstraction (memory, Pinecone)
//! - `rag` - Answer generation and the ingest/query pipeline
//! - `session` - The long-lived service shared by request handlers
//!
//! # Example
//!
//! ```rust,no_run
//! use vidqa::config::Settings;
//! use vidqa::session::Session;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let session = Session::new(settings)?;
//!
//!     let outcome = session.process("The cat sat. The dog ran.", Some("demo")).await?;
//!     println!("Indexed {} chunks", outcome.chunk_count);
//!
//!     println!("{}", session.ask("What did the dog do?").await?);
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod rag;
pub mod session;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{Result, VidqaError};
