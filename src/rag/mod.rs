//! RAG (Retrieval-Augmented Generation) for question answering over a transcript.

pub mod context;
mod generator;
mod pipeline;

pub use context::{format_context, format_sources_for_display};
pub use generator::{Generator, OpenAIGenerator};
pub use pipeline::{IngestSource, Pipeline, RagResponse};
