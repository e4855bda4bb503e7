//! Configuration module for vidqa.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts, FALLBACK_ANSWER};
pub use settings::{
    ChunkingSettings, Credentials, EmbeddingSettings, GeneralSettings, LlmSettings,
    PromptSettings, Settings, VectorStoreProvider, VectorStoreSettings, OPENAI_API_KEY_ENV,
    PINECONE_API_KEY_ENV,
};
