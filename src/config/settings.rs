//! Configuration settings for vidqa.

use crate::error::{Result, VidqaError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable holding the Pinecone API key.
pub const PINECONE_API_KEY_ENV: &str = "PINECONE_API_KEY";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub vector_store: VectorStoreSettings,
    pub prompts: PromptSettings,
    /// Provider credentials. Only ever read from the environment.
    #[serde(skip)]
    pub credentials: Credentials,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level used when no -v flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Language model settings for answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat model used to answer questions.
    pub model: String,
    /// Sampling temperature (0 = most deterministic).
    pub temperature: f32,
    /// Maximum number of tokens in a generated answer.
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: 1000,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Text chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 20,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// Ephemeral in-process store, lost on restart.
    #[default]
    Memory,
    /// Persistent remote Pinecone index.
    Pinecone,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in_memory" | "ephemeral" => Ok(VectorStoreProvider::Memory),
            "pinecone" | "persistent" => Ok(VectorStoreProvider::Pinecone),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Memory => write!(f, "memory"),
            VectorStoreProvider::Pinecone => write!(f, "pinecone"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (memory, pinecone).
    pub provider: VectorStoreProvider,
    /// Pinecone index name.
    pub index_name: Option<String>,
    /// Pinecone namespace (default namespace when unset).
    pub namespace: Option<String>,
    /// Cloud used when the Pinecone index has to be created.
    pub cloud: String,
    /// Region used when the Pinecone index has to be created.
    pub region: String,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Memory,
            index_name: Some("vidqa-index".to_string()),
            namespace: None,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            top_k: 4,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

/// API keys for the configured providers.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub pinecone_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("pinecone_api_key", &mask(&self.pinecone_api_key))
            .finish()
    }
}

impl Settings {
    /// Load settings from the default configuration file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None,
    /// then apply environment overrides.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(OPENAI_API_KEY_ENV) {
            self.credentials.openai_api_key = Some(key);
        }
        if let Some(key) = get(PINECONE_API_KEY_ENV) {
            self.credentials.pinecone_api_key = Some(key);
        }
        if let Some(model) = get("VIDQA_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = get("VIDQA_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(v) = get("VIDQA_TEMPERATURE") {
            self.llm.temperature = parse_env("VIDQA_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("VIDQA_MAX_TOKENS") {
            self.llm.max_tokens = parse_env("VIDQA_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("VIDQA_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_env("VIDQA_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("VIDQA_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_env("VIDQA_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("VIDQA_VECTOR_STORE") {
            self.vector_store.provider = v.parse().map_err(VidqaError::Config)?;
        }
        if let Some(name) = get("VIDQA_INDEX_NAME") {
            self.vector_store.index_name = Some(name);
        }
        if let Some(v) = get("VIDQA_TOP_K") {
            self.vector_store.top_k = parse_env("VIDQA_TOP_K", &v)?;
        }

        Ok(())
    }

    /// Check that the settings are usable for the selected backends.
    pub fn validate(&self) -> Result<()> {
        if self.credentials.openai_api_key.is_none() {
            return Err(VidqaError::Config(format!(
                "{} not set. Set it with: export {}='sk-...'",
                OPENAI_API_KEY_ENV, OPENAI_API_KEY_ENV
            )));
        }

        if self.vector_store.provider == VectorStoreProvider::Pinecone {
            if self.credentials.pinecone_api_key.is_none() {
                return Err(VidqaError::Config(format!(
                    "{} required for the pinecone vector store",
                    PINECONE_API_KEY_ENV
                )));
            }
            if self.index_name().is_none() {
                return Err(VidqaError::Config(
                    "vector_store.index_name required for the pinecone vector store".to_string(),
                ));
            }
        }

        if self.chunking.chunk_size == 0 {
            return Err(VidqaError::Config("chunking.chunk_size must be greater than 0".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(VidqaError::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.vector_store.top_k == 0 {
            return Err(VidqaError::Config("vector_store.top_k must be greater than 0".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(VidqaError::Config(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }

        Ok(())
    }

    /// The configured Pinecone index name, ignoring blank values.
    pub fn index_name(&self) -> Option<&str> {
        self.vector_store
            .index_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| VidqaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidqa")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| VidqaError::Config(format!("Invalid value for {}: {} ({})", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_env(vars: &[(&str, &str)]) -> Result<Settings> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut settings = Settings::default();
        settings.apply_overrides(|key| env.get(key).cloned())?;
        Ok(settings)
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 20);
        assert_eq!(settings.vector_store.top_k, 4);
        assert_eq!(settings.vector_store.provider, VectorStoreProvider::Memory);
        assert_eq!(settings.llm.temperature, 0.0);
    }

    #[test]
    fn test_env_overrides() {
        let settings = with_env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("VIDQA_LLM_MODEL", "gpt-4o-mini"),
            ("VIDQA_CHUNK_SIZE", "500"),
            ("VIDQA_CHUNK_OVERLAP", "50"),
            ("VIDQA_TOP_K", "6"),
            ("VIDQA_VECTOR_STORE", "in_memory"),
            ("VIDQA_TEMPERATURE", "0.3"),
        ])
        .unwrap();

        assert_eq!(settings.credentials.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.chunking.chunk_size, 500);
        assert_eq!(settings.chunking.chunk_overlap, 50);
        assert_eq!(settings.vector_store.top_k, 6);
        assert!((settings.llm.temperature - 0.3).abs() < f32::EPSILON);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_numeric_env_is_config_error() {
        let err = with_env(&[("VIDQA_CHUNK_SIZE", "big")]).unwrap_err();
        assert!(matches!(err, VidqaError::Config(_)));
    }

    #[test]
    fn test_validate_requires_openai_key() {
        let err = Settings::default().validate().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_validate_pinecone_requirements() {
        let settings = with_env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("VIDQA_VECTOR_STORE", "pinecone"),
        ])
        .unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("PINECONE_API_KEY"));

        let mut settings = with_env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("PINECONE_API_KEY", "pc-test"),
            ("VIDQA_VECTOR_STORE", "pinecone"),
        ])
        .unwrap();
        assert!(settings.validate().is_ok());

        settings.vector_store.index_name = Some("  ".to_string());
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("index_name"));
    }

    #[test]
    fn test_validate_chunking() {
        let mut settings = with_env(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        settings.chunking.chunk_overlap = settings.chunking.chunk_size;
        assert!(matches!(settings.validate(), Err(VidqaError::Config(_))));
    }

    #[test]
    fn test_load_from_file_and_secrets_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[chunking]\nchunk_size = 300\n\n[vector_store]\nprovider = \"pinecone\"\nindex_name = \"talks\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.chunking.chunk_size, 300);
        assert_eq!(settings.chunking.chunk_overlap, 20);
        assert_eq!(settings.vector_store.provider, VectorStoreProvider::Pinecone);
        assert_eq!(settings.index_name(), Some("talks"));

        let mut with_key = settings.clone();
        with_key.credentials.openai_api_key = Some("sk-secret".to_string());
        let out = dir.path().join("saved.toml");
        with_key.save_to(&out).unwrap();
        let saved = std::fs::read_to_string(&out).unwrap();
        assert!(!saved.contains("sk-secret"));
    }
}
