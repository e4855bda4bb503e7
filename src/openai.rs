//! OpenAI client configuration with sensible defaults.

use crate::error::{Result, VidqaError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for provider requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client for the given API key with the default timeout.
pub fn create_client(api_key: &str) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(
    api_key: &str,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| VidqaError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let config = OpenAIConfig::new().with_api_key(api_key);
    Ok(Client::with_config(config).with_http_client(http_client))
}
