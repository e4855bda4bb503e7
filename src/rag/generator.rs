//! Answer generation from retrieved context.

use crate::config::{LlmSettings, Prompts};
use crate::error::{Result, VidqaError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Produces an answer to a question given retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, context: &str, question: &str) -> Result<String>;
}

/// Chat-completion generator backed by OpenAI.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    prompts: Prompts,
}

impl OpenAIGenerator {
    pub fn new(api_key: &str, llm: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(api_key)?,
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            prompts: Prompts::default(),
        })
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, context), fields(model = %self.model, context_len = context.len()))]
    async fn generate(&self, context: &str, question: &str) -> Result<String> {
        let prompt = self.prompts.render_rag(context, question);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| VidqaError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .build()
            .map_err(|e| VidqaError::Generation(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            VidqaError::Generation(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| VidqaError::Generation("Empty response from LLM".to_string()))?;

        debug!("Generated answer of {} characters", answer.len());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_uses_llm_settings() {
        let llm = LlmSettings {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 256,
        };
        let generator = OpenAIGenerator::new("sk-test", &llm).unwrap();
        assert_eq!(generator.model(), "gpt-4o-mini");
        assert_eq!(generator.max_tokens, 256);
        assert!((generator.temperature - 0.2).abs() < f32::EPSILON);
    }
}
