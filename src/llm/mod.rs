pub mod claude;
pub mod context;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    /// Total tokens billed for the call, when the provider reports usage.
    pub total_tokens: Option<u32>,
}

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub content: String,
    pub token_count: u32,
    pub model: String,
}

/// The generation model boundary.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Generation, LlmError>;
}

/// Unified LLM provider enum: dispatches to OpenAI-compatible or Claude backends.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(openai::OpenAiConfig),
    Claude(claude::ClaudeConfig),
}

impl Provider {
    pub fn ollama(host: &str) -> Self {
        Provider::OpenAi(openai::OpenAiConfig {
            api_key: String::new(),
            base_url: format!("{}/v1", host.trim_end_matches('/')),
        })
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self {
            Provider::OpenAi(config) => openai::chat(config, request).await,
            Provider::Claude(config) => claude::chat(config, request).await,
        }
    }
}

/// A provider bound to one model id.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    pub provider: Provider,
    pub model: String,
}

#[async_trait]
impl Generator for ProviderClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Generation, LlmError> {
        let request = ChatRequest {
            messages: messages.to_vec(),
            model: self.model.clone(),
            max_tokens,
            temperature,
        };
        let response = self.provider.chat(&request).await?;
        let token_count = response
            .total_tokens
            .unwrap_or_else(|| context::estimate_tokens(&response.content));
        Ok(Generation {
            content: response.content,
            token_count,
            model: response.model,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    /// The requested model has no usable provider configuration.
    #[error("{0}")]
    Config(String),
    #[error("reading provider settings: {0}")]
    Settings(#[from] crate::db::DbError),
}
