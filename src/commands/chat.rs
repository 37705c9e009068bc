use crate::db::models::{Conversation, ConversationSummary, Mode};
use crate::db::Database;
use crate::error::AppError;
use crate::llm::claude::ClaudeConfig;
use crate::llm::openai::OpenAiConfig;
use crate::llm::{ChatMessage, Generation, Generator, LlmError, Provider, ProviderClient};
use crate::service::Exchange;
use crate::AppState;
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Read a setting, falling back to the upper-cased environment variable.
fn setting(db: &Database, key: &str) -> Result<Option<String>, LlmError> {
    if let Some(value) = db.get_setting(key)? {
        return Ok(Some(value));
    }
    Ok(std::env::var(key.to_uppercase())
        .ok()
        .filter(|v| !v.is_empty()))
}

fn required(db: &Database, key: &str, label: &str) -> Result<String, LlmError> {
    setting(db, key)?.ok_or_else(|| LlmError::Config(format!("{} API key not configured", label)))
}

/// Resolve an LLM provider from a model string like "groq/llama-3.1-8b-instant",
/// "claude/...", "ollama/..." or a bare OpenAI model id.
pub(crate) fn resolve_provider(model: &str, db: &Database) -> Result<ProviderClient, LlmError> {
    let (provider, model_id) = if let Some(model_id) = model.strip_prefix("ollama/") {
        let host = setting(db, "ollama_host")?
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        (Provider::ollama(&host), model_id)
    } else if let Some(model_id) = model.strip_prefix("claude/") {
        let api_key = required(db, "claude_api_key", "Claude")?;
        let base_url = setting(db, "claude_base_url")?
            .unwrap_or_else(|| "https://api.anthropic.com".to_string());
        (
            Provider::Claude(ClaudeConfig { api_key, base_url }),
            model_id,
        )
    } else if let Some(model_id) = model.strip_prefix("groq/") {
        let api_key = required(db, "groq_api_key", "Groq")?;
        let base_url =
            setting(db, "groq_base_url")?.unwrap_or_else(|| GROQ_BASE_URL.to_string());
        (
            Provider::OpenAi(OpenAiConfig { api_key, base_url }),
            model_id,
        )
    } else {
        let model_id = model.strip_prefix("openai/").unwrap_or(model);
        let api_key = required(db, "openai_api_key", "OpenAI")?;
        let base_url = setting(db, "openai_base_url")?
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        (
            Provider::OpenAi(OpenAiConfig { api_key, base_url }),
            model_id,
        )
    };

    if model_id.is_empty() {
        return Err(LlmError::Config(format!("invalid model: {:?}", model)));
    }
    Ok(ProviderClient {
        provider,
        model: model_id.to_string(),
    })
}

/// The model a request asked for. The provider is resolved on the first
/// generation call, so lookups and mode checks in the service run first.
struct ModelRoute {
    model: String,
    db: Arc<Database>,
}

impl ModelRoute {
    fn new(state: &AppState, model: Option<String>) -> Self {
        Self {
            model: model.unwrap_or_else(|| state.default_model.clone()),
            db: state.db.clone(),
        }
    }
}

#[async_trait]
impl Generator for ModelRoute {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Generation, LlmError> {
        resolve_provider(&self.model, &self.db)?
            .generate(messages, max_tokens, temperature)
            .await
    }
}

fn default_mode() -> Mode {
    Mode::OpenChat
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    pub first_message: String,
    pub document_id: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMessageRequest {
    pub content: String,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationList {
    pub count: usize,
    pub conversations: Vec<ConversationSummary>,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<Json<Conversation>, AppError> {
    let route = ModelRoute::new(&state, req.model);
    let conversation = state
        .service
        .create_conversation(req.mode, &req.first_message, req.document_id, &route)
        .await?;
    Ok(Json(conversation))
}

pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<ConversationList>, AppError> {
    let conversations = state.service.list_conversations()?;
    Ok(Json(ConversationList {
        count: conversations.len(),
        conversations,
    }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(state.service.get_conversation(&id)?))
}

pub async fn add_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddMessageRequest>,
) -> Result<Json<Exchange>, AppError> {
    let route = ModelRoute::new(&state, req.model);
    let exchange = state.service.add_message(&id, &req.content, &route).await?;
    Ok(Json(exchange))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.service.delete_conversation(&id)?;
    Ok(Json(json!({ "message": "conversation deleted", "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_selects_provider() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("ollama_host", "http://gpu-box:11434/").unwrap();
        db.set_setting("claude_api_key", "sk-ant-test").unwrap();
        db.set_setting("groq_api_key", "gsk-test").unwrap();

        let ollama = resolve_provider("ollama/llama3", &db).unwrap();
        assert_eq!(ollama.model, "llama3");
        match ollama.provider {
            Provider::OpenAi(config) => assert_eq!(config.base_url, "http://gpu-box:11434/v1"),
            other => panic!("expected OpenAI-compatible provider, got {:?}", other),
        }

        let claude = resolve_provider("claude/claude-sonnet-4-20250514", &db).unwrap();
        assert!(matches!(claude.provider, Provider::Claude(_)));
        assert_eq!(claude.model, "claude-sonnet-4-20250514");

        let groq = resolve_provider("groq/llama-3.1-8b-instant", &db).unwrap();
        match groq.provider {
            Provider::OpenAi(config) => {
                assert_eq!(config.base_url, GROQ_BASE_URL);
                assert_eq!(config.api_key, "gsk-test");
            }
            other => panic!("expected OpenAI-compatible provider, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_override_defaults() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("openai_api_key", "sk-test").unwrap();
        db.set_setting("openai_base_url", "http://proxy/v1").unwrap();

        let client = resolve_provider("gpt-4o-mini", &db).unwrap();
        assert_eq!(client.model, "gpt-4o-mini");
        match client.provider {
            Provider::OpenAi(config) => assert_eq!(config.base_url, "http://proxy/v1"),
            other => panic!("expected OpenAI provider, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_model_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = resolve_provider("ollama/", &db).unwrap_err();
        assert!(matches!(err, LlmError::Config(_)));
    }
}
