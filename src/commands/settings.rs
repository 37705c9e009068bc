use crate::error::AppError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

const SETTING_KEYS: &[&str] = &[
    "openai_api_key",
    "openai_base_url",
    "groq_api_key",
    "groq_base_url",
    "claude_api_key",
    "claude_base_url",
    "ollama_host",
];

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: String,
}

fn known_key(key: &str) -> Result<(), AppError> {
    if SETTING_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Unknown setting key: {}", key)))
    }
}

/// Keep the first and last four characters of API keys longer than eight.
fn mask(key: &str, value: String) -> String {
    let chars: Vec<char> = value.chars().collect();
    if key.ends_with("_api_key") && chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        value
    }
}

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, String>>, AppError> {
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = state.db.get_setting(key)? {
            map.insert(key.to_string(), mask(key, value));
        }
    }
    Ok(Json(map))
}

pub async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetSettingRequest>,
) -> Result<Json<Value>, AppError> {
    known_key(&key)?;
    state.db.set_setting(&key, req.value.trim())?;
    info!(key = %key, "setting updated");
    Ok(Json(json!({ "key": key })))
}

pub async fn delete_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, AppError> {
    known_key(&key)?;
    if !state.db.delete_setting(&key)? {
        return Err(AppError::not_found("setting", key));
    }
    Ok(Json(json!({ "message": "setting deleted", "key": key })))
}
