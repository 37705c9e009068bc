use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Parameters of the retrieval and generation pipeline.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    pub top_k: usize,
    /// Messages of history sent with each open-chat turn.
    pub max_history: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub generation_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            top_k: 3,
            max_history: 10,
            max_tokens: 2048,
            temperature: 0.7,
            generation_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Api {
        base_url: String,
        api_key: String,
        model: String,
    },
    Local,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub bind_addr: String,
    pub default_model: String,
    pub embedding: EmbeddingBackend,
    pub rag: RagConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl AppConfig {
    /// Read configuration from the environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = RagConfig::default();

        let data_dir = PathBuf::from(lookup("BOTGPT_DATA_DIR").unwrap_or_else(|| "./data".into()));
        let log_dir = lookup("BOTGPT_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("logs"));

        let chunk_size = parse_or(&lookup, "CHUNK_SIZE", defaults.chunk_size)?;
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_SIZE",
                value: "0".into(),
            });
        }

        let embedding = match lookup("EMBEDDING_BACKEND").as_deref() {
            None | Some("api") => EmbeddingBackend::Api {
                base_url: lookup("EMBEDDING_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:11434/v1".into()),
                api_key: lookup("EMBEDDING_API_KEY").unwrap_or_default(),
                model: lookup("EMBEDDING_MODEL").unwrap_or_else(|| "all-minilm".into()),
            },
            Some("local") => EmbeddingBackend::Local,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "EMBEDDING_BACKEND",
                    value: other.into(),
                })
            }
        };

        Ok(Self {
            data_dir,
            log_dir,
            bind_addr: lookup("BOTGPT_BIND").unwrap_or_else(|| "0.0.0.0:8000".into()),
            default_model: lookup("DEFAULT_MODEL")
                .unwrap_or_else(|| "groq/llama-3.1-8b-instant".into()),
            embedding,
            rag: RagConfig {
                chunk_size,
                top_k: parse_or(&lookup, "TOP_K", defaults.top_k)?,
                max_history: parse_or(&lookup, "MAX_HISTORY", defaults.max_history)?,
                max_tokens: parse_or(&lookup, "MAX_TOKENS", defaults.max_tokens)?,
                temperature: parse_or(&lookup, "TEMPERATURE", defaults.temperature)?,
                generation_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "GENERATION_TIMEOUT_SECS",
                    defaults.generation_timeout.as_secs(),
                )?),
            },
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
