//! Deterministic stand-ins for the embedding model and the generation API.

use crate::llm::{ChatMessage, Generation, Generator, LlmError};
use crate::rag::{Embedder, RagError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

/// Bag-of-words vectors: each lowercase word is hashed (FNV-1a) into one of
/// [`KeywordEmbedder::DIMENSION`] buckets.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub const DIMENSION: usize = 64;

    pub fn new() -> Self {
        KeywordEmbedder
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; Self::DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
                });
            vector[(hash % Self::DIMENSION as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn model_id(&self) -> &str {
        "keyword-test"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

/// Always answers with the same text and records what it was sent.
pub struct ScriptedGenerator {
    reply: String,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<Generation, LlmError> {
        self.requests.lock().push(messages.to_vec());
        Ok(Generation {
            content: self.reply.clone(),
            token_count: 7,
            model: "scripted-model".into(),
        })
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<Generation, LlmError> {
        Err(LlmError::Api {
            status: 503,
            message: "upstream unavailable".into(),
        })
    }
}

/// Sleeps before answering, for timeout paths.
pub struct SlowGenerator(pub Duration);

#[async_trait]
impl Generator for SlowGenerator {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<Generation, LlmError> {
        tokio::time::sleep(self.0).await;
        Ok(Generation {
            content: "too late".into(),
            token_count: 2,
            model: "slow-model".into(),
        })
    }
}
