use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    OpenChat,
    Rag,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::OpenChat => "open_chat",
            Mode::Rag => "rag",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open_chat" => Ok(Mode::OpenChat),
            "rag" => Ok(Mode::Rag),
            other => Err(format!("unknown conversation mode: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown message role: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing)]
    pub embedding: Vec<f32>,
    pub chunk_index: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub chunks: Vec<Chunk>,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            file_type: self.file_type.clone(),
            file_size: self.file_size,
            total_chunks: self.total_chunks(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Document metadata without chunk bodies or vectors.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub total_chunks: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieved_chunks: Vec<String>,
}

impl Message {
    pub fn user(content: impl Into<String>, tokens: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            tokens,
            model: None,
            retrieved_chunks: Vec::new(),
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        tokens: u32,
        model: impl Into<String>,
        retrieved_chunks: Vec<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            tokens,
            model: Some(model.into()),
            retrieved_chunks,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Conversation {
    pub id: String,
    pub mode: Mode,
    pub document_id: Option<String>,
    pub messages: Vec<Message>,
    pub total_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// A fresh conversation whose running total already covers `messages`.
    pub fn new(mode: Mode, document_id: Option<String>, messages: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mode,
            document_id,
            total_tokens: messages.iter().map(|m| u64::from(m.tokens)).sum(),
            messages,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConversationSummary {
    pub id: String,
    pub mode: Mode,
    pub message_count: usize,
    pub total_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub preview: String,
    pub document_name: Option<String>,
}
