//! Storage seams used by the chat service. [`super::Database`] implements
//! both over SQLite.

use super::models::{Conversation, ConversationSummary, Document, DocumentSummary, Message, Mode};
use super::DbError;

/// A document as produced by the upload pipeline, before ids are assigned.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub chunks: Vec<NewChunk>,
}

#[derive(Debug, Clone)]
pub struct NewChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

pub trait DocumentStore: Send + Sync {
    /// Persist the document and all of its chunks, assigning ids and
    /// positions in the order given.
    fn save_document(&self, document: NewDocument) -> Result<Document, DbError>;

    fn get_document(&self, id: &str) -> Result<Option<Document>, DbError>;

    fn list_documents(&self) -> Result<Vec<DocumentSummary>, DbError>;

    /// Returns `false` when no such document existed.
    fn delete_document(&self, id: &str) -> Result<bool, DbError>;
}

pub trait ConversationStore: Send + Sync {
    fn create_conversation(
        &self,
        mode: Mode,
        document_id: Option<String>,
        messages: Vec<Message>,
    ) -> Result<Conversation, DbError>;

    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, DbError>;

    fn list_conversations(&self) -> Result<Vec<ConversationSummary>, DbError>;

    /// Append `messages` and add their tokens to the running total as one
    /// atomic update. Returns `false` when the conversation does not exist.
    fn append_messages(&self, id: &str, messages: &[Message]) -> Result<bool, DbError>;

    /// Returns `false` when no such conversation existed.
    fn delete_conversation(&self, id: &str) -> Result<bool, DbError>;
}
