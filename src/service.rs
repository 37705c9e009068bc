//! Upload and chat orchestration.
//!
//! Upload: extract → chunk → embed → persist. Chat turn: open chat sends a
//! windowed history; RAG embeds the question, ranks the document's stored
//! chunks and sends a single grounded prompt. Either way the conversation is
//! written only after the generation call succeeds.

use crate::config::RagConfig;
use crate::db::models::{
    Conversation, ConversationSummary, Document, DocumentSummary, Message, Mode,
};
use crate::db::store::{ConversationStore, DocumentStore, NewChunk, NewDocument};
use crate::doc_processor::{self, ContentKind};
use crate::error::AppError;
use crate::llm::context::{estimate_tokens, window};
use crate::llm::{ChatMessage, Generation, Generator, LlmError};
use crate::rag::{build_rag_prompt, chunk_text, ensure_dimension, retrieve, Embedder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const OPEN_CHAT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
const RAG_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers based on provided context.";

/// The user turn and the reply it produced.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub user_message: Message,
    pub assistant_message: Message,
}

pub struct ChatService {
    documents: Arc<dyn DocumentStore>,
    conversations: Arc<dyn ConversationStore>,
    embedder: Arc<dyn Embedder>,
    config: RagConfig,
}

impl ChatService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        conversations: Arc<dyn ConversationStore>,
        embedder: Arc<dyn Embedder>,
        config: RagConfig,
    ) -> Self {
        Self {
            documents,
            conversations,
            embedder,
            config,
        }
    }

    // ── Documents ──

    pub async fn upload_document(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<Document, AppError> {
        let kind = ContentKind::detect(content_type, filename).inspect_err(|e| {
            warn!(filename, error = %e, "rejected upload");
        })?;
        let owned = bytes.to_vec();
        let text = run_blocking(move || Ok(doc_processor::extract_text(&owned, kind)?)).await?;
        info!(filename, bytes = bytes.len(), chars = text.chars().count(), "text extracted");

        let texts = chunk_text(&text, self.config.chunk_size);
        let embeddings = self.embedder.embed_many(&texts).await?;
        ensure_dimension(self.embedder.dimension(), &embeddings)?;
        if embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let chunks = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| NewChunk { text, embedding })
            .collect();
        let new_document = NewDocument {
            filename: filename.to_string(),
            file_type: kind.file_type().to_string(),
            file_size: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
            chunks,
        };
        let store = self.documents.clone();
        let document = run_blocking(move || Ok(store.save_document(new_document)?)).await?;

        info!(document_id = %document.id, total_chunks = document.total_chunks(), "document uploaded");
        Ok(document)
    }

    pub fn get_document(&self, id: &str) -> Result<DocumentSummary, AppError> {
        self.documents
            .get_document(id)?
            .map(|d| d.summary())
            .ok_or_else(|| AppError::not_found("document", id))
    }

    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>, AppError> {
        Ok(self.documents.list_documents()?)
    }

    pub fn delete_document(&self, id: &str) -> Result<(), AppError> {
        if self.documents.delete_document(id)? {
            Ok(())
        } else {
            Err(AppError::not_found("document", id))
        }
    }

    // ── Conversations ──

    pub async fn create_conversation(
        &self,
        mode: Mode,
        first_message: &str,
        document_id: Option<String>,
        generator: &dyn Generator,
    ) -> Result<Conversation, AppError> {
        info!(mode = %mode, "creating conversation");
        if first_message.trim().is_empty() {
            return Err(AppError::Validation("first_message must not be empty".into()));
        }
        match (mode, &document_id) {
            (Mode::Rag, None) => {
                warn!("rag mode requested without document_id");
                return Err(AppError::Validation("document_id required for rag mode".into()));
            }
            (Mode::OpenChat, Some(_)) => {
                return Err(AppError::Validation(
                    "document_id is only accepted in rag mode".into(),
                ));
            }
            _ => {}
        }

        let user_message = Message::user(first_message, estimate_tokens(first_message));
        let assistant_message = match &document_id {
            Some(doc_id) => self.answer_from_document(doc_id, first_message, generator).await?,
            None => {
                let prompt = vec![
                    ChatMessage::system(OPEN_CHAT_SYSTEM_PROMPT),
                    ChatMessage::user(first_message),
                ];
                let generation = self.generate(generator, &prompt).await?;
                assistant_from(generation, Vec::new())
            }
        };

        let conversation = self.conversations.create_conversation(
            mode,
            document_id,
            vec![user_message, assistant_message],
        )?;
        info!(conversation_id = %conversation.id, total_tokens = conversation.total_tokens, "conversation created");
        Ok(conversation)
    }

    pub async fn add_message(
        &self,
        conversation_id: &str,
        content: &str,
        generator: &dyn Generator,
    ) -> Result<Exchange, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("content must not be empty".into()));
        }
        let conversation = self
            .conversations
            .get_conversation(conversation_id)?
            .ok_or_else(|| {
                warn!(conversation_id, "conversation not found");
                AppError::not_found("conversation", conversation_id)
            })?;

        let user_message = Message::user(content, estimate_tokens(content));
        let assistant_message = match (conversation.mode, &conversation.document_id) {
            (Mode::Rag, Some(doc_id)) => {
                self.answer_from_document(doc_id, content, generator).await?
            }
            (Mode::Rag, None) => {
                return Err(AppError::Integrity(format!(
                    "rag conversation {} has no document",
                    conversation_id
                )))
            }
            (Mode::OpenChat, _) => {
                let mut history = conversation.messages;
                history.push(user_message.clone());
                let context = window(&history, self.config.max_history);
                info!(conversation_id, messages = context.len(), "prepared chat context");

                let prompt: Vec<ChatMessage> = std::iter::once(ChatMessage::system(
                    OPEN_CHAT_SYSTEM_PROMPT,
                ))
                .chain(context.iter().map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                }))
                .collect();
                let generation = self.generate(generator, &prompt).await?;
                assistant_from(generation, Vec::new())
            }
        };

        let exchange = [user_message, assistant_message];
        if !self.conversations.append_messages(conversation_id, &exchange)? {
            // Deleted while the generation call was in flight.
            return Err(AppError::not_found("conversation", conversation_id));
        }
        let [user_message, assistant_message] = exchange;
        info!(conversation_id, "message exchange stored");
        Ok(Exchange {
            user_message,
            assistant_message,
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Conversation, AppError> {
        self.conversations
            .get_conversation(id)?
            .ok_or_else(|| AppError::not_found("conversation", id))
    }

    pub fn list_conversations(&self) -> Result<Vec<ConversationSummary>, AppError> {
        Ok(self.conversations.list_conversations()?)
    }

    pub fn delete_conversation(&self, id: &str) -> Result<(), AppError> {
        if self.conversations.delete_conversation(id)? {
            Ok(())
        } else {
            Err(AppError::not_found("conversation", id))
        }
    }

    /// Embed the question, rank the document's chunks and answer from the
    /// top `top_k` of them.
    async fn answer_from_document(
        &self,
        document_id: &str,
        question: &str,
        generator: &dyn Generator,
    ) -> Result<Message, AppError> {
        let document = self.documents.get_document(document_id)?.ok_or_else(|| {
            warn!(document_id, "document not found");
            AppError::not_found("document", document_id)
        })?;

        let query = self.embedder.embed(question).await?;
        ensure_dimension(self.embedder.dimension(), std::slice::from_ref(&query))?;
        let retrieved = retrieve(&query, &document.chunks, self.config.top_k)?;
        info!(document_id, retrieved = retrieved.len(), "retrieved chunks for rag");

        let prompt = vec![
            ChatMessage::system(RAG_SYSTEM_PROMPT),
            ChatMessage::user(build_rag_prompt(question, &retrieved)),
        ];
        let chunk_ids = retrieved.iter().map(|r| r.chunk.id.clone()).collect();

        let generation = self.generate(generator, &prompt).await?;
        Ok(assistant_from(generation, chunk_ids))
    }

    async fn generate(
        &self,
        generator: &dyn Generator,
        messages: &[ChatMessage],
    ) -> Result<Generation, AppError> {
        let timeout = self.config.generation_timeout;
        let call = generator.generate(messages, self.config.max_tokens, self.config.temperature);
        let generation = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result?,
            Err(_) => return Err(LlmError::Timeout(timeout).into()),
        };
        info!(model = %generation.model, tokens = generation.token_count, "llm response generated");
        Ok(generation)
    }
}

/// Run CPU-bound or synchronous storage work off the async worker threads.
async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))?
}

fn assistant_from(generation: Generation, retrieved_chunks: Vec<String>) -> Message {
    Message::assistant(
        generation.content,
        generation.token_count,
        generation.model,
        retrieved_chunks,
    )
}
