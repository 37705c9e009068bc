pub mod models;
pub mod store;

use crate::rag::embedding::{bytes_to_embedding, embedding_to_bytes};
use crate::rag::RagError;
use chrono::{DateTime, Utc};
use models::{
    Chunk, Conversation, ConversationSummary, Document, DocumentSummary, Message, Mode, Role,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use store::{ConversationStore, DocumentStore, NewDocument};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Integrity(String),
    #[error(transparent)]
    Embedding(#[from] RagError),
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(data_dir: &Path) -> Result<Self, DbError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("botgpt.db");
        let conn = Connection::open(&db_path)?;
        let db = Self::from_connection(conn)?;
        info!(path = %db_path.display(), "database opened");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DbError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, chunk_index);

            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                mode TEXT NOT NULL CHECK (mode IN ('open_chat', 'rag')),
                document_id TEXT,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                tokens INTEGER NOT NULL,
                model TEXT,
                retrieved_chunks TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                UNIQUE (conversation_id, position),
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, DbError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), DbError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool, DbError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }
}

fn to_count(value: i64, what: &str) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_| DbError::Integrity(format!("negative {}: {}", what, value)))
}

fn insert_message(
    conn: &Connection,
    conversation_id: &str,
    position: i64,
    message: &Message,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, position, role, content, tokens, model, retrieved_chunks, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            message.id,
            conversation_id,
            position,
            message.role.as_str(),
            message.content,
            message.tokens,
            message.model,
            serde_json::to_string(&message.retrieved_chunks)?,
            message.timestamp,
        ],
    )?;
    Ok(())
}

struct MessageRow {
    id: String,
    role: String,
    content: String,
    tokens: u32,
    model: Option<String>,
    retrieved_chunks: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Result<Message, DbError> {
        Ok(Message {
            id: self.id,
            role: self.role.parse::<Role>().map_err(DbError::Integrity)?,
            content: self.content,
            timestamp: self.created_at,
            tokens: self.tokens,
            model: self.model,
            retrieved_chunks: serde_json::from_str(&self.retrieved_chunks)?,
        })
    }
}

fn load_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, role, content, tokens, model, retrieved_chunks, created_at
         FROM messages WHERE conversation_id = ?1 ORDER BY position ASC",
    )?;
    let rows = stmt.query_map(params![conversation_id], |row| {
        Ok(MessageRow {
            id: row.get(0)?,
            role: row.get(1)?,
            content: row.get(2)?,
            tokens: row.get(3)?,
            model: row.get(4)?,
            retrieved_chunks: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;
    rows.map(|row| -> Result<Message, DbError> { row?.into_message() })
        .collect()
}

impl DocumentStore for Database {
    fn save_document(&self, document: NewDocument) -> Result<Document, DbError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let id = uuid::Uuid::new_v4().to_string();
        let uploaded_at = Utc::now();
        tx.execute(
            "INSERT INTO documents (id, filename, file_type, file_size, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, document.filename, document.file_type, document.file_size, uploaded_at],
        )?;

        let mut chunks = Vec::with_capacity(document.chunks.len());
        for (index, chunk) in document.chunks.into_iter().enumerate() {
            let chunk_id = uuid::Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO chunks (id, document_id, content, chunk_index, embedding) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    chunk_id,
                    id,
                    chunk.text,
                    index as i64,
                    embedding_to_bytes(&chunk.embedding)
                ],
            )?;
            chunks.push(Chunk {
                id: chunk_id,
                text: chunk.text,
                embedding: chunk.embedding,
                chunk_index: index,
            });
        }
        tx.commit()?;

        info!(document_id = %id, chunks = chunks.len(), "document saved");
        Ok(Document {
            id,
            filename: document.filename,
            file_type: document.file_type,
            file_size: document.file_size,
            chunks,
            uploaded_at,
        })
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>, DbError> {
        let conn = self.conn.lock();
        let header = conn
            .query_row(
                "SELECT filename, file_type, file_size, uploaded_at FROM documents WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, DateTime<Utc>>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((filename, file_type, file_size, uploaded_at)) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, content, chunk_index, embedding FROM chunks WHERE document_id = ?1 ORDER BY chunk_index ASC",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (chunk_id, text, index, blob) = row?;
            chunks.push(Chunk {
                id: chunk_id,
                text,
                embedding: bytes_to_embedding(&blob)?,
                chunk_index: to_count(index, "chunk index")? as usize,
            });
        }

        debug!(document_id = %id, chunks = chunks.len(), "document loaded");
        Ok(Some(Document {
            id: id.to_string(),
            filename,
            file_type,
            file_size,
            chunks,
            uploaded_at,
        }))
    }

    fn list_documents(&self) -> Result<Vec<DocumentSummary>, DbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT d.id, d.filename, d.file_type, d.file_size, d.uploaded_at,
                    (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id)
             FROM documents d ORDER BY d.uploaded_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                DocumentSummary {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    file_type: row.get(2)?,
                    file_size: row.get(3)?,
                    total_chunks: 0,
                    uploaded_at: row.get(4)?,
                },
                row.get::<_, i64>(5)?,
            ))
        })?;
        rows.map(|row| -> Result<DocumentSummary, DbError> {
            let (mut summary, count) = row?;
            summary.total_chunks = to_count(count, "chunk count")? as usize;
            Ok(summary)
        })
        .collect()
    }

    fn delete_document(&self, id: &str) -> Result<bool, DbError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        if removed > 0 {
            info!(document_id = %id, "document deleted");
        }
        Ok(removed > 0)
    }
}

impl ConversationStore for Database {
    fn create_conversation(
        &self,
        mode: Mode,
        document_id: Option<String>,
        messages: Vec<Message>,
    ) -> Result<Conversation, DbError> {
        let conversation = Conversation::new(mode, document_id, messages);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO conversations (id, mode, document_id, total_tokens, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                conversation.id,
                conversation.mode.as_str(),
                conversation.document_id,
                conversation.total_tokens as i64,
                conversation.created_at,
                conversation.updated_at,
            ],
        )?;
        for (position, message) in conversation.messages.iter().enumerate() {
            insert_message(&tx, &conversation.id, position as i64, message)?;
        }
        tx.commit()?;

        info!(conversation_id = %conversation.id, mode = %conversation.mode, "conversation saved");
        Ok(conversation)
    }

    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, DbError> {
        let conn = self.conn.lock();
        let header = conn
            .query_row(
                "SELECT mode, document_id, total_tokens, created_at, updated_at FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, DateTime<Utc>>(3)?,
                        row.get::<_, DateTime<Utc>>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((mode, document_id, total_tokens, created_at, updated_at)) = header else {
            return Ok(None);
        };

        Ok(Some(Conversation {
            id: id.to_string(),
            mode: mode.parse().map_err(DbError::Integrity)?,
            document_id,
            messages: load_messages(&conn, id)?,
            total_tokens: to_count(total_tokens, "token total")?,
            created_at,
            updated_at,
        }))
    }

    fn list_conversations(&self) -> Result<Vec<ConversationSummary>, DbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.mode, c.total_tokens, c.created_at, c.updated_at,
                    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id),
                    (SELECT m.content FROM messages m WHERE m.conversation_id = c.id ORDER BY m.position ASC LIMIT 1),
                    d.filename
             FROM conversations c
             LEFT JOIN documents d ON c.mode = 'rag' AND d.id = c.document_id
             ORDER BY c.updated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, DateTime<Utc>>(3)?,
                row.get::<_, DateTime<Utc>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;

        rows.map(|row| -> Result<ConversationSummary, DbError> {
            let (id, mode, total, created_at, updated_at, count, first, document_name) = row?;
            Ok(ConversationSummary {
                id,
                mode: mode.parse().map_err(DbError::Integrity)?,
                message_count: to_count(count, "message count")? as usize,
                total_tokens: to_count(total, "token total")?,
                created_at,
                updated_at,
                preview: first
                    .map(|text| text.chars().take(100).collect())
                    .unwrap_or_default(),
                document_name,
            })
        })
        .collect()
    }

    fn append_messages(&self, id: &str, messages: &[Message]) -> Result<bool, DbError> {
        let added: i64 = messages.iter().map(|m| i64::from(m.tokens)).sum();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        // The counter bump doubles as the existence check; a dropped
        // transaction rolls back.
        let updated = tx.execute(
            "UPDATE conversations SET total_tokens = total_tokens + ?1, updated_at = ?2 WHERE id = ?3",
            params![added, Utc::now(), id],
        )?;
        if updated == 0 {
            return Ok(false);
        }

        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM messages WHERE conversation_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        for (offset, message) in messages.iter().enumerate() {
            insert_message(&tx, id, next + offset as i64, message)?;
        }
        tx.commit()?;

        debug!(conversation_id = %id, appended = messages.len(), tokens = added, "messages appended");
        Ok(true)
    }

    fn delete_conversation(&self, id: &str) -> Result<bool, DbError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        if removed > 0 {
            info!(conversation_id = %id, "conversation deleted");
        }
        Ok(removed > 0)
    }
}
