use crate::db::DbError;
use crate::doc_processor::ExtractError;
use crate::llm::LlmError;
use crate::rag::RagError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("generation failed: {0}")]
    Generation(LlmError),
    #[error("data integrity error: {0}")]
    Integrity(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("database error: {0}")]
    Database(DbError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable tag for the error's category.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::Extraction(_) => "validation",
            AppError::NotFound { .. } => "not_found",
            AppError::Generation(_) => "generation",
            AppError::Integrity(_) => "integrity",
            AppError::Embedding(_) => "embedding",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Extraction(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Generation(_) | AppError::Embedding(_) => StatusCode::BAD_GATEWAY,
            AppError::Integrity(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Config(msg) => AppError::Validation(msg),
            LlmError::Settings(db) => db.into(),
            other => AppError::Generation(other),
        }
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Embedding(msg) => AppError::Embedding(msg),
            RagError::DimensionMismatch { .. } | RagError::CorruptEmbedding(_) => {
                AppError::Integrity(err.to_string())
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Embedding(rag) => rag.into(),
            DbError::Integrity(msg) => AppError::Integrity(msg),
            other => AppError::Database(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        }
        let body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}
