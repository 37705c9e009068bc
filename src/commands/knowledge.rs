use crate::db::models::DocumentSummary;
use crate::error::AppError;
use crate::AppState;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Upper bound on an uploaded file, applied to the upload route only.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub count: usize,
    pub documents: Vec<DocumentSummary>,
}

/// Accepts a multipart form whose `file` field carries the document.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DocumentSummary>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let document = state
            .service
            .upload_document(&filename, content_type.as_deref(), &bytes)
            .await?;
        return Ok(Json(document.summary()));
    }
    Err(AppError::Validation("multipart field `file` is required".into()))
}

pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentList>, AppError> {
    let documents = state.service.list_documents()?;
    Ok(Json(DocumentList {
        count: documents.len(),
        documents,
    }))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentSummary>, AppError> {
    Ok(Json(state.service.get_document(&id)?))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.service.delete_document(&id)?;
    Ok(Json(json!({ "message": "document deleted", "id": id })))
}
