use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentRequest {
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub folder_id: Option<String>,
}

/// Stores the text and queues it for indexing; does not wait for the index.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UploadDocumentRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Document name is required".to_string()));
    }
    let folder_id = payload
        .folder_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let document = state
        .documents
        .insert(name, folder_id, &payload.content)
        .await?;
    tracing::info!("Stored document {} ({})", document.id, document.display_name);

    let body = json!({
        "id": document.id,
        "displayName": document.display_name,
        "folderId": document.folder_id,
        "contentChars": document.text.chars().count(),
        "indexing": "queued",
    });
    state.rag.index_document(document);
    Ok(Json(body))
}

pub async fn list_documents(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let documents = state.documents.list_metadata().await?;
    Ok(Json(json!({ "documents": documents })))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let document = state
        .documents
        .get(&document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {} not found", document_id)))?;
    Ok(Json(json!({
        "id": document.id,
        "displayName": document.display_name,
        "folderId": document.folder_id,
        "content": document.text,
    })))
}
