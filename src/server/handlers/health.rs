use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let documents = state.documents.count().await?;
    let index = state.rag.stats();
    Ok(Json(json!({
        "status": "ok",
        "documents": documents,
        "index": index,
    })))
}
