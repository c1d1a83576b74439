use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Queues a full rebuild from the document store.
pub async fn rebuild_index(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.rag.rebuild_index();
    Json(json!({ "status": "queued" }))
}
