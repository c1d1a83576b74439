//! Uploaded documents and their extracted text.
//!
//! The RAG index only reads from here through [`DocumentSource`]; it never writes back.

mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

pub use sqlite::SqliteDocumentStore;

/// A document as seen by the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub display_name: String,
    pub folder_id: Option<String>,
    pub text: String,
}

/// Listing entry returned to API clients (no content).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub id: String,
    pub display_name: String,
    pub folder_id: Option<String>,
    pub content_chars: i64,
    pub created_at: String,
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Every stored document with its extracted text.
    async fn list_all(&self) -> Result<Vec<SourceDocument>, ApiError>;
}
