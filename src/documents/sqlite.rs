//! SQLite-backed document store.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{DocumentMetadata, DocumentSource, SourceDocument};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to open document db: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                folder_id TEXT,
                content TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init documents table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_folder ON documents(folder_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Stores a new document and returns it with its generated id.
    pub async fn insert(
        &self,
        display_name: &str,
        folder_id: Option<&str>,
        text: &str,
    ) -> Result<SourceDocument, ApiError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO documents (id, display_name, folder_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(display_name)
        .bind(folder_id)
        .bind(text)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store document: {}", e)))?;

        Ok(SourceDocument {
            id,
            display_name: display_name.to_string(),
            folder_id: folder_id.map(str::to_string),
            text: text.to_string(),
        })
    }

    pub async fn get(&self, id: &str) -> Result<Option<SourceDocument>, ApiError> {
        let row = sqlx::query(
            "SELECT id, display_name, folder_id, content FROM documents WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(row.as_ref().map(row_to_document))
    }

    pub async fn list_metadata(&self) -> Result<Vec<DocumentMetadata>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, display_name, folder_id, LENGTH(content) AS content_chars, created_at
             FROM documents
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| DocumentMetadata {
                id: row.get("id"),
                display_name: row.get("display_name"),
                folder_id: row.get("folder_id"),
                content_chars: row.get("content_chars"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(count as usize)
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> SourceDocument {
    SourceDocument {
        id: row.get("id"),
        display_name: row.get("display_name"),
        folder_id: row.get("folder_id"),
        text: row.get("content"),
    }
}

#[async_trait]
impl DocumentSource for SqliteDocumentStore {
    async fn list_all(&self) -> Result<Vec<SourceDocument>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, display_name, folder_id, content FROM documents ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows.iter().map(row_to_document).collect())
    }
}
