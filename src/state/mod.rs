use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService};
use crate::documents::SqliteDocumentStore;
use crate::llm::{
    ChatCompletionsProvider, CompletionSettings, EmbeddingSettings, HuggingFaceEmbeddings,
};
use crate::rag::{IndexJobReceiver, RagService, RagSettings};

pub mod error;

use error::InitializationError;

/// Shared by every route and background task.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub documents: SqliteDocumentStore,
    pub rag: Arc<RagService>,
}

impl AppState {
    /// Loads configuration, opens the document database and wires the RAG service to
    /// the configured providers.
    ///
    /// The returned receiver feeds the index worker; pass it to
    /// [`RagService::spawn_worker`].
    pub async fn initialize(
        paths: Arc<AppPaths>,
    ) -> Result<(Arc<Self>, IndexJobReceiver), InitializationError> {
        let config = ConfigService::new(paths.clone());
        let values = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let documents = SqliteDocumentStore::new(&paths)
            .await
            .map_err(|e| InitializationError::Documents(e.into()))?;

        let embedding_settings = EmbeddingSettings::from_config(&values);
        let completion_settings = CompletionSettings::from_config(&values);
        tracing::info!(
            "Embedding model {}, completion model {}",
            embedding_settings.model,
            completion_settings.model
        );

        let (rag, jobs) = RagService::new(
            Arc::new(HuggingFaceEmbeddings::new(&embedding_settings)),
            Arc::new(ChatCompletionsProvider::new(&completion_settings)),
            Arc::new(documents.clone()),
            RagSettings::from_config(&values),
        );

        let state = Self::from_parts(paths, config, documents, Arc::new(rag));
        Ok((state, jobs))
    }

    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        documents: SqliteDocumentStore,
        rag: Arc<RagService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            paths,
            config,
            documents,
            rag,
        })
    }
}
