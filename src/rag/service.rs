use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::documents::{DocumentSource, SourceDocument};
use crate::llm::{CompletionProvider, EmbeddingProvider};

use super::builder::{IndexBuilder, IndexPhase};
use super::embedding::EmbeddingGateway;
use super::index::VectorIndex;
use super::queue::{spawn_index_worker, IndexJob, IndexJobReceiver, IndexQueue};
use super::responder::{RagResponder, RetrievalScope};
use super::settings::RagSettings;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagStats {
    pub phase: IndexPhase,
    pub entries: usize,
    pub generation: u64,
    pub dimension: Option<usize>,
    pub queued_jobs: usize,
    pub embedding_provider: String,
}

/// Owns the process-wide index and everything that reads or writes it.
pub struct RagService {
    builder: Arc<IndexBuilder>,
    responder: RagResponder,
    queue: IndexQueue,
    settings: RagSettings,
}

impl RagService {
    /// The returned receiver must be handed to [`RagService::spawn_worker`] for queued
    /// jobs to run.
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        documents: Arc<dyn DocumentSource>,
        settings: RagSettings,
    ) -> (Self, IndexJobReceiver) {
        let index = Arc::new(VectorIndex::new(EmbeddingGateway::new(embeddings)));
        let builder = Arc::new(IndexBuilder::new(index, documents, settings.clone()));
        let responder = RagResponder::new(builder.clone(), completion, settings.clone());
        let (queue, jobs) = IndexQueue::new();

        (
            Self {
                builder,
                responder,
                queue,
                settings,
            },
            jobs,
        )
    }

    pub fn spawn_worker(&self, jobs: IndexJobReceiver) -> JoinHandle<()> {
        spawn_index_worker(self.builder.clone(), jobs)
    }

    /// Always resolves to answer text. `scope_id` may name a document or folder;
    /// `None` or `"all"` searches everything.
    pub async fn answer_question(&self, question: &str, scope_id: Option<&str>) -> String {
        let scope = RetrievalScope::from_request(scope_id);
        self.responder.answer(question, &scope).await
    }

    pub fn index_document(&self, document: SourceDocument) {
        tracing::info!("Queued {} for indexing", document.display_name);
        self.queue.enqueue(IndexJob::Document(document));
    }

    pub fn rebuild_index(&self) {
        self.queue.enqueue(IndexJob::Rebuild);
    }

    /// Queues the initial rebuild once `startup_delay` has passed.
    pub fn schedule_startup_rebuild(&self) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let delay = self.settings.startup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!("Starting initial index build");
            queue.enqueue(IndexJob::Rebuild);
        })
    }

    pub fn builder(&self) -> &Arc<IndexBuilder> {
        &self.builder
    }

    pub fn stats(&self) -> RagStats {
        let index = self.builder.index();
        RagStats {
            phase: self.builder.phase(),
            entries: index.len(),
            generation: index.generation(),
            dimension: index.dimension(),
            queued_jobs: self.queue.depth(),
            embedding_provider: index.gateway().provider_name().to_string(),
        }
    }
}
