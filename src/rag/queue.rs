//! Hand-off between request handlers and the background indexer.
//!
//! Handlers push jobs and return at once; one worker task drains the queue in order,
//! so single-document pacing and rebuilds never overlap inside this process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::documents::SourceDocument;

use super::builder::{AddOutcome, IndexBuilder};

#[derive(Debug, Clone)]
pub enum IndexJob {
    Document(SourceDocument),
    Rebuild,
}

#[derive(Clone)]
pub struct IndexQueue {
    sender: mpsc::UnboundedSender<IndexJob>,
    depth: Arc<AtomicUsize>,
}

pub struct IndexJobReceiver {
    receiver: mpsc::UnboundedReceiver<IndexJob>,
    depth: Arc<AtomicUsize>,
}

impl IndexQueue {
    pub fn new() -> (Self, IndexJobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                sender,
                depth: depth.clone(),
            },
            IndexJobReceiver { receiver, depth },
        )
    }

    /// Returns `false` when the worker has stopped and the job was dropped.
    pub fn enqueue(&self, job: IndexJob) -> bool {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.sender.send(job) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!("Index worker is not running, dropping {:?}", err.0);
            return false;
        }
        true
    }

    /// Jobs waiting to start.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

/// Runs until every [`IndexQueue`] handle is dropped.
pub fn spawn_index_worker(builder: Arc<IndexBuilder>, jobs: IndexJobReceiver) -> JoinHandle<()> {
    let IndexJobReceiver {
        mut receiver,
        depth,
    } = jobs;

    tokio::spawn(async move {
        tracing::info!("Index worker started");
        while let Some(job) = receiver.recv().await {
            depth.fetch_sub(1, Ordering::SeqCst);
            run_job(&builder, job).await;
        }
        tracing::info!("Index worker stopped");
    })
}

async fn run_job(builder: &IndexBuilder, job: IndexJob) {
    match job {
        IndexJob::Rebuild => {
            if let Err(err) = builder.rebuild_all().await {
                tracing::error!("Index rebuild failed: {}", err);
            }
        }
        IndexJob::Document(document) => match builder.add_one(&document).await {
            Ok(AddOutcome::Indexed { chunks, batches }) => {
                tracing::info!(
                    "Indexed {} ({} chunks, {} batches)",
                    document.display_name,
                    chunks,
                    batches
                );
            }
            Ok(AddOutcome::Skipped(reason)) => {
                tracing::info!("Skipped {}: {:?}", document.display_name, reason);
            }
            Ok(AddOutcome::Partial {
                appended,
                total,
                failed_batch,
                error,
            }) => {
                tracing::warn!(
                    "{} partially indexed ({}/{} chunks, batch {} failed: {}); the next rebuild will repair it",
                    document.display_name,
                    appended,
                    total,
                    failed_batch,
                    error
                );
            }
            Err(err) => {
                tracing::error!("Indexing {} failed: {}", document.display_name, err);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::rag::embedding::EmbeddingGateway;
    use crate::rag::index::VectorIndex;
    use crate::rag::settings::RagSettings;
    use crate::rag::testing::{document, padded, FakeDocuments, FakeEmbeddings};

    fn builder(provider: Arc<FakeEmbeddings>, documents: Arc<FakeDocuments>) -> Arc<IndexBuilder> {
        let settings = RagSettings {
            index_batch_delay: Duration::ZERO,
            ..RagSettings::default()
        };
        let index = Arc::new(VectorIndex::new(EmbeddingGateway::new(provider)));
        Arc::new(IndexBuilder::new(index, documents, settings))
    }

    #[tokio::test]
    async fn worker_drains_jobs_in_order() {
        let documents = Arc::new(FakeDocuments::with(vec![document(
            "d1",
            "stored.txt",
            None,
            &padded("already in the database"),
        )]));
        let builder = builder(Arc::new(FakeEmbeddings::new()), documents);
        let (queue, jobs) = IndexQueue::new();

        assert!(queue.enqueue(IndexJob::Rebuild));
        assert!(queue.enqueue(IndexJob::Document(document(
            "d2",
            "upload.txt",
            Some("f1"),
            &padded("freshly uploaded notes"),
        ))));
        assert_eq!(queue.depth(), 2);

        let handle = spawn_index_worker(builder.clone(), jobs);
        drop(queue);
        handle.await.unwrap();

        assert!(builder.index().contains_source("d1"));
        assert!(builder.index().contains_source("d2"));
    }

    #[tokio::test]
    async fn failed_job_does_not_stop_the_worker() {
        let provider = Arc::new(FakeEmbeddings::new());
        let builder = builder(provider.clone(), Arc::new(FakeDocuments::default()));
        let (queue, jobs) = IndexQueue::new();
        provider.fail_on_batch(1);

        queue.enqueue(IndexJob::Document(document("bad", "a.txt", None, &padded("first"))));
        queue.enqueue(IndexJob::Document(document("good", "b.txt", None, &padded("second"))));

        let handle = spawn_index_worker(builder.clone(), jobs);
        drop(queue);
        handle.await.unwrap();

        assert!(!builder.index().contains_source("bad"));
        assert!(builder.index().contains_source("good"));
    }

    #[tokio::test]
    async fn enqueue_after_worker_exit_reports_drop() {
        let builder = builder(Arc::new(FakeEmbeddings::new()), Arc::new(FakeDocuments::default()));
        let (queue, jobs) = IndexQueue::new();
        let worker_queue = queue.clone();

        let handle = spawn_index_worker(builder, jobs);
        handle.abort();
        let _ = handle.await;

        assert!(!worker_queue.enqueue(IndexJob::Rebuild));
        assert_eq!(queue.depth(), 0);
    }
}
