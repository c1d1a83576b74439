//! Full-corpus rebuilds and paced single-document indexing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};

use crate::documents::{DocumentSource, SourceDocument};

use super::error::RagError;
use super::index::{Chunk, RebuildSummary, VectorIndex};
use super::segmenter::TextSegmenter;
use super::settings::RagSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPhase {
    Uninitialized,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooShort { chars: usize },
    AlreadyIndexed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Indexed { chunks: usize, batches: usize },
    Skipped(SkipReason),
    /// A batch failed; earlier batches stay in the index.
    Partial {
        appended: usize,
        total: usize,
        failed_batch: usize,
        error: String,
    },
}

pub struct IndexBuilder {
    index: Arc<VectorIndex>,
    documents: Arc<dyn DocumentSource>,
    segmenter: TextSegmenter,
    settings: RagSettings,
    ready: OnceCell<()>,
    rebuild_lock: Mutex<()>,
    /// Successful full rebuilds; only changes while `rebuild_lock` is held.
    completed_rebuilds: AtomicU64,
}

impl IndexBuilder {
    pub fn new(
        index: Arc<VectorIndex>,
        documents: Arc<dyn DocumentSource>,
        settings: RagSettings,
    ) -> Self {
        Self {
            index,
            documents,
            segmenter: TextSegmenter::new(settings.chunk_size, settings.chunk_overlap),
            settings,
            ready: OnceCell::new(),
            rebuild_lock: Mutex::new(()),
            completed_rebuilds: AtomicU64::new(0),
        }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn phase(&self) -> IndexPhase {
        if self.ready.initialized() {
            IndexPhase::Ready
        } else {
            IndexPhase::Uninitialized
        }
    }

    /// Builds the index once. Concurrent callers wait on the same rebuild; a failed
    /// build leaves the phase `Uninitialized` so the next caller tries again. A full
    /// rebuild that finishes while this call waits counts as the initial build.
    pub async fn ensure_ready(&self) -> Result<(), RagError> {
        self.ready
            .get_or_try_init(|| async {
                let _guard = self.rebuild_lock.lock().await;
                if self.completed_rebuilds.load(Ordering::SeqCst) > 0 {
                    return Ok(());
                }
                tracing::info!("Vector index not initialized, building from documents");
                self.rebuild_index().await.map(|_| ())
            })
            .await
            .map(|_| ())
    }

    /// Replaces the index with a fresh build from every stored document.
    pub async fn rebuild_all(&self) -> Result<RebuildSummary, RagError> {
        let summary = {
            let _guard = self.rebuild_lock.lock().await;
            self.rebuild_index().await?
        };
        // Fails while a lazy init is pending; that init sees the completed rebuild.
        let _ = self.ready.set(());
        Ok(summary)
    }

    /// Callers hold `rebuild_lock`.
    async fn rebuild_index(&self) -> Result<RebuildSummary, RagError> {
        let documents = self
            .documents
            .list_all()
            .await
            .map_err(|e| RagError::DocumentSource(e.to_string()))?;
        tracing::info!("Rebuilding vector index from {} documents", documents.len());

        self.index.begin_rebuild();
        let scanned: HashSet<String> = documents.iter().map(|d| d.id.clone()).collect();
        let chunks: Vec<Chunk> = documents
            .iter()
            .filter_map(|doc| self.chunks_for(doc))
            .flatten()
            .collect();

        let mut staged = Vec::with_capacity(chunks.len());
        let total_batches = chunks.len().div_ceil(self.settings.rebuild_batch_size);
        for (i, batch) in chunks.chunks(self.settings.rebuild_batch_size).enumerate() {
            match self.index.embed_chunks(batch.to_vec()).await {
                Ok(entries) => staged.extend(entries),
                Err(err) => {
                    self.index.abort_rebuild();
                    tracing::warn!(
                        "Index rebuild failed at batch {}/{}: {}",
                        i + 1,
                        total_batches,
                        err
                    );
                    return Err(err);
                }
            }
        }

        let summary = self.index.commit_rebuild(staged, &scanned)?;
        self.completed_rebuilds.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            "Vector index rebuilt: {} chunks (generation {}, {} carried over)",
            summary.entries,
            summary.generation,
            summary.carried_over
        );
        if summary.dropped > 0 {
            tracing::warn!(
                "Dropped {} appended chunks with a different vector size",
                summary.dropped
            );
        }
        Ok(summary)
    }

    /// Segments and labels a document, or `None` when it is too short to index.
    pub fn chunks_for(&self, document: &SourceDocument) -> Option<Vec<Chunk>> {
        let chars = document.text.trim().chars().count();
        if chars <= self.settings.min_document_chars {
            tracing::info!(
                "Skipping document {} ({}): only {} characters",
                document.id,
                document.display_name,
                chars
            );
            return None;
        }

        Some(
            self.segmenter
                .segment(&document.text)
                .into_iter()
                .map(|segment| Chunk {
                    text: format!("Source: {}\n{}", document.display_name, segment),
                    source_id: document.id.clone(),
                    source_label: document.display_name.clone(),
                    folder_id: document.folder_id.clone(),
                })
                .collect(),
        )
    }

    /// Appends one document in small paced batches.
    ///
    /// A transient failure stops the document where it is and reports `Partial`;
    /// anything else (missing credentials, a vector size change) is returned as an error.
    pub async fn add_one(&self, document: &SourceDocument) -> Result<AddOutcome, RagError> {
        self.ensure_ready().await?;

        let Some(chunks) = self.chunks_for(document) else {
            return Ok(AddOutcome::Skipped(SkipReason::TooShort {
                chars: document.text.trim().chars().count(),
            }));
        };
        if self.index.contains_source(&document.id) {
            tracing::info!("Document {} is already indexed", document.id);
            return Ok(AddOutcome::Skipped(SkipReason::AlreadyIndexed));
        }

        let total = chunks.len();
        let batch_size = self.settings.index_batch_size;
        let batches: Vec<Vec<Chunk>> = chunks.chunks(batch_size).map(<[Chunk]>::to_vec).collect();
        let batch_count = batches.len();
        tracing::info!(
            "Indexing {} ({} chunks in {} batches)",
            document.display_name,
            total,
            batch_count
        );

        let mut appended = 0;
        for (i, batch) in batches.into_iter().enumerate() {
            if i > 0 && !self.settings.index_batch_delay.is_zero() {
                tokio::time::sleep(self.settings.index_batch_delay).await;
            }
            match self.index.append(batch).await {
                Ok(added) => {
                    appended += added;
                    tracing::info!("Added batch {}/{}", i + 1, batch_count);
                }
                Err(err) if !err.is_transient() => {
                    tracing::warn!("Indexing {} aborted: {}", document.id, err);
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        "Error indexing batch {}/{} of {}: {}",
                        i + 1,
                        batch_count,
                        document.id,
                        err
                    );
                    return Ok(AddOutcome::Partial {
                        appended,
                        total,
                        failed_batch: i + 1,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(AddOutcome::Indexed {
            chunks: appended,
            batches: batch_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::rag::embedding::EmbeddingGateway;
    use crate::rag::testing::{document, padded, FakeDocuments, FakeEmbeddings};

    fn fast_settings() -> RagSettings {
        RagSettings {
            chunk_size: 100,
            chunk_overlap: 20,
            index_batch_size: 5,
            index_batch_delay: Duration::ZERO,
            rebuild_batch_size: 4,
            ..RagSettings::default()
        }
    }

    fn builder(
        provider: Arc<FakeEmbeddings>,
        documents: Arc<FakeDocuments>,
        settings: RagSettings,
    ) -> IndexBuilder {
        let index = Arc::new(VectorIndex::new(EmbeddingGateway::new(provider)));
        IndexBuilder::new(index, documents, settings)
    }

    /// Text that segments into exactly `n` chunks at size 100 / overlap 20.
    fn text_with_chunks(n: usize, marker: &str) -> String {
        let mut text = String::new();
        for i in 0..n {
            let body = format!("{marker} part{i} ");
            let width = if i == 0 { 100 } else { 80 };
            text.push_str(&format!("{:<width$}", body, width = width));
        }
        text
    }

    #[tokio::test]
    async fn rebuild_with_no_documents_is_ready_and_empty() {
        let provider = Arc::new(FakeEmbeddings::new());
        let builder = builder(provider.clone(), Arc::new(FakeDocuments::default()), fast_settings());

        assert_eq!(builder.phase(), IndexPhase::Uninitialized);
        let summary = builder.rebuild_all().await.unwrap();
        assert_eq!(summary.entries, 0);
        assert_eq!(builder.phase(), IndexPhase::Ready);
        assert!(builder.index().query("anything", 3).await.unwrap().is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn rebuild_skips_short_documents_and_labels_chunks() {
        let documents = Arc::new(FakeDocuments::with(vec![
            document("d1", "notes.pdf", Some("f1"), &padded("Cell biology notes")),
            document("d2", "empty.pdf", None, "   too short   "),
        ]));
        let builder = builder(Arc::new(FakeEmbeddings::new()), documents, fast_settings());

        builder.rebuild_all().await.unwrap();
        let snapshot = builder.index().snapshot();
        assert!(!snapshot.is_empty());
        assert!(snapshot.iter().all(|e| e.chunk.source_id == "d1"));
        assert!(snapshot[0].chunk.text.starts_with("Source: notes.pdf\n"));
        assert_eq!(snapshot[0].chunk.folder_id.as_deref(), Some("f1"));
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_index() {
        let provider = Arc::new(FakeEmbeddings::new());
        let documents = Arc::new(FakeDocuments::with(vec![document(
            "d1",
            "a.txt",
            None,
            &padded("first material"),
        )]));
        let builder = builder(provider.clone(), documents.clone(), fast_settings());
        builder.rebuild_all().await.unwrap();
        let before = builder.index().len();

        documents.push(document("d2", "b.txt", None, &padded("new material")));
        provider.fail_with_transient();
        assert!(builder.rebuild_all().await.is_err());
        assert_eq!(builder.index().len(), before);
        assert!(!builder.index().contains_source("d2"));
    }

    #[tokio::test]
    async fn failed_initialization_is_retried() {
        let documents = Arc::new(FakeDocuments::default());
        documents.set_failing(true);
        let builder = builder(Arc::new(FakeEmbeddings::new()), documents.clone(), fast_settings());

        assert!(matches!(
            builder.ensure_ready().await,
            Err(RagError::DocumentSource(_))
        ));
        assert_eq!(builder.phase(), IndexPhase::Uninitialized);

        documents.set_failing(false);
        builder.ensure_ready().await.unwrap();
        assert_eq!(builder.phase(), IndexPhase::Ready);
    }

    #[tokio::test]
    async fn concurrent_ensure_ready_builds_once() {
        let provider = Arc::new(FakeEmbeddings::new());
        let documents = Arc::new(FakeDocuments::with(vec![document(
            "d1",
            "a.txt",
            None,
            &padded("shared corpus"),
        )]));
        let builder = Arc::new(builder(provider.clone(), documents, fast_settings()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let builder = builder.clone();
                tokio::spawn(async move { builder.ensure_ready().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(provider.calls(), 1);
        assert_eq!(builder.index().generation(), 1);
    }

    async fn gated_rebuild_with_waiting_init(
        provider: &Arc<FakeEmbeddings>,
        builder: &Arc<IndexBuilder>,
    ) -> (
        tokio::task::JoinHandle<Result<RebuildSummary, RagError>>,
        tokio::task::JoinHandle<Result<(), RagError>>,
    ) {
        provider.block_batches_containing("STARTUPMARK");
        let rebuild = {
            let builder = builder.clone();
            tokio::spawn(async move { builder.rebuild_all().await })
        };
        while provider.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        let lazy = {
            let builder = builder.clone();
            tokio::spawn(async move { builder.ensure_ready().await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        (rebuild, lazy)
    }

    fn startup_corpus() -> Arc<FakeDocuments> {
        Arc::new(FakeDocuments::with(vec![document(
            "d1",
            "startup.txt",
            None,
            &padded("STARTUPMARK stored before the server started"),
        )]))
    }

    #[tokio::test]
    async fn init_waiting_on_running_rebuild_does_not_rebuild_again() {
        let provider = Arc::new(FakeEmbeddings::new());
        let builder = Arc::new(builder(provider.clone(), startup_corpus(), fast_settings()));

        let (rebuild, lazy) = gated_rebuild_with_waiting_init(&provider, &builder).await;
        provider.release();
        rebuild.await.unwrap().unwrap();
        lazy.await.unwrap().unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(builder.index().generation(), 1);
        assert_eq!(builder.phase(), IndexPhase::Ready);
    }

    #[tokio::test]
    async fn init_waiting_on_running_rebuild_is_ready_even_if_provider_then_fails() {
        let provider = Arc::new(FakeEmbeddings::new());
        let builder = Arc::new(builder(provider.clone(), startup_corpus(), fast_settings()));

        let (rebuild, lazy) = gated_rebuild_with_waiting_init(&provider, &builder).await;
        provider.fail_on_batch(1);
        provider.release();
        rebuild.await.unwrap().unwrap();

        lazy.await.unwrap().unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(builder.phase(), IndexPhase::Ready);
        assert!(builder.index().contains_source("d1"));
    }

    #[tokio::test]
    async fn provider_recovery_lets_the_next_rebuild_succeed() {
        let provider = Arc::new(FakeEmbeddings::new());
        let builder = builder(provider.clone(), startup_corpus(), fast_settings());

        provider.fail_with_transient();
        assert!(builder.rebuild_all().await.is_err());
        assert_eq!(builder.phase(), IndexPhase::Uninitialized);

        provider.recover();
        builder.rebuild_all().await.unwrap();
        assert_eq!(builder.phase(), IndexPhase::Ready);
        assert!(builder.index().contains_source("d1"));
    }

    #[tokio::test]
    async fn append_during_rebuild_survives_the_swap() {
        let provider = Arc::new(FakeEmbeddings::new());
        let documents = Arc::new(FakeDocuments::with(vec![document(
            "d1",
            "slow.txt",
            None,
            &padded("SLOWMARK stored before the rebuild"),
        )]));
        let builder = Arc::new(builder(provider.clone(), documents, fast_settings()));
        provider.block_batches_containing("SLOWMARK");

        let rebuild = {
            let builder = builder.clone();
            tokio::spawn(async move { builder.rebuild_all().await })
        };
        while provider.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        let late = Chunk {
            text: "uploaded while the rebuild was running".to_string(),
            source_id: "late".to_string(),
            source_label: "late.txt".to_string(),
            folder_id: None,
        };
        builder.index().append(vec![late]).await.unwrap();
        provider.release();

        let summary = rebuild.await.unwrap().unwrap();
        assert_eq!(summary.carried_over, 1);
        assert!(builder.index().contains_source("d1"));
        assert!(builder.index().contains_source("late"));
    }

    #[tokio::test]
    async fn add_one_stops_at_failed_batch_and_keeps_earlier_ones() {
        let provider = Arc::new(FakeEmbeddings::new());
        let builder = builder(provider.clone(), Arc::new(FakeDocuments::default()), fast_settings());
        builder.ensure_ready().await.unwrap();

        // 15 chunks -> batches of 5: [0..5), [5..10), [10..15)
        let doc = document("d1", "lecture.txt", None, &text_with_chunks(15, "zeta"));
        assert_eq!(builder.chunks_for(&doc).unwrap().len(), 15);
        provider.fail_on_batch(2);

        match builder.add_one(&doc).await.unwrap() {
            AddOutcome::Partial {
                appended,
                total,
                failed_batch,
                error,
            } => {
                assert_eq!((appended, total, failed_batch), (5, 15, 2));
                assert!(error.contains("429"));
            }
            other => panic!("expected partial outcome, got {other:?}"),
        }

        let first = builder.index().query("zeta part0", 15).await.unwrap();
        assert!(first.iter().any(|r| r.chunk.text.contains("part0 ")));
        let stored: Vec<String> = builder
            .index()
            .snapshot()
            .iter()
            .map(|e| e.chunk.text.clone())
            .collect();
        assert_eq!(stored.len(), 5);
        assert!(stored.iter().all(|t| !t.contains("part12 ")));
    }

    #[tokio::test]
    async fn add_one_skips_short_and_already_indexed_documents() {
        let documents = Arc::new(FakeDocuments::default());
        let builder = builder(Arc::new(FakeEmbeddings::new()), documents.clone(), fast_settings());

        let short = document("s", "tiny.txt", None, "hello");
        assert_eq!(
            builder.add_one(&short).await.unwrap(),
            AddOutcome::Skipped(SkipReason::TooShort { chars: 5 })
        );

        let doc = document("d1", "a.txt", None, &padded("already stored"));
        documents.push(doc.clone());
        let fresh = IndexBuilder::new(
            Arc::new(VectorIndex::new(EmbeddingGateway::new(Arc::new(FakeEmbeddings::new())))),
            documents,
            fast_settings(),
        );
        // The lazy initial build covers the document, so it is not appended twice.
        assert_eq!(
            fresh.add_one(&doc).await.unwrap(),
            AddOutcome::Skipped(SkipReason::AlreadyIndexed)
        );
    }

    #[tokio::test]
    async fn add_one_surfaces_misconfiguration() {
        let provider = Arc::new(FakeEmbeddings::new());
        let builder = builder(provider.clone(), Arc::new(FakeDocuments::default()), fast_settings());
        builder.ensure_ready().await.unwrap();

        provider.fail_with_misconfiguration();
        let doc = document("d1", "a.txt", None, &padded("needs a key"));
        assert!(matches!(
            builder.add_one(&doc).await,
            Err(RagError::Misconfigured(_))
        ));
        assert!(builder.index().is_empty());
    }

    #[tokio::test]
    async fn add_one_reports_full_success() {
        let builder = builder(
            Arc::new(FakeEmbeddings::new()),
            Arc::new(FakeDocuments::default()),
            fast_settings(),
        );
        let doc = document("d1", "a.txt", Some("f"), &text_with_chunks(7, "omega"));

        assert_eq!(
            builder.add_one(&doc).await.unwrap(),
            AddOutcome::Indexed { chunks: 7, batches: 2 }
        );
        assert_eq!(builder.phase(), IndexPhase::Ready);
    }
}
