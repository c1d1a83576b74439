//! In-memory vector index with snapshot reads and staged rebuilds.
//!
//! Readers clone an `Arc` of the current entry list and scan it without holding the
//! lock, so a query always sees one complete generation of the index. Writers publish
//! a new list under a short write lock; nothing awaits while the lock is held.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use super::embedding::EmbeddingGateway;
use super::error::RagError;
use super::vector_math::rank_descending_by_cosine;

/// A fragment of one document, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub source_label: String,
    pub folder_id: Option<String>,
}

impl Chunk {
    /// True when `owner_id` names this chunk's document or its folder.
    pub fn belongs_to(&self, owner_id: &str) -> bool {
        self.source_id == owner_id || self.folder_id.as_deref() == Some(owner_id)
    }
}

#[derive(Debug, Clone)]
pub struct IndexedEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// What a committed rebuild published.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildSummary {
    pub entries: usize,
    pub carried_over: usize,
    pub dropped: usize,
    pub generation: u64,
}

#[derive(Default)]
struct IndexState {
    entries: Arc<Vec<IndexedEntry>>,
    dimension: Option<usize>,
    generation: u64,
    /// Appends published while a rebuild is in flight.
    pending: Option<Vec<IndexedEntry>>,
}

pub struct VectorIndex {
    gateway: EmbeddingGateway,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    pub fn new(gateway: EmbeddingGateway) -> Self {
        Self {
            gateway,
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    /// Embeds every chunk in one gateway call and publishes them together.
    ///
    /// Either all chunks are added or none are.
    pub async fn append(&self, chunks: Vec<Chunk>) -> Result<usize, RagError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let entries = self.embed_chunks(chunks).await?;
        let added = entries.len();
        self.publish(entries)?;
        Ok(added)
    }

    /// Embeds chunks without publishing them.
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexedEntry>, RagError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.gateway.embed_many(&texts).await?;
        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedEntry { chunk, vector })
            .collect())
    }

    fn publish(&self, entries: Vec<IndexedEntry>) -> Result<(), RagError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let expected = state.dimension.unwrap_or(entries[0].vector.len());
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.vector.len(),
            });
        }

        if let Some(pending) = state.pending.as_mut() {
            pending.extend(entries.iter().cloned());
        }
        Arc::make_mut(&mut state.entries).extend(entries);
        state.dimension = Some(expected);
        state.generation += 1;
        Ok(())
    }

    /// Top `k` chunks by descending cosine similarity to `question`.
    ///
    /// An empty index or `k == 0` yields no results and makes no embedding call.
    pub async fn query(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        let snapshot = self.snapshot();
        if k == 0 || snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.gateway.embed_one(question).await?;
        let expected = snapshot[0].vector.len();
        if query_vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }

        let ranked = rank_descending_by_cosine(
            &query_vector,
            snapshot.iter().map(|entry| entry.vector.as_slice()),
        );

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, score)| ScoredChunk {
                chunk: snapshot[idx].chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn snapshot(&self) -> Arc<Vec<IndexedEntry>> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_source(&self, source_id: &str) -> bool {
        self.snapshot()
            .iter()
            .any(|entry| entry.chunk.source_id == source_id)
    }

    pub fn generation(&self) -> u64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).generation
    }

    pub fn dimension(&self) -> Option<usize> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).dimension
    }

    /// Starts recording appends so they survive the coming swap.
    pub fn begin_rebuild(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.pending = Some(Vec::new());
    }

    pub fn abort_rebuild(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.pending = None;
    }

    /// Replaces the whole index with `entries` in one step.
    ///
    /// Appends recorded since [`VectorIndex::begin_rebuild`] are carried over unless their
    /// document is in `scanned`, which means the rebuild already read it.
    pub fn commit_rebuild(
        &self,
        entries: Vec<IndexedEntry>,
        scanned: &HashSet<String>,
    ) -> Result<RebuildSummary, RagError> {
        let dimension = entries.first().map(|e| e.vector.len());
        if let Some(expected) = dimension {
            if let Some(bad) = entries.iter().find(|e| e.vector.len() != expected) {
                self.abort_rebuild();
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: bad.vector.len(),
                });
            }
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let pending = state.pending.take().unwrap_or_default();

        let mut next = entries;
        let mut dimension = dimension;
        let mut carried_over = 0;
        let mut dropped = 0;
        for entry in pending {
            if scanned.contains(&entry.chunk.source_id) {
                continue;
            }
            let expected = *dimension.get_or_insert(entry.vector.len());
            if entry.vector.len() != expected {
                dropped += 1;
                continue;
            }
            next.push(entry);
            carried_over += 1;
        }

        let summary = RebuildSummary {
            entries: next.len(),
            carried_over,
            dropped,
            generation: state.generation + 1,
        };
        state.entries = Arc::new(next);
        state.dimension = dimension;
        state.generation = summary.generation;
        Ok(summary)
    }
}
