//! Retrieval-augmented answering over uploaded documents.
//!
//! - [`TextSegmenter`] cuts document text into overlapping windows
//! - [`EmbeddingGateway`] checks what the embedding provider returns
//! - [`VectorIndex`] holds embedded chunks and ranks them by cosine similarity
//! - [`IndexBuilder`] rebuilds the index or adds one document in paced batches
//! - [`RagResponder`] retrieves context and asks the completion provider
//! - [`RagService`] ties these together behind a job queue

pub mod builder;
pub mod context_builder;
pub mod embedding;
pub mod error;
pub mod index;
pub mod queue;
pub mod responder;
pub mod segmenter;
pub mod service;
pub mod settings;
pub mod vector_math;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{AddOutcome, IndexBuilder, IndexPhase, SkipReason};
pub use embedding::EmbeddingGateway;
pub use error::RagError;
pub use index::{Chunk, ScoredChunk, VectorIndex};
pub use queue::{spawn_index_worker, IndexJob, IndexJobReceiver, IndexQueue};
pub use responder::{RagResponder, RetrievalScope, SERVICE_ERROR_ANSWER};
pub use segmenter::TextSegmenter;
pub use service::{RagService, RagStats};
pub use settings::RagSettings;
