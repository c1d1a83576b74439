use std::time::Duration;

use serde_json::Value;

use crate::core::config::access::config_u64;

/// Tunables for chunking, indexing pace and answering.
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Documents whose trimmed text is not longer than this are not indexed.
    pub min_document_chars: usize,
    pub index_batch_size: usize,
    pub index_batch_delay: Duration,
    pub rebuild_batch_size: usize,
    pub startup_delay: Duration,
    pub global_top_k: usize,
    pub scoped_candidates: usize,
    pub scoped_top_k: usize,
    pub max_context_chars: usize,
    pub answer_attempts: usize,
    pub answer_retry_delay: Duration,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_document_chars: 50,
            index_batch_size: 5,
            index_batch_delay: Duration::from_secs(2),
            rebuild_batch_size: 32,
            startup_delay: Duration::from_secs(2),
            global_top_k: 3,
            scoped_candidates: 12,
            scoped_top_k: 3,
            max_context_chars: 6000,
            answer_attempts: 3,
            answer_retry_delay: Duration::from_secs(2),
            max_output_tokens: 500,
            temperature: 0.7,
        }
    }
}

impl RagSettings {
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: usize, min: usize, max: usize| -> usize {
            config_u64(config, &["rag", key])
                .map(|v| v as usize)
                .unwrap_or(default)
                .clamp(min, max)
        };
        let read_ms = |key: &str, default: Duration| -> Duration {
            config_u64(config, &["rag", key])
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        let chunk_size = read("chunk_size", defaults.chunk_size, 1, 100_000);
        let chunk_overlap = read("chunk_overlap", defaults.chunk_overlap, 0, chunk_size - 1);
        let completion = crate::llm::CompletionSettings::from_config(config);

        Self {
            chunk_size,
            chunk_overlap,
            min_document_chars: read("min_document_chars", defaults.min_document_chars, 0, 1_000_000),
            index_batch_size: read("index_batch_size", defaults.index_batch_size, 1, 1_000),
            index_batch_delay: read_ms("index_batch_delay_ms", defaults.index_batch_delay),
            rebuild_batch_size: read("rebuild_batch_size", defaults.rebuild_batch_size, 1, 10_000),
            startup_delay: read_ms("startup_delay_ms", defaults.startup_delay),
            global_top_k: read("global_top_k", defaults.global_top_k, 1, 100),
            scoped_candidates: read("scoped_candidates", defaults.scoped_candidates, 1, 1_000),
            scoped_top_k: read("scoped_top_k", defaults.scoped_top_k, 1, 100),
            max_context_chars: read("max_context_chars", defaults.max_context_chars, 1, 1_000_000),
            answer_attempts: read("answer_attempts", defaults.answer_attempts, 1, 10),
            answer_retry_delay: read_ms("answer_retry_delay_ms", defaults.answer_retry_delay),
            max_output_tokens: completion.max_tokens,
            temperature: completion.temperature,
        }
    }
}
