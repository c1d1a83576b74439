use thiserror::Error;

use crate::llm::ProviderError;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("configuration error: {0}")]
    Misconfigured(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document source failed: {0}")]
    DocumentSource(String),
}

impl RagError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RagError::EmbeddingUnavailable(_) | RagError::DocumentSource(_))
    }
}

impl From<ProviderError> for RagError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Misconfigured(msg) => RagError::Misconfigured(msg),
            other => RagError::EmbeddingUnavailable(other.to_string()),
        }
    }
}
