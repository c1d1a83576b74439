use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use super::types::CompletionRequest;

/// Failure reported by an external model provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Missing or rejected credentials, or a request the endpoint cannot serve
    /// (unknown model, bad parameters); retrying will not help.
    #[error("provider misconfigured: {0}")]
    Misconfigured(String),
    /// Network error, timeout, rate limit or 5xx.
    #[error("provider request failed: {0}")]
    Transient(String),
    /// The provider answered with an unexpected shape.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Everything except misconfiguration is worth retrying, malformed responses included.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Misconfigured(_))
    }

    pub fn from_status(provider: &str, status: StatusCode, body: &str) -> Self {
        let detail = format!("{} returned {}: {}", provider, status, body.trim());
        match status {
            StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::BAD_REQUEST
            | StatusCode::UNPROCESSABLE_ENTITY => ProviderError::Misconfigured(detail),
            _ => ProviderError::Transient(detail),
        }
    }

    pub fn from_request(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Transient(format!("{} request timed out", provider))
        } else {
            ProviderError::Transient(format!("{} request failed: {}", provider, err))
        }
    }
}

/// Maps a batch of strings to vectors, order-preserving.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Single-text embedding; providers may use a tighter timeout here.
    async fn embed_query(&self, input: &str) -> Result<Vec<f32>, ProviderError> {
        let inputs = [input.to_string()];
        let mut vectors = self.embed(&inputs).await?;
        if vectors.len() != 1 {
            return Err(ProviderError::Malformed(format!(
                "expected 1 query vector, got {}",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
