//! Contract checks around the external embedding capability.
//!
//! Whatever the provider returns, callers only ever see order-preserving, equal-length,
//! finite, uniformly-sized vectors, or an error. Zero vectors are never substituted.

use std::sync::Arc;

use crate::llm::EmbeddingProvider;

use super::error::RagError;

#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// One vector per input, same order. An empty batch never reaches the provider.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(idx) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(RagError::InvalidInput(format!(
                "embedding input {} is empty",
                idx
            )));
        }

        let vectors = self.provider.embed(texts).await?;

        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "{} returned {} vectors for {} inputs",
                self.provider.name(),
                vectors.len(),
                texts.len()
            )));
        }

        let dimension = vectors[0].len();
        for vector in &vectors {
            check_vector(vector)?;
            if vector.len() != dimension {
                return Err(RagError::EmbeddingUnavailable(format!(
                    "mixed vector sizes in one batch ({} vs {})",
                    dimension,
                    vector.len()
                )));
            }
        }

        Ok(vectors)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput("embedding input is empty".to_string()));
        }
        let vector = self.provider.embed_query(text).await?;
        check_vector(&vector)?;
        Ok(vector)
    }
}

fn check_vector(vector: &[f32]) -> Result<(), RagError> {
    if vector.is_empty() {
        return Err(RagError::EmbeddingUnavailable(
            "provider returned an empty vector".to_string(),
        ));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::EmbeddingUnavailable(
            "provider returned a non-finite value".to_string(),
        ));
    }
    Ok(())
}
