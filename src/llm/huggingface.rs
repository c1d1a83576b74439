//! Hugging Face feature-extraction client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{EmbeddingProvider, ProviderError};
use super::settings::EmbeddingSettings;

const PROVIDER: &str = "huggingface-embeddings";

#[derive(Clone)]
pub struct HuggingFaceEmbeddings {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    query_timeout: Duration,
}

impl HuggingFaceEmbeddings {
    pub fn new(settings: &EmbeddingSettings) -> Self {
        Self {
            client: Client::new(),
            endpoint: settings.endpoint(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
            query_timeout: settings.query_timeout,
        }
    }

    async fn request(
        &self,
        inputs: &[String],
        timeout: Duration,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Misconfigured("HUGGINGFACE_API_KEY missing".to_string())
        })?;

        tracing::debug!("Embedding {} text(s) via {}", inputs.len(), self.endpoint);

        let body = json!({
            "inputs": inputs,
            "options": { "wait_for_model": true },
        });

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_request(PROVIDER, e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(PROVIDER, status, &text));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", PROVIDER, e)))?;

        parse_feature_extraction(&payload, inputs.len())
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddings {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.request(inputs, self.timeout).await
    }

    async fn embed_query(&self, input: &str) -> Result<Vec<f32>, ProviderError> {
        let inputs = [input.to_string()];
        let mut vectors = self.request(&inputs, self.query_timeout).await?;
        if vectors.len() != 1 {
            return Err(ProviderError::Malformed(format!(
                "expected 1 query vector, got {}",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

/// Accepts `[[f32; d]; n]`, or a flat `[f32; d]` when a single input was sent.
fn parse_feature_extraction(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
    let rows = payload.as_array().ok_or_else(|| {
        ProviderError::Malformed("feature-extraction response is not an array".to_string())
    })?;

    if expected == 1 && !rows.is_empty() && rows.iter().all(Value::is_number) {
        return Ok(vec![numbers(rows)?]);
    }

    rows.iter()
        .map(|row| {
            let items = row.as_array().ok_or_else(|| {
                ProviderError::Malformed("feature-extraction row is not an array".to_string())
            })?;
            numbers(items)
        })
        .collect()
}

fn numbers(items: &[Value]) -> Result<Vec<f32>, ProviderError> {
    items
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                ProviderError::Malformed("feature-extraction value is not a number".to_string())
            })
        })
        .collect()
}
