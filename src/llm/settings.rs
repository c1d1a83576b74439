use std::env;
use std::time::Duration;

use serde_json::Value;

use crate::core::config::access::{config_f64, config_str, config_u64};

const DEFAULT_EMBEDDING_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";
const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_COMPLETION_BASE_URL: &str = "https://router.huggingface.co/v1";
const DEFAULT_COMPLETION_MODEL: &str = "meta-llama/Meta-Llama-3-8B-Instruct";

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub query_timeout: Duration,
}

impl EmbeddingSettings {
    pub fn from_config(config: &Value) -> Self {
        Self::from_sources(config, |key| env::var(key).ok())
    }

    /// `lookup_env` is consulted only when the config carries no key.
    pub fn from_sources(config: &Value, lookup_env: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = config_str(config, &["embedding", "api_key"])
            .or_else(|| non_empty(lookup_env("HUGGINGFACE_API_KEY")));

        Self {
            base_url: config_str(config, &["embedding", "base_url"])
                .unwrap_or_else(|| DEFAULT_EMBEDDING_BASE_URL.to_string()),
            model: config_str(config, &["embedding", "model"])
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            api_key,
            timeout: Duration::from_secs(
                config_u64(config, &["embedding", "timeout_secs"]).unwrap_or(20),
            ),
            query_timeout: Duration::from_secs(
                config_u64(config, &["embedding", "query_timeout_secs"]).unwrap_or(10),
            ),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/pipeline/feature-extraction",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl CompletionSettings {
    pub fn from_config(config: &Value) -> Self {
        Self::from_sources(config, |key| env::var(key).ok())
    }

    /// The chat key falls back to the embedding key when no dedicated one is set.
    pub fn from_sources(config: &Value, lookup_env: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = config_str(config, &["completion", "api_key"])
            .or_else(|| non_empty(lookup_env("HUGGINGFACE_CHAT_KEY")))
            .or_else(|| config_str(config, &["embedding", "api_key"]))
            .or_else(|| non_empty(lookup_env("HUGGINGFACE_API_KEY")));

        Self {
            base_url: config_str(config, &["completion", "base_url"])
                .unwrap_or_else(|| DEFAULT_COMPLETION_BASE_URL.to_string()),
            model: config_str(config, &["completion", "model"])
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            api_key,
            max_tokens: config_u64(config, &["completion", "max_tokens"])
                .unwrap_or(500)
                .clamp(1, 100_000) as u32,
            temperature: config_f64(config, &["completion", "temperature"])
                .unwrap_or(0.7)
                .clamp(0.0, 2.0) as f32,
            timeout: Duration::from_secs(
                config_u64(config, &["completion", "timeout_secs"]).unwrap_or(60),
            ),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
