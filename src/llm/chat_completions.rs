use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{CompletionProvider, ProviderError};
use super::settings::CompletionSettings;
use super::types::CompletionRequest;

const PROVIDER: &str = "chat-completions";

/// OpenAI-compatible `/chat/completions` client (Hugging Face router, Groq, LM Studio...).
#[derive(Clone)]
pub struct ChatCompletionsProvider {
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl ChatCompletionsProvider {
    pub fn new(settings: &CompletionSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Misconfigured("HUGGINGFACE_CHAT_KEY missing".to_string())
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": request.messages(),
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "stream": false,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
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

        parse_chat_content(&payload)
    }
}

fn parse_chat_content(payload: &Value) -> Result<String, ProviderError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Malformed("Invalid Response Format".to_string()))
}
