//! Retrieval-augmented answering. Every path ends in some answer text.

use std::sync::Arc;

use crate::llm::{CompletionProvider, CompletionRequest, ProviderError};

use super::builder::IndexBuilder;
use super::context_builder::{build_system_instruction, ContextBuilder};
use super::error::RagError;
use super::index::ScoredChunk;
use super::settings::RagSettings;

pub const SERVICE_ERROR_ANSWER: &str =
    "I encountered an error connecting to the AI service. Please try again later.";

const CONFIGURATION_ERROR_PREFIX: &str = "I cannot answer right now. Configuration error: ";

/// Which chunks a question may draw on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalScope {
    Global,
    /// A document id or folder id.
    Owner(String),
}

impl RetrievalScope {
    /// Missing, blank and `"all"` mean global.
    pub fn from_request(scope_id: Option<&str>) -> Self {
        match scope_id.map(str::trim) {
            None | Some("") | Some("all") => RetrievalScope::Global,
            Some(id) => RetrievalScope::Owner(id.to_string()),
        }
    }
}

pub struct RagResponder {
    builder: Arc<IndexBuilder>,
    completion: Arc<dyn CompletionProvider>,
    context: ContextBuilder,
    settings: RagSettings,
}

impl RagResponder {
    pub fn new(
        builder: Arc<IndexBuilder>,
        completion: Arc<dyn CompletionProvider>,
        settings: RagSettings,
    ) -> Self {
        Self {
            builder,
            completion,
            context: ContextBuilder::new(settings.max_context_chars),
            settings,
        }
    }

    /// Global scope takes the top matches directly. Owner scope over-fetches, keeps
    /// the owner's chunks and takes the best of those.
    pub async fn retrieve(
        &self,
        question: &str,
        scope: &RetrievalScope,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        self.builder.ensure_ready().await?;
        let index = self.builder.index();

        match scope {
            RetrievalScope::Global => index.query(question, self.settings.global_top_k).await,
            RetrievalScope::Owner(owner_id) => {
                let candidates = index
                    .query(question, self.settings.scoped_candidates)
                    .await?;
                Ok(candidates
                    .into_iter()
                    .filter(|scored| scored.chunk.belongs_to(owner_id))
                    .take(self.settings.scoped_top_k)
                    .collect())
            }
        }
    }

    pub async fn answer(&self, question: &str, scope: &RetrievalScope) -> String {
        tracing::info!("Question received (scope: {:?})", scope);

        let chunks = match self.retrieve(question, scope).await {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!("Retrieval failed, proceeding with general knowledge: {}", err);
                Vec::new()
            }
        };
        if !chunks.is_empty() {
            tracing::debug!(
                "Retrieved {} chunks from {:?}",
                chunks.len(),
                ContextBuilder::sources(&chunks)
            );
        }

        let context = self.context.build_context(&chunks);
        let request = CompletionRequest::new(build_system_instruction(&context), question)
            .with_limits(self.settings.max_output_tokens, self.settings.temperature);

        let attempts = self.settings.answer_attempts.max(1);
        for attempt in 1..=attempts {
            tracing::info!(
                "Sending question to {} (attempt {}/{})",
                self.completion.name(),
                attempt,
                attempts
            );
            match self.completion.complete(&request).await {
                Ok(answer) if !answer.trim().is_empty() => return answer,
                Ok(_) => {
                    tracing::warn!("Completion attempt {} returned an empty answer", attempt);
                }
                Err(ProviderError::Misconfigured(message)) => {
                    tracing::warn!("Completion provider misconfigured: {}", message);
                    return format!("{CONFIGURATION_ERROR_PREFIX}{message}");
                }
                Err(err) => {
                    tracing::warn!("Completion attempt {} failed: {}", attempt, err);
                }
            }
            if attempt < attempts && !self.settings.answer_retry_delay.is_zero() {
                tokio::time::sleep(self.settings.answer_retry_delay).await;
            }
        }

        SERVICE_ERROR_ANSWER.to_string()
    }
}
