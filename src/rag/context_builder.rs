//! Context block and system instruction for answering.
//!
//! Retrieved chunks are joined in ranking order with [`CONTEXT_SEPARATOR`] and the
//! result is capped at a fixed character budget.

use super::index::ScoredChunk;

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const NO_CONTEXT: &str = "No relevant document context found.";

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_context_chars: usize,
}

impl ContextBuilder {
    pub fn new(max_context_chars: usize) -> Self {
        Self {
            max_context_chars: max_context_chars.max(1),
        }
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Joins chunk texts until the budget runs out. The chunk that crosses the
    /// budget is cut short and nothing after it is included.
    pub fn build_context(&self, chunks: &[ScoredChunk]) -> String {
        let mut context = String::new();
        let mut used = 0;

        for (i, scored) in chunks.iter().enumerate() {
            let separator_chars = if i == 0 { 0 } else { CONTEXT_SEPARATOR.chars().count() };
            let text_chars = scored.chunk.text.chars().count();

            if used + separator_chars >= self.max_context_chars {
                break;
            }
            if i > 0 {
                context.push_str(CONTEXT_SEPARATOR);
                used += separator_chars;
            }

            let remaining = self.max_context_chars - used;
            if text_chars > remaining {
                context.extend(scored.chunk.text.chars().take(remaining));
                break;
            }
            context.push_str(&scored.chunk.text);
            used += text_chars;
        }

        context
    }

    /// Distinct source labels in first-seen order, for logging.
    pub fn sources(chunks: &[ScoredChunk]) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for scored in chunks {
            if !sources.contains(&scored.chunk.source_label) {
                sources.push(scored.chunk.source_label.clone());
            }
        }
        sources
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(6000)
    }
}

pub fn build_system_instruction(context: &str) -> String {
    let context = if context.trim().is_empty() {
        NO_CONTEXT
    } else {
        context
    };

    format!(
        "You are a smart and friendly AI assistant for students.\n\
         \n\
         User Context (Documents):\n\
         {context}\n\
         \n\
         INSTRUCTIONS:\n\
         1. If the user asks a GENERAL question (greetings, \"explain quantum physics\"), \
         answer it directly from your own knowledge. Do not say you cannot find information.\n\
         2. If the user asks about their uploaded material, base your answer on the \
         \"User Context\" above.\n\
         3. Be flexible with languages and reply naturally in the language the user writes in."
    )
}
