pub mod chat_completions;
pub mod huggingface;
pub mod provider;
pub mod settings;
pub mod types;

pub use chat_completions::ChatCompletionsProvider;
pub use huggingface::HuggingFaceEmbeddings;
pub use provider::{CompletionProvider, EmbeddingProvider, ProviderError};
pub use settings::{CompletionSettings, EmbeddingSettings};
pub use types::{ChatMessage, CompletionRequest};
