pub mod claude;
pub mod gemini;
pub mod openai;

use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use ragline_core::RaglineResult;
use std::sync::Arc;

pub use claude::ClaudeBackend;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

/// Trait for generative model backends.
///
/// A backend turns one fully assembled prompt into plain answer text. Failures
/// must keep the provider's status code and message in the error text so that
/// [`crate::retry::is_retryable`] can tell overload and rate limiting apart
/// from permanent errors.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `GenerativeBackend` for your struct
/// 3. Add the variant to `LlmProvider` in `config.rs`
/// 4. Wire it up in [`build_backend`]
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Generate an answer for `prompt`.
    async fn generate(&self, prompt: &str) -> RaglineResult<String>;

    /// Short provider name used in logs.
    fn name(&self) -> &'static str;
}

/// Build the backend selected by `config.provider`.
pub fn build_backend(config: ModelConfig) -> Arc<dyn GenerativeBackend> {
    match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiBackend::new(config)),
        LlmProvider::OpenAi => Arc::new(OpenAiBackend::new(config)),
        LlmProvider::Claude => Arc::new(ClaudeBackend::new(config)),
    }
}
