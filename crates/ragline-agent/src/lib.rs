//! Grounded answer generation for the Ragline engine.
//!
//! Builds a numbered-context prompt from hybrid retrieval results, calls a
//! generative backend with exponential backoff on transient failures, and
//! falls back to an extractive answer when the model stays unavailable.
//!
//! # Main types
//!
//! - [`RagService`]: Retrieval plus generation, built once and shared.
//! - [`AnswerGenerator`]: Prompt, retry loop, fallback and source excerpts.
//! - [`GenerativeBackend`]: Trait for model providers (Gemini, OpenAI, Claude).
//! - [`RetryPolicy`]: Attempt budget and backoff with jitter.

/// Generative model backends.
pub mod backends;
/// Model and generation configuration.
pub mod config;
/// Source excerpts and meta-description extraction.
pub mod excerpt;
/// Answer generator and the retrieval + generation service.
pub mod generator;
/// Prompt assembly.
pub mod prompt;
/// Retry classification, backoff and sleeping.
pub mod retry;

pub use backends::{build_backend, ClaudeBackend, GeminiBackend, GenerativeBackend, OpenAiBackend};
pub use config::{GenerationConfig, LlmProvider, ModelConfig};
pub use generator::{
    fallback_answer, AnswerGenerator, RagService, RetrievalSettings, HIGH_DEMAND_NOTICE,
};
pub use retry::{is_retryable, RetryPolicy, Sleeper, TokioSleeper};
