use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Generative model provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Google Gemini `generateContent` API.
    #[default]
    Gemini,
    /// OpenAI-compatible chat completions API.
    OpenAi,
    /// Anthropic messages API.
    Claude,
}

impl LlmProvider {
    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GOOGLE_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

/// Connection settings for the generative backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model_id() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model_id: default_model_id(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ModelConfig {
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::Claude => "https://api.anthropic.com",
            }
        }
    }
}

/// Answer generation settings: retry budget, call budgets and fallback copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Total generation attempts per question, including the first.
    pub max_attempts: u32,
    /// Backoff base in milliseconds, doubled per attempt.
    pub backoff_base_ms: u64,
    /// Upper bound of the uniform random jitter added to each delay.
    pub jitter_ms: u64,
    /// Budget for one generation call. 0 disables the limit.
    pub timeout_secs: u64,
    /// Budget for the raw markup lookup. 0 disables the limit.
    pub lookup_timeout_secs: u64,
    /// General site the fallback answer points to when nothing was found.
    pub site_url: String,
    /// Who the assistant is, completing "You are ...".
    pub assistant_persona: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
            jitter_ms: 1000,
            timeout_secs: 30,
            lookup_timeout_secs: 5,
            site_url: "unloan.com.au".to_string(),
            assistant_persona: "a helpful assistant that answers questions about home loans \
                                and financial services using Unloan's information"
                .to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base_ms: self.backoff_base_ms,
            jitter_ms: self.jitter_ms,
        }
    }

    pub fn generation_timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn lookup_timeout(&self) -> Option<Duration> {
        (self.lookup_timeout_secs > 0).then(|| Duration::from_secs(self.lookup_timeout_secs))
    }
}
