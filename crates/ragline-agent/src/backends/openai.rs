use super::GenerativeBackend;
use crate::config::ModelConfig;
use async_trait::async_trait;
use ragline_core::{RaglineError, RaglineResult};

/// OpenAI-compatible chat completions backend.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiBackend {
    async fn generate(&self, prompt: &str) -> RaglineResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .http
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.trim()),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RaglineError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RaglineError::Http(format!(
                "OpenAI API error {status}: {error_body}"
            )));
        }

        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RaglineError::Http(e.to_string()))?;

        parse_openai_response(&resp_body)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Extract the first choice's message text from a chat completions body.
pub fn parse_openai_response(body: &serde_json::Value) -> RaglineResult<String> {
    let text = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| RaglineError::Generation("Missing content in OpenAI response".into()))?;
    if text.trim().is_empty() {
        return Err(RaglineError::Generation(
            "OpenAI returned an empty answer".into(),
        ));
    }
    Ok(text.to_string())
}
