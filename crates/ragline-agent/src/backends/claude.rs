use super::GenerativeBackend;
use crate::config::ModelConfig;
use async_trait::async_trait;
use ragline_core::{RaglineError, RaglineResult};

/// Claude (Anthropic) messages API backend.
pub struct ClaudeBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ClaudeBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for ClaudeBackend {
    async fn generate(&self, prompt: &str) -> RaglineResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url());

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
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
                "Claude API error {status}: {error_body}"
            )));
        }

        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RaglineError::Http(e.to_string()))?;

        parse_claude_response(&resp_body)
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

/// Join the text blocks of a messages API response.
pub fn parse_claude_response(body: &serde_json::Value) -> RaglineResult<String> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| RaglineError::Generation("Missing content in Claude response".into()))?;

    let text = content
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(RaglineError::Generation(
            "Claude returned an empty answer".into(),
        ));
    }
    Ok(text)
}
