use super::GenerativeBackend;
use crate::config::ModelConfig;
use async_trait::async_trait;
use ragline_core::{RaglineError, RaglineResult};

/// Google Gemini `generateContent` backend.
pub struct GeminiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> RaglineResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url(),
            self.config.model_id
        );

        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
            },
        });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
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
                "Gemini API error {status}: {error_body}"
            )));
        }

        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RaglineError::Http(e.to_string()))?;

        parse_gemini_response(&resp_body)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Extract the answer text from a `generateContent` response body.
pub fn parse_gemini_response(body: &serde_json::Value) -> RaglineResult<String> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            let reason = body["candidates"][0]["finishReason"]
                .as_str()
                .or_else(|| body["promptFeedback"]["blockReason"].as_str())
                .unwrap_or("no candidates");
            RaglineError::Generation(format!("Gemini returned no content ({reason})"))
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(RaglineError::Generation(
            "Gemini returned an empty answer".into(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: String) -> ModelConfig {
        ModelConfig {
            provider: LlmProvider::Gemini,
            model_id: "gemini-1.5-flash".into(),
            api_key: "g-key".into(),
            api_base_url: Some(base),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_joins_parts() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Offset accounts " }, { "text": "save interest." }] }
            }]
        });
        assert_eq!(
            parse_gemini_response(&body).unwrap(),
            "Offset accounts save interest."
        );
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_gemini_response(&body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Hi there." }] } }]
            })))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new(config(server.uri()));
        assert_eq!(backend.generate("hello").await.unwrap(), "Hi there.");
    }

    #[tokio::test]
    async fn test_overload_status_is_visible() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503).set_body_string("The model is overloaded."),
            )
            .mount(&server)
            .await;

        let backend = GeminiBackend::new(config(server.uri()));
        let err = backend.generate("hello").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("503"), "{msg}");
        assert!(msg.contains("overloaded"), "{msg}");
    }
}
