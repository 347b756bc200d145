//! Hosted embedding providers (Gemini and OpenAI-compatible).
//!
//! Both map every transport, status, and decoding failure to
//! [`RaglineError::EmbeddingUnavailable`]. Retrying is left to the caller.

use async_trait::async_trait;
use ragline_core::{RaglineError, RaglineResult};
use serde::Deserialize;

use crate::embedding::EmbeddingProvider;

/// Default Gemini API base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Gemini `embedContent` provider (e.g. `text-embedding-004`, 768 dimensions).
pub struct GeminiEmbedding {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    dimension: usize,
}

impl GeminiEmbedding {
    /// Create a provider for `model_id` producing `dimension`-long vectors.
    pub fn new(
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        dimension: usize,
        base_url: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            dimension,
        }
    }
}

#[derive(Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiValues,
}

#[derive(Deserialize)]
struct GeminiValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> RaglineResult<Vec<f32>> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.base_url, self.model_id
        );
        let body = serde_json::json!({
            "model": format!("models/{}", self.model_id),
            "content": { "parts": [{ "text": text }] },
        });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RaglineError::EmbeddingUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RaglineError::EmbeddingUnavailable(format!(
                "Gemini embedding error {status}: {error_body}"
            )));
        }

        let parsed: GeminiEmbedResponse = resp
            .json()
            .await
            .map_err(|e| RaglineError::EmbeddingUnavailable(e.to_string()))?;
        check_dimension(parsed.embedding.values, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI-compatible `/v1/embeddings` provider.
pub struct OpenAiEmbedding {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    dimension: usize,
}

impl OpenAiEmbedding {
    /// Create a provider for `model_id` producing `dimension`-long vectors.
    pub fn new(
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        dimension: usize,
        base_url: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            dimension,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> RaglineResult<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model_id,
            "input": text,
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.trim()))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RaglineError::EmbeddingUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RaglineError::EmbeddingUnavailable(format!(
                "OpenAI embedding error {status}: {error_body}"
            )));
        }

        let parsed: OpenAiEmbedResponse = resp
            .json()
            .await
            .map_err(|e| RaglineError::EmbeddingUnavailable(e.to_string()))?;
        let values = parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .unwrap_or_default();
        check_dimension(values, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Reject empty vectors and, when a dimension is configured, mismatched ones.
fn check_dimension(values: Vec<f32>, expected: usize) -> RaglineResult<Vec<f32>> {
    if values.is_empty() {
        return Err(RaglineError::EmbeddingUnavailable(
            "provider returned an empty embedding".to_string(),
        ));
    }
    if expected > 0 && values.len() != expected {
        return Err(RaglineError::EmbeddingUnavailable(format!(
            "expected {expected}-dimensional embedding, got {}",
            values.len()
        )));
    }
    Ok(values)
}
