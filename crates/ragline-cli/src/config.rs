use ragline_agent::{GenerationConfig, ModelConfig, RetrievalSettings};
use ragline_memory::RetrievalTimeouts;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level `ragline.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RaglineConfig {
    pub model: ModelConfig,
    pub embedding: EmbeddingConfig,
    pub corpus: CorpusConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Gemini,
    OpenAi,
    /// Offline hashed bag-of-words, no API key needed.
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model_id: String,
    pub dimension: usize,
    pub api_key: String,
    pub api_base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Gemini,
            model_id: "text-embedding-004".to_string(),
            dimension: 768,
            api_key: String::new(),
            api_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory holding `pages.jsonl` and `chunks.jsonl`.
    pub dir: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/corpus"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub limit: usize,
    pub vector_weight: f32,
    pub text_weight: f32,
    pub embed_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let settings = RetrievalSettings::default();
        Self {
            limit: settings.limit,
            vector_weight: settings.vector_weight,
            text_weight: settings.text_weight,
            embed_timeout_secs: 15,
            search_timeout_secs: 15,
        }
    }
}

impl RetrievalConfig {
    pub fn settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            limit: self.limit,
            vector_weight: self.vector_weight,
            text_weight: self.text_weight,
        }
    }

    /// Call budgets; 0 seconds disables a limit.
    pub fn timeouts(&self) -> RetrievalTimeouts {
        let budget = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        RetrievalTimeouts {
            embed: budget(self.embed_timeout_secs),
            store: budget(self.search_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl RaglineConfig {
    /// Read and parse the TOML file at `path`, then fill API keys from the
    /// environment and validate.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let mut config = Self::parse(&raw)?;
        config.resolve_api_keys(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Fill empty API keys using `lookup` (the process environment in
    /// production).
    pub fn resolve_api_keys(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.trim().is_empty() {
            if let Some(key) = lookup(self.model.provider.api_key_env()) {
                self.model.api_key = key;
            }
        }
        let embedding_env = match self.embedding.provider {
            EmbeddingProviderKind::Gemini => Some("GOOGLE_API_KEY"),
            EmbeddingProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            EmbeddingProviderKind::Local => None,
        };
        if let Some(var) = embedding_env {
            if self.embedding.api_key.trim().is_empty() {
                if let Some(key) = lookup(var) {
                    self.embedding.api_key = key;
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.retrieval;
        if r.limit == 0 {
            anyhow::bail!("retrieval.limit must be at least 1");
        }
        for (name, w) in [("vector_weight", r.vector_weight), ("text_weight", r.text_weight)] {
            if !w.is_finite() || w < 0.0 {
                anyhow::bail!("retrieval.{name} must be a non-negative number, got {w}");
            }
        }
        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be at least 1");
        }
        if self.generation.max_attempts == 0 {
            anyhow::bail!("generation.max_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ragline_agent::LlmProvider;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = RaglineConfig::parse("").unwrap();
        assert_eq!(cfg.model.provider, LlmProvider::Gemini);
        assert_eq!(cfg.model.model_id, "gemini-1.5-flash");
        assert_eq!(cfg.embedding.model_id, "text-embedding-004");
        assert_eq!(cfg.embedding.dimension, 768);
        assert_eq!(cfg.retrieval.limit, 5);
        assert_eq!(cfg.retrieval.vector_weight, 0.7);
        assert_eq!(cfg.retrieval.text_weight, 0.3);
        assert_eq!(cfg.generation.max_attempts, 3);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_full_file() {
        let cfg = RaglineConfig::parse(
            r#"
            [model]
            provider = "claude"
            model_id = "claude-sonnet-4-20250514"

            [embedding]
            provider = "local"
            dimension = 256

            [corpus]
            dir = "/srv/corpus"

            [retrieval]
            limit = 8
            embed_timeout_secs = 0

            [generation]
            site_url = "example.com"

            [server]
            port = 8080

            [logging]
            format = "pretty"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.model.provider, LlmProvider::Claude);
        assert_eq!(cfg.embedding.provider, EmbeddingProviderKind::Local);
        assert_eq!(cfg.corpus.dir, PathBuf::from("/srv/corpus"));
        assert_eq!(cfg.retrieval.settings().limit, 8);
        assert_eq!(cfg.retrieval.timeouts().embed, None);
        assert_eq!(cfg.retrieval.timeouts().store, Some(Duration::from_secs(15)));
        assert_eq!(cfg.generation.site_url, "example.com");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_api_keys_from_env() {
        let mut cfg = RaglineConfig::parse("[model]\nprovider = \"openai\"\n").unwrap();
        cfg.resolve_api_keys(|name| match name {
            "OPENAI_API_KEY" => Some("sk-env".into()),
            "GOOGLE_API_KEY" => Some("g-env".into()),
            _ => None,
        });
        assert_eq!(cfg.model.api_key, "sk-env");
        assert_eq!(cfg.embedding.api_key, "g-env");
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut cfg = RaglineConfig::parse("[model]\napi_key = \"from-file\"\n").unwrap();
        cfg.resolve_api_keys(|_| Some("from-env".into()));
        assert_eq!(cfg.model.api_key, "from-file");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cfg = RaglineConfig::parse("[retrieval]\nlimit = 0\n").unwrap();
        assert!(cfg.validate().is_err());
        let cfg = RaglineConfig::parse("[retrieval]\ntext_weight = -1.0\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RaglineConfig::load(&tmp.path().join("nope.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
