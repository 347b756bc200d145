use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ragline_core::{CorpusStats, RagResponse, RaglineError, RaglineResult, SearchResult, Source};
use ragline_memory::{
    with_timeout, ChunkStore, HybridRanker, DEFAULT_TEXT_WEIGHT, DEFAULT_VECTOR_WEIGHT,
};
use tracing::{debug, info, warn};

use crate::backends::GenerativeBackend;
use crate::config::GenerationConfig;
use crate::excerpt::{content_excerpt, source_excerpt, FALLBACK_EXCERPT_CHARS};
use crate::prompt::build_prompt;
use crate::retry::{is_retryable, RetryPolicy, Sleeper, TokioSleeper};

/// Opening sentence of every fallback answer.
pub const HIGH_DEMAND_NOTICE: &str =
    "I'm currently experiencing high demand and can't generate a detailed response right now. ";

/// Turns a ranked result list into an answer, retrying the model on transient
/// failures and falling back to an extractive answer otherwise.
///
/// Never fails: every path ends in a [`RagResponse`].
pub struct AnswerGenerator {
    backend: Arc<dyn GenerativeBackend>,
    store: Arc<dyn ChunkStore>,
    config: GenerationConfig,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl AnswerGenerator {
    /// Create a generator calling `backend` and enriching sources from `store`.
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        store: Arc<dyn ChunkStore>,
        config: GenerationConfig,
    ) -> Self {
        let policy = config.retry_policy();
        Self {
            backend,
            store,
            config,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Answer `question` from `results`, which must already be ranked.
    ///
    /// The returned sources always mirror `results` one to one, in order.
    pub async fn answer(&self, question: &str, results: &[SearchResult]) -> RagResponse {
        let prompt = build_prompt(&self.config.assistant_persona, question, results);
        let generated = self.generate_with_retry(&prompt).await;
        let sources = self.build_sources(results).await;

        match generated {
            Ok(answer) => RagResponse {
                answer,
                sources,
                degraded: false,
            },
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    error = %e,
                    sources = sources.len(),
                    "Generation unavailable, serving fallback answer"
                );
                RagResponse {
                    answer: fallback_answer(question, results, &self.config.site_url),
                    sources,
                    degraded: true,
                }
            }
        }
    }

    async fn generate_with_retry(&self, prompt: &str) -> RaglineResult<String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let budget = self.config.generation_timeout();
        let mut attempt = 1;

        loop {
            let outcome =
                with_timeout(budget, "generation", self.backend.generate(prompt)).await;
            let err = match outcome {
                Ok(answer) => {
                    let answer = answer.trim().to_string();
                    if !answer.is_empty() {
                        debug!(attempt, chars = answer.len(), "Generation succeeded");
                        return Ok(answer);
                    }
                    RaglineError::Generation("model returned an empty answer".into())
                }
                Err(e) => e,
            };

            if !is_retryable(&err) {
                warn!(attempt, error = %err, "Non-retryable generation error");
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(attempt, error = %err, "Generation retries exhausted");
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt, &mut rand::thread_rng());
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retryable generation error, backing off"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    async fn build_sources(&self, results: &[SearchResult]) -> Vec<Source> {
        let markup = self.lookup_markup(results).await;
        results
            .iter()
            .map(|r| Source {
                url: r.chunk.url.clone(),
                title: r.chunk.display_title().to_string(),
                excerpt: source_excerpt(
                    markup.get(&r.chunk.url).map(String::as_str),
                    &r.chunk.content,
                ),
                similarity: r.similarity(),
            })
            .collect()
    }

    /// Raw markup for the result URLs. Failures degrade to "no markup".
    async fn lookup_markup(&self, results: &[SearchResult]) -> HashMap<String, String> {
        let urls: HashSet<String> = results.iter().map(|r| r.chunk.url.clone()).collect();
        if urls.is_empty() {
            return HashMap::new();
        }
        let lookup = with_timeout(
            self.config.lookup_timeout(),
            "markup lookup",
            self.store.raw_markup(&urls),
        )
        .await;
        match lookup {
            Ok(markup) => markup,
            Err(e) => {
                warn!(
                    urls = urls.len(),
                    error = %e,
                    "Markup lookup failed, using content excerpts"
                );
                HashMap::new()
            }
        }
    }
}

/// Extractive answer used when the model cannot be reached.
pub fn fallback_answer(question: &str, results: &[SearchResult], site_url: &str) -> String {
    let mut answer = HIGH_DEMAND_NOTICE.to_string();
    match results.first() {
        Some(top) => {
            answer.push_str(&format!(
                "However, I found some relevant information about your question \"{question}\". \
                 You can find detailed information at: {}",
                top.chunk.url
            ));
            if !top.chunk.content.trim().is_empty() {
                answer.push_str(&format!(
                    "\n\nHere's a brief excerpt: \"{}\"",
                    content_excerpt(&top.chunk.content, FALLBACK_EXCERPT_CHARS)
                ));
            }
        }
        None => {
            answer.push_str(&format!(
                "I couldn't find specific details about that in the site content. \
                 Please try asking your question again in a moment, or visit {site_url} \
                 for more information."
            ));
        }
    }
    answer
}

/// Retrieval parameters the service uses for every question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    /// Number of ranked results fed to the prompt.
    pub limit: usize,
    /// Weight of the vector path.
    pub vector_weight: f32,
    /// Weight of the lexical path.
    pub text_weight: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            limit: 5,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            text_weight: DEFAULT_TEXT_WEIGHT,
        }
    }
}

/// Retrieval plus generation for one corpus.
///
/// Built once at startup and shared behind an `Arc`; holds no per-request
/// state, so concurrent questions need no locking.
pub struct RagService {
    store: Arc<dyn ChunkStore>,
    ranker: HybridRanker,
    generator: AnswerGenerator,
    retrieval: RetrievalSettings,
}

impl RagService {
    /// Bundle a ranker and generator over `store`.
    pub fn new(
        store: Arc<dyn ChunkStore>,
        ranker: HybridRanker,
        generator: AnswerGenerator,
    ) -> Self {
        Self {
            store,
            ranker,
            generator,
            retrieval: RetrievalSettings::default(),
        }
    }

    /// Replace the default retrieval parameters.
    pub fn with_retrieval(mut self, retrieval: RetrievalSettings) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// The hybrid ranker used for retrieval.
    pub fn ranker(&self) -> &HybridRanker {
        &self.ranker
    }

    /// Statistics of the underlying corpus.
    pub async fn stats(&self) -> RaglineResult<CorpusStats> {
        self.store.stats().await
    }

    /// Retrieve context for `question` and answer it.
    ///
    /// Only retrieval failures (embedding, store, retrieval timeout) are
    /// returned as errors. Generation failures end in a degraded response.
    pub async fn generate_response(&self, question: &str) -> RaglineResult<RagResponse> {
        let results = self
            .ranker
            .search(
                question,
                self.retrieval.limit,
                self.retrieval.vector_weight,
                self.retrieval.text_weight,
            )
            .await?;
        debug!(question, results = results.len(), "Retrieved context");
        Ok(self.generator.answer(question, &results).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragline_core::Chunk;
    use ragline_memory::{ChunkRecord, InMemoryChunkStore, PageRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned outcomes, repeating the last one.
    struct ScriptedBackend {
        script: Vec<Result<String, String>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<&str, &str>>) -> Self {
            Self {
                script: script
                    .into_iter()
                    .map(|r| r.map(String::from).map_err(String::from))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> RaglineResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.get(n).or(self.script.last()).cloned().unwrap();
            step.map_err(RaglineError::Http)
        }
        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    fn result(url: &str, content: &str, score: f32) -> SearchResult {
        SearchResult::new(
            Chunk {
                id: format!("{url}#0"),
                page_id: url.into(),
                url: url.into(),
                title: None,
                content: content.into(),
                vector: Vec::new(),
                metadata: Default::default(),
                chunk_index: None,
                created_at: None,
            },
            score,
        )
    }

    fn generator(
        backend: Arc<ScriptedBackend>,
        store: Arc<InMemoryChunkStore>,
        sleeper: Arc<RecordingSleeper>,
    ) -> AnswerGenerator {
        AnswerGenerator::new(backend, store, GenerationConfig::default()).with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("  Offsets save interest.  ")]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let gen = generator(backend.clone(), Arc::default(), sleeper.clone());

        let resp = gen
            .answer("q", &[result("https://x/a", "Offset text", 1.3)])
            .await;
        assert_eq!(resp.answer, "Offsets save interest.");
        assert!(!resp.degraded);
        assert_eq!(resp.sources.len(), 1);
        assert_eq!(resp.sources[0].title, "Untitled");
        assert_eq!(resp.sources[0].excerpt, "Offset text...");
        assert_eq!(resp.sources[0].similarity, 1.0);
        assert_eq!(backend.calls(), 1);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err("Gemini API error 429 Too Many Requests: quota"),
            Ok("Recovered."),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let gen = generator(backend.clone(), Arc::default(), sleeper.clone());

        let resp = gen.answer("q", &[result("https://x/a", "text", 0.8)]).await;
        assert_eq!(resp.answer, "Recovered.");
        assert_eq!(backend.calls(), 2);

        let delays = sleeper.0.lock().unwrap().clone();
        assert_eq!(delays.len(), 1);
        assert!(delays[0] >= Duration::from_millis(1000) && delays[0] < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_retry_ceiling_is_three_calls() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(
            "Gemini API error 503 Service Unavailable: overloaded",
        )]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let gen = generator(backend.clone(), Arc::default(), sleeper.clone());

        let results = [
            result("https://x/a", "first", 0.9),
            result("https://x/b", "second", 0.7),
        ];
        let resp = gen.answer("What is redraw?", &results).await;
        assert_eq!(backend.calls(), 3);
        assert!(resp.degraded);
        assert_eq!(resp.sources.len(), 2);
        assert!(resp.answer.starts_with(HIGH_DEMAND_NOTICE));

        let delays = sleeper.0.lock().unwrap().clone();
        assert_eq!(delays.len(), 2);
        assert!(delays[0] >= Duration::from_millis(1000) && delays[0] < Duration::from_millis(2000));
        assert!(delays[1] >= Duration::from_millis(2000) && delays[1] < Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_non_retryable_falls_back_immediately() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(
            "Gemini API error 401 Unauthorized: bad key",
        )]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let gen = generator(backend.clone(), Arc::default(), sleeper.clone());

        let resp = gen.answer("q", &[result("https://x/a", "text", 0.9)]).await;
        assert_eq!(backend.calls(), 1);
        assert!(resp.degraded);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_answer_falls_back() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("   ")]));
        let gen = generator(backend.clone(), Arc::default(), Arc::default());
        let resp = gen.answer("q", &[]).await;
        assert!(resp.degraded);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_meta_description_enriches_sources() {
        let store = InMemoryChunkStore::new();
        store
            .add_page(PageRecord {
                id: "p1".into(),
                url: "https://x/a".into(),
                title: Some("Offsets".into()),
                raw_html: Some(r#"<meta name="description" content="All about offsets">"#.into()),
            })
            .await;
        store
            .add_chunk(ChunkRecord::new("c1", "p1", "chunk body", vec![1.0]))
            .await
            .unwrap();
        let backend = Arc::new(ScriptedBackend::new(vec![Err("401")]));
        let gen = generator(backend, Arc::new(store), Arc::default());

        let resp = gen
            .answer(
                "q",
                &[
                    result("https://x/a", "chunk body", 0.9),
                    result("https://x/missing", "other body", 0.4),
                ],
            )
            .await;
        assert_eq!(resp.sources[0].excerpt, "All about offsets");
        assert_eq!(resp.sources[1].excerpt, "other body...");
    }

    #[test]
    fn test_fallback_with_top_result() {
        let long = "x".repeat(400);
        let answer = fallback_answer("Can I refinance?", &[result("https://x/r", &long, 0.9)], "site");
        assert!(answer.contains("your question \"Can I refinance?\""));
        assert!(answer.contains("You can find detailed information at: https://x/r"));
        let excerpt = format!("\"{}...\"", "x".repeat(300));
        assert!(answer.ends_with(&excerpt));
    }

    #[test]
    fn test_fallback_without_results() {
        let answer = fallback_answer("anything", &[], "unloan.com.au");
        assert!(answer.starts_with(HIGH_DEMAND_NOTICE));
        assert!(answer.contains("couldn't find specific details"));
        assert!(answer.contains("visit unloan.com.au"));
    }

    #[tokio::test]
    async fn test_service_propagates_retrieval_failure() {
        struct DownEmbedding;

        #[async_trait]
        impl ragline_memory::EmbeddingProvider for DownEmbedding {
            async fn embed(&self, _t: &str) -> RaglineResult<Vec<f32>> {
                Err(RaglineError::EmbeddingUnavailable("offline".into()))
            }
            fn dimension(&self) -> usize {
                1
            }
        }

        let store: Arc<InMemoryChunkStore> = Arc::default();
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("unused")]));
        let service = RagService::new(
            store.clone(),
            HybridRanker::new(store.clone(), Arc::new(DownEmbedding)),
            generator(backend.clone(), store, Arc::default()),
        );
        let err = service.generate_response("q").await.unwrap_err();
        assert!(matches!(err, RaglineError::EmbeddingUnavailable(_)));
        assert_eq!(backend.calls(), 0);
    }
}
