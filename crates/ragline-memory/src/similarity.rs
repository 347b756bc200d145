use std::sync::Arc;

use ragline_core::{cosine_similarity, Chunk, RaglineError, RaglineResult, SearchResult};
use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::store::ChunkStore;
use crate::timeout::{with_timeout, RetrievalTimeouts};

/// Dense retrieval: full-scan cosine scoring of every stored vector.
pub struct SimilaritySearch {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeouts: RetrievalTimeouts,
}

impl SimilaritySearch {
    /// Create a search over `store` using `embedder` for query vectors.
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            timeouts: RetrievalTimeouts::default(),
        }
    }

    /// Replace the default call budgets.
    pub fn with_timeouts(mut self, timeouts: RetrievalTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Embed `query` with the configured provider.
    ///
    /// Timeouts stay [`RaglineError::Timeout`]; every other provider failure
    /// surfaces as [`RaglineError::EmbeddingUnavailable`].
    pub async fn embed_query(&self, query: &str) -> RaglineResult<Vec<f32>> {
        let vector = with_timeout(self.timeouts.embed, "query embedding", async {
            self.embedder.embed(query).await
        })
        .await
        .map_err(|e| match e {
            RaglineError::Timeout(_) | RaglineError::EmbeddingUnavailable(_) => e,
            other => RaglineError::EmbeddingUnavailable(other.to_string()),
        })?;

        if vector.is_empty() {
            return Err(RaglineError::EmbeddingUnavailable(
                "provider returned an empty query vector".to_string(),
            ));
        }
        Ok(vector)
    }

    /// Up to `limit` chunks whose cosine similarity to `query` is at least
    /// `threshold`, most similar first.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> RaglineResult<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embed_query(query).await?;
        let chunks =
            with_timeout(self.timeouts.store, "vector store scan", self.store.scan()).await?;

        let results = rank_by_cosine(&query_vector, chunks, threshold, limit);
        debug!(
            query,
            limit,
            threshold,
            hits = results.len(),
            "Similarity search complete"
        );
        Ok(results)
    }
}

/// Score `chunks` against `query_vector`, keep scores `>= threshold`, sort
/// descending (stable, so ties keep scan order) and truncate to `limit`.
///
/// Chunks without a vector, or whose vector has a different dimension, are
/// skipped.
pub fn rank_by_cosine(
    query_vector: &[f32],
    chunks: Vec<Chunk>,
    threshold: f32,
    limit: usize,
) -> Vec<SearchResult> {
    let mut skipped = 0usize;
    let mut results: Vec<SearchResult> = chunks
        .into_iter()
        .filter_map(|chunk| {
            if chunk.vector.len() != query_vector.len() {
                skipped += 1;
                return None;
            }
            match cosine_similarity(query_vector, &chunk.vector) {
                Some(score) => Some(SearchResult::new(chunk, score)),
                None => {
                    skipped += 1;
                    None
                }
            }
        })
        .filter(|r| r.score >= threshold)
        .collect();

    if skipped > 0 {
        warn!(skipped, "Chunks excluded from similarity scoring");
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}
