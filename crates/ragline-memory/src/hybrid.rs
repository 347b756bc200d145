//! Weighted fusion of dense and lexical rankings.
//!
//! Both sources are oversampled, each list earns a small positional bonus, and
//! pages found by both methods have their weighted scores summed:
//!
//! ```text
//! bonus(i, N)  = (N - i) / N * 0.1
//! vector_score = similarity * vector_weight + bonus      (best chunk of the page)
//! text_score   = sum(text_score * text_weight + bonus)   (every matching chunk)
//! final(page)  = vector_score(page) + text_score(page)
//! ```
//!
//! The result is a ranking heuristic, not a normalized probability.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ragline_core::{RaglineResult, SearchResult};
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::lexical::LexicalSearch;
use crate::similarity::SimilaritySearch;
use crate::store::ChunkStore;
use crate::timeout::RetrievalTimeouts;

/// Default weight of the vector path.
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.7;
/// Default weight of the lexical path.
pub const DEFAULT_TEXT_WEIGHT: f32 = 0.3;
/// Candidate pool size relative to the requested limit.
pub const OVERSAMPLE_FACTOR: usize = 2;
/// Similarity threshold applied to the vector candidate pool.
pub const RELAXED_THRESHOLD: f32 = 0.5;
/// Upper bound of the per-list positional bonus.
pub const RANK_BONUS_SCALE: f32 = 0.1;

/// Positional bonus for the item at 0-based `index` in a list of `len` items.
///
/// Lies in `(0, RANK_BONUS_SCALE]` for every valid index.
pub fn rank_bonus(index: usize, len: usize) -> f32 {
    if len == 0 || index >= len {
        return 0.0;
    }
    (len - index) as f32 / len as f32 * RANK_BONUS_SCALE
}

/// Fuse the two candidate lists into one ranking of at most `limit` results.
///
/// Results are keyed by `page_id`. In the vector list only the best-ranked
/// chunk of a page counts. In the text list every matching chunk adds its
/// weighted score and bonus, so pages hit by several chunks rise. Across
/// lists the weighted scores add up. The merged
/// ranking keeps first-seen order for equal scores (vector list first), so
/// identical inputs always produce identical output.
pub fn fuse(
    vector_results: &[SearchResult],
    text_results: &[SearchResult],
    vector_weight: f32,
    text_weight: f32,
    limit: usize,
) -> Vec<SearchResult> {
    let mut order: Vec<SearchResult> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    let mut accumulate = |list: &[SearchResult], weight: f32, best_chunk_only: bool| {
        let mut seen_in_list: HashSet<&str> = HashSet::new();
        let n = list.len();
        for (i, result) in list.iter().enumerate() {
            let page = result.chunk.page_id.as_str();
            if !seen_in_list.insert(page) && best_chunk_only {
                continue;
            }
            let weighted = result.score * weight + rank_bonus(i, n);
            match slots.get(page) {
                Some(&slot) => order[slot].score += weighted,
                None => {
                    slots.insert(page.to_string(), order.len());
                    order.push(SearchResult::new(result.chunk.clone(), weighted));
                }
            }
        }
    };

    accumulate(vector_results, vector_weight, true);
    accumulate(text_results, text_weight, false);

    order.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(limit);
    order
}

/// Hybrid retrieval over one store: vector pool, then text pool, then fusion.
pub struct HybridRanker {
    similarity: SimilaritySearch,
    lexical: LexicalSearch,
}

impl HybridRanker {
    /// Create a ranker over `store` using `embedder` for query vectors.
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            similarity: SimilaritySearch::new(store.clone(), embedder),
            lexical: LexicalSearch::new(store),
        }
    }

    /// Apply `timeouts` to every embedding and store call.
    pub fn with_timeouts(self, timeouts: RetrievalTimeouts) -> Self {
        Self {
            similarity: self.similarity.with_timeouts(timeouts),
            lexical: self.lexical.with_timeouts(timeouts),
        }
    }

    /// The dense search this ranker draws its vector pool from.
    pub fn similarity(&self) -> &SimilaritySearch {
        &self.similarity
    }

    /// The lexical search this ranker draws its text pool from.
    pub fn lexical(&self) -> &LexicalSearch {
        &self.lexical
    }

    /// Fused ranking of at most `limit` results.
    ///
    /// The pools are fetched sequentially, vector first. Any embedding, store
    /// or timeout failure aborts the search.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        vector_weight: f32,
        text_weight: f32,
    ) -> RaglineResult<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let pool = limit.saturating_mul(OVERSAMPLE_FACTOR);

        let vector_results = self
            .similarity
            .search(query, pool, RELAXED_THRESHOLD)
            .await?;
        let text_results = self.lexical.search(query, pool).await?;

        let fused = fuse(
            &vector_results,
            &text_results,
            vector_weight,
            text_weight,
            limit,
        );
        debug!(
            query,
            limit,
            vector_hits = vector_results.len(),
            text_hits = text_results.len(),
            results = fused.len(),
            "Hybrid search complete"
        );
        Ok(fused)
    }

    /// [`HybridRanker::search`] with the default 0.7 / 0.3 weights.
    pub async fn search_default(
        &self,
        query: &str,
        limit: usize,
    ) -> RaglineResult<Vec<SearchResult>> {
        self.search(query, limit, DEFAULT_VECTOR_WEIGHT, DEFAULT_TEXT_WEIGHT)
            .await
    }
}
