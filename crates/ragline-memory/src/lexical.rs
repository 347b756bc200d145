use std::sync::Arc;

use ragline_core::{RaglineResult, SearchResult};
use tracing::debug;

use crate::store::ChunkStore;
use crate::timeout::{with_timeout, RetrievalTimeouts};

/// Divisor mapping raw text-index scores onto roughly the cosine scale.
///
/// A fixed heuristic, not a calibrated normalization: scores above
/// `TEXT_SCORE_SCALE` still produce values greater than 1.
pub const TEXT_SCORE_SCALE: f32 = 10.0;

/// Sparse retrieval through the store's text index.
pub struct LexicalSearch {
    store: Arc<dyn ChunkStore>,
    timeouts: RetrievalTimeouts,
}

impl LexicalSearch {
    /// Create a search over `store`.
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self {
            store,
            timeouts: RetrievalTimeouts::default(),
        }
    }

    /// Replace the default call budgets.
    pub fn with_timeouts(mut self, timeouts: RetrievalTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Up to `limit` lexical matches for `query`, scored `raw / TEXT_SCORE_SCALE`.
    pub async fn search(&self, query: &str, limit: usize) -> RaglineResult<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let hits = with_timeout(
            self.timeouts.store,
            "text index query",
            self.store.text_search(query, limit),
        )
        .await?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .take(limit)
            .map(|(chunk, raw)| SearchResult::new(chunk, raw / TEXT_SCORE_SCALE))
            .collect();
        debug!(query, limit, hits = results.len(), "Lexical search complete");
        Ok(results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{ChunkRecord, InMemoryChunkStore, PageRecord};
    use async_trait::async_trait;
    use ragline_core::{Chunk, CorpusStats, RaglineError};
    use std::collections::{HashMap, HashSet};

    /// Returns canned raw scores.
    struct CannedIndex(Vec<(Chunk, f32)>);

    #[async_trait]
    impl ChunkStore for CannedIndex {
        async fn scan(&self) -> RaglineResult<Vec<Chunk>> {
            Ok(Vec::new())
        }
        async fn text_search(&self, _q: &str, limit: usize) -> RaglineResult<Vec<(Chunk, f32)>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
        async fn raw_markup(&self, _u: &HashSet<String>) -> RaglineResult<HashMap<String, String>> {
            Ok(HashMap::new())
        }
        async fn chunks_for_page(&self, _p: &str) -> RaglineResult<Vec<Chunk>> {
            Ok(Vec::new())
        }
        async fn stats(&self) -> RaglineResult<CorpusStats> {
            Ok(CorpusStats::default())
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl ChunkStore for BrokenIndex {
        async fn scan(&self) -> RaglineResult<Vec<Chunk>> {
            Err(RaglineError::Store("down".into()))
        }
        async fn text_search(&self, _q: &str, _l: usize) -> RaglineResult<Vec<(Chunk, f32)>> {
            Err(RaglineError::Store("index offline".into()))
        }
        async fn raw_markup(&self, _u: &HashSet<String>) -> RaglineResult<HashMap<String, String>> {
            Err(RaglineError::Store("down".into()))
        }
        async fn chunks_for_page(&self, _p: &str) -> RaglineResult<Vec<Chunk>> {
            Err(RaglineError::Store("down".into()))
        }
        async fn stats(&self) -> RaglineResult<CorpusStats> {
            Err(RaglineError::Store("down".into()))
        }
    }

    fn chunk(id: &str) -> Chunk {
        Chunk {
            id: id.into(),
            page_id: id.into(),
            url: format!("https://x/{id}"),
            title: None,
            content: "text".into(),
            vector: Vec::new(),
            metadata: Default::default(),
            chunk_index: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_scores_are_scaled() {
        let search = LexicalSearch::new(Arc::new(CannedIndex(vec![
            (chunk("a"), 25.0),
            (chunk("b"), 4.0),
        ])));
        let results = search.search("q", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].score - 2.5).abs() < 1e-6);
        assert!((results[1].score - 0.4).abs() < 1e-6);
        assert_eq!(results[0].similarity(), 1.0);
    }

    #[tokio::test]
    async fn test_limit_respected() {
        let hits = (0..8).map(|i| (chunk(&i.to_string()), 1.0)).collect();
        let search = LexicalSearch::new(Arc::new(CannedIndex(hits)));
        assert_eq!(search.search("q", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_index_failure_propagates() {
        let search = LexicalSearch::new(Arc::new(BrokenIndex));
        assert!(matches!(
            search.search("q", 3).await,
            Err(RaglineError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_joins_page_fields_from_store() {
        let store = InMemoryChunkStore::new();
        store
            .add_page(PageRecord {
                id: "p1".into(),
                url: "https://x/a".into(),
                title: Some("Offsets".into()),
                raw_html: None,
            })
            .await;
        store
            .add_chunk(ChunkRecord::new("c1", "p1", "offset accounts explained", vec![]))
            .await
            .unwrap();

        let results = LexicalSearch::new(Arc::new(store)).search("offset", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.url, "https://x/a");
        assert_eq!(results[0].chunk.display_title(), "Offsets");
    }
}
