use async_trait::async_trait;
use crate::bm25::tokenize;
use ragline_core::{RaglineError, RaglineResult};
use std::collections::HashMap;

/// Trait for computing text embeddings (vector representations).
///
/// Implementations report every failure as
/// [`RaglineError::EmbeddingUnavailable`] and never retry internally.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> RaglineResult<Vec<f32>>;

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Offline embedding by signed feature hashing.
///
/// Each unigram and adjacent bigram (tokenized like the text index) is hashed
/// into one of `dimension` buckets with a hash-derived sign, weighted by
/// `1 + ln(tf)`, and the result is L2-normalized. Deterministic across runs,
/// so corpora embedded with it can be persisted and searched later.
pub struct LocalEmbedding {
    dimension: usize,
}

/// Relative weight of a bigram feature against a unigram.
const BIGRAM_WEIGHT: f32 = 0.5;

impl LocalEmbedding {
    /// Create a provider producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a64(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> RaglineResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RaglineError::EmbeddingUnavailable(
                "cannot embed empty text".to_string(),
            ));
        }

        let tokens = tokenize(text);
        let mut features: HashMap<String, (f32, f32)> = HashMap::new();
        for token in &tokens {
            features.entry(token.clone()).or_insert((0.0, 1.0)).0 += 1.0;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            features.entry(bigram).or_insert((0.0, BIGRAM_WEIGHT)).0 += 1.0;
        }

        let mut vector = vec![0.0f32; self.dimension];
        for (feature, (tf, weight)) in &features {
            self.add_feature(&mut vector, feature, weight * (1.0 + tf.ln()));
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a64(data: &[u8]) -> u64 {
    data.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ragline_core::cosine_similarity;

    #[tokio::test]
    async fn test_local_embedding_dimension() {
        let emb = LocalEmbedding::new(128);
        assert_eq!(emb.dimension(), 128);
        let vec = emb.embed("offset account").await.unwrap();
        assert_eq!(vec.len(), 128);
    }

    #[tokio::test]
    async fn test_local_embedding_normalized() {
        let emb = LocalEmbedding::default();
        let vec = emb.embed("variable rate home loan with offset").await.unwrap();
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_local_embedding_similar_texts() {
        let emb = LocalEmbedding::default();
        let v1 = emb.embed("home loan interest rates").await.unwrap();
        let v2 = emb.embed("home loan repayment rates").await.unwrap();
        let v3 = emb.embed("cooking recipes for dinner").await.unwrap();

        let sim_12 = cosine_similarity(&v1, &v2).unwrap_or(0.0);
        let sim_13 = cosine_similarity(&v1, &v3).unwrap_or(0.0);
        assert!(
            sim_12 > sim_13,
            "sim(loan-loan)={sim_12} should be > sim(loan-cooking)={sim_13}"
        );
    }

    #[tokio::test]
    async fn test_local_embedding_empty_is_unavailable() {
        let emb = LocalEmbedding::default();
        let err = emb.embed("   ").await.unwrap_err();
        assert!(matches!(err, RaglineError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_word_order_changes_bigrams() {
        let emb = LocalEmbedding::default();
        let v1 = emb.embed("fixed rate loan").await.unwrap();
        let v2 = emb.embed("loan rate fixed").await.unwrap();
        let sim = cosine_similarity(&v1, &v2).unwrap();
        assert!(sim < 0.999, "bigrams should distinguish order, got {sim}");
        assert!(sim > 0.5);
    }

    #[tokio::test]
    async fn test_single_letter_text_is_zero_vector() {
        let emb = LocalEmbedding::new(16);
        let vec = emb.embed("a").await.unwrap();
        assert!(vec.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_local_embedding_deterministic() {
        let emb = LocalEmbedding::default();
        let v1 = emb.embed("refinance your mortgage").await.unwrap();
        let v2 = emb.embed("refinance your mortgage").await.unwrap();
        assert_eq!(v1, v2);
    }
}
