//! Chunk storage and hybrid retrieval for the Ragline engine.
//!
//! Combines dense cosine similarity over stored embeddings with a BM25 text
//! index, fused by weighted, rank-bonused scores.
//!
//! # Main types
//!
//! - [`ChunkStore`]: Read-side store contract (scan, text index, markup lookup).
//! - [`InMemoryChunkStore`] / [`FileChunkStore`]: Store implementations.
//! - [`EmbeddingProvider`]: Trait for query embeddings, with [`LocalEmbedding`].
//! - [`SimilaritySearch`]: Full-scan cosine search with threshold and limit.
//! - [`LexicalSearch`]: Text-index search with scaled scores.
//! - [`HybridRanker`]: Oversampled vector + lexical fusion.

/// BM25 inverted text index.
pub mod bm25;
/// Embedding provider trait and the offline local provider.
pub mod embedding;
/// Hosted embedding providers.
#[cfg(feature = "http-embeddings")]
pub mod http_embedding;
/// Hybrid vector + lexical ranking.
pub mod hybrid;
/// Lexical search over the store's text index.
pub mod lexical;
/// Dense cosine similarity search.
pub mod similarity;
/// Chunk store trait and implementations.
pub mod store;
/// Call budgets for retrieval-side external calls.
pub mod timeout;

pub use bm25::Bm25Index;
pub use embedding::{EmbeddingProvider, LocalEmbedding};
#[cfg(feature = "http-embeddings")]
pub use http_embedding::{GeminiEmbedding, OpenAiEmbedding};
pub use hybrid::{
    fuse, rank_bonus, HybridRanker, DEFAULT_TEXT_WEIGHT, DEFAULT_VECTOR_WEIGHT,
    OVERSAMPLE_FACTOR, RANK_BONUS_SCALE, RELAXED_THRESHOLD,
};
pub use lexical::{LexicalSearch, TEXT_SCORE_SCALE};
pub use similarity::{rank_by_cosine, SimilaritySearch};
pub use store::{
    ChunkRecord, ChunkStore, FileChunkStore, InMemoryChunkStore, PageRecord, CHUNKS_FILE,
    PAGES_FILE,
};
pub use timeout::{with_timeout, RetrievalTimeouts};
