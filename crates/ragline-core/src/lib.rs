//! Core types and error definitions for the Ragline retrieval engine.
//!
//! This crate provides the data model shared by the retrieval and generation
//! crates, the unified error type, and the canonical vector decoding path.
//!
//! # Main types
//!
//! - [`RaglineError`]: Unified error enum for all Ragline subsystems.
//! - [`RaglineResult`]: Convenience alias for `Result<T, RaglineError>`.
//! - [`Chunk`]: A stored unit of page text joined with its page's URL and title.
//! - [`SearchResult`]: A chunk annotated with a ranking score.
//! - [`Source`]: A citation attached to an answer.
//! - [`RagResponse`]: The answer plus its ordered sources.

/// Error types.
pub mod error;
/// Vector decoding and cosine similarity.
pub mod vector;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use error::{RaglineError, RaglineResult};
pub use vector::{cosine_similarity, decode_vector};

/// Title used when a page has none.
pub const UNTITLED: &str = "Untitled";

// --- Corpus types ---

/// A retrievable unit of page text.
///
/// `url` and `title` belong to the owning page and are joined in at read time;
/// the chunk itself only references the page through `page_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier.
    pub id: String,
    /// Identifier of the owning page.
    pub page_id: String,
    /// URL of the owning page (joined).
    pub url: String,
    /// Title of the owning page (joined).
    #[serde(default)]
    pub title: Option<String>,
    /// Raw chunk text.
    pub content: String,
    /// Embedding vector. Empty when the stored vector was missing or corrupt.
    #[serde(default)]
    pub vector: Vec<f32>,
    /// Auxiliary attributes (offsets, generation timestamp, model name).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Position of this chunk within its page.
    #[serde(default)]
    pub chunk_index: Option<u32>,
    /// When the chunk was produced by ingestion.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Chunk {
    /// Page title, or [`UNTITLED`] when the page has none.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => UNTITLED,
        }
    }

    /// Whether the chunk carries a vector that can be scored.
    pub fn has_vector(&self) -> bool {
        !self.vector.is_empty()
    }
}

/// A chunk annotated with a ranking score.
///
/// `score` is the raw ranking weight (cosine, normalized text score, or fused
/// score). It orders results but is not a probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Raw ranking weight used for ordering.
    pub score: f32,
}

impl SearchResult {
    /// Creates a result for `chunk` with the given raw score.
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }

    /// The ranking weight clamped into `[0, 1]`.
    pub fn similarity(&self) -> f32 {
        if self.score.is_finite() {
            self.score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

// --- Response types ---

/// A citation delivered alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Meta-description or truncated chunk text; never the full chunk.
    #[serde(rename = "content")]
    pub excerpt: String,
    /// Clamped ranking weight of the underlying result.
    pub similarity: f32,
}

/// The answer produced for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// Plain-text answer.
    pub answer: String,
    /// Ordered citations, matching the ranked retrieval list.
    pub sources: Vec<Source>,
    /// Set when the answer came from the fallback path.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

/// Aggregate statistics about a stored corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Number of stored chunks.
    pub total_chunks: usize,
    /// Number of distinct pages referenced by chunks.
    pub unique_pages: usize,
    /// Dimensionality of the first non-empty vector, 0 when none.
    pub vector_dimensions: usize,
}
