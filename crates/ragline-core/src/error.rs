use thiserror::Error;

/// A convenience `Result` alias using [`RaglineError`].
pub type RaglineResult<T> = Result<T, RaglineError>;

/// Top-level error type shared by every Ragline crate.
///
/// Each variant corresponds to a boundary that can fail. Retrieval-side
/// variants (`EmbeddingUnavailable`, `Store`, `Timeout` during retrieval)
/// propagate to the caller; generation-side variants are absorbed by the
/// answer generator's retry and fallback path.
#[derive(Error, Debug)]
pub enum RaglineError {
    /// The embedding provider could not produce a query vector.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The chunk store or its text index failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The generative model returned an unusable answer.
    #[error("Generation error: {0}")]
    Generation(String),

    /// An outbound HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An external call did not complete within its time budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A stored vector could not be decoded.
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Configuration parsing or validation failed.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RaglineError {
    /// Returns `true` when this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RaglineError::Timeout(_))
    }
}
