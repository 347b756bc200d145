use std::future::Future;
use std::time::Duration;

use ragline_core::{RaglineError, RaglineResult};

/// Time budgets for retrieval-side external calls.
///
/// A timeout on any of these fails the request; retrieval is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalTimeouts {
    /// Budget for one query embedding call.
    pub embed: Option<Duration>,
    /// Budget for one store scan or text-index query.
    pub store: Option<Duration>,
}

impl Default for RetrievalTimeouts {
    fn default() -> Self {
        Self {
            embed: Some(Duration::from_secs(15)),
            store: Some(Duration::from_secs(15)),
        }
    }
}

impl RetrievalTimeouts {
    /// No time limits at all.
    pub fn unbounded() -> Self {
        Self {
            embed: None,
            store: None,
        }
    }
}

/// Await `fut`, failing with [`RaglineError::Timeout`] once `budget` elapses.
pub async fn with_timeout<T, F>(budget: Option<Duration>, what: &str, fut: F) -> RaglineResult<T>
where
    F: Future<Output = RaglineResult<T>>,
{
    match budget {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            RaglineError::Timeout(format!("{what} exceeded {}ms", limit.as_millis()))
        })?,
        None => fut.await,
    }
}
