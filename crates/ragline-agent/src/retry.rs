use async_trait::async_trait;
use rand::Rng;
use ragline_core::RaglineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry budget for generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Upper bound of the uniform random jitter in milliseconds.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
            jitter_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay after failed `attempt` (1-based):
    /// `backoff_base_ms * 2^(attempt - 1)`.
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        self.backoff_base_ms
            .saturating_mul(2u64.saturating_pow(exponent))
    }

    /// Full delay after failed `attempt`, adding jitter drawn from `[0, jitter_ms)`.
    pub fn delay_for<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rng.gen_range(0..self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.base_delay_ms(attempt).saturating_add(jitter))
    }
}

/// Whether a failed generation call is worth retrying.
///
/// Timeouts are always retryable. Other errors are retryable when their
/// message signals overload, HTTP 429, HTTP 503, or a rate limit.
pub fn is_retryable(err: &RaglineError) -> bool {
    if err.is_timeout() {
        return true;
    }
    let lower = err.to_string().to_lowercase();
    lower.contains("overloaded")
        || lower.contains("429")
        || lower.contains("503")
        || lower.contains("rate limit")
}

/// Waits between retries. Swapped out in tests to skip real backoff.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
