//! Bounded exponential-backoff retry around one adapter invocation.
//!
//! Only transient errors (see [`CallError::is_transient`]) are retried;
//! permanent rejections and timeouts return immediately. Attempts within
//! one unit are strictly sequential. After the budget is exhausted the
//! last error is returned as-is — a reported failure, never fatal to the
//! overall run.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::CallError;

/// Retry policy for one adapter call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first (total attempts = max_retries + 1).
    pub max_retries: u32,
    /// Backoff base; attempt n waits base × 3^n.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(90),
        }
    }
}

impl RetryPolicy {
    /// Delay before re-attempting after failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 3u32.saturating_pow(attempt);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Invoke `op` with up to `policy.max_retries` transient-failure retries.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !e.is_transient() || attempt >= policy.max_retries {
                    return Err(e);
                }
                let backoff = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_secs = backoff.as_secs(),
                    error = %e,
                    "transient provider error, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
