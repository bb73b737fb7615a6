//! Retry with capped exponential backoff.
//!
//! Every attempt is bounded by `request_timeout`. The operation is re-run as
//! is, so callers must build the request once and resubmit the same one.

use std::future::Future;
use std::time::Duration;

use crate::error::{LedgerError, Result};

/// Backoff configuration for ledger calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Bound on each individual attempt.
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// A single attempt, no backoff.
    pub fn no_retry(request_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            request_timeout,
        }
    }

    /// Delay before attempt `attempt` (0-indexed). Zero for the first attempt.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms.max(0.0) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// Only errors with [`LedgerError::is_retryable`] are retried. The last
/// error is returned when attempts are exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = match tokio::time::timeout(policy.request_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(policy.request_timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                tracing::warn!(operation, attempt = attempt + 1, error = %e, "ledger call failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
