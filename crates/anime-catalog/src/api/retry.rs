//! Retry governor shared by both upstream clients.
//!
//! A 429 waits for the upstream's `retry-after` hint and tries again without
//! spending the retry budget. Any other retryable failure spends one unit of
//! budget and waits a fixed delay.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::CatalogError;

/// Retry budget and fixed delay between failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Wait between failed attempts
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Policy that surfaces the first failure
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Run `attempt_fn` until it succeeds, the budget is spent, or it fails with
/// a non-retryable error. The last error is returned on exhaustion.
pub async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut attempt_fn: F,
) -> Result<T, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let mut failures = 0u32;
    let mut rate_limited = 0u32;

    loop {
        match attempt_fn().await {
            Ok(value) => {
                if failures > 0 || rate_limited > 0 {
                    debug!(label, failures, rate_limited, "Request succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) if e.is_rate_limited() => {
                rate_limited += 1;
                let wait = e.retry_after().unwrap_or(Duration::ZERO);
                warn!(
                    label,
                    wait_ms = wait.as_millis() as u64,
                    rate_limited,
                    "Rate limited by upstream, retrying"
                );
                if !wait.is_zero() {
                    sleep(wait).await;
                }
            }
            Err(e) if e.is_retryable() && failures < policy.max_retries => {
                failures += 1;
                warn!(
                    label,
                    attempt = failures,
                    max_retries = policy.max_retries,
                    error = %e,
                    "Request failed, retrying after delay"
                );
                sleep(policy.retry_delay).await;
            }
            Err(e) => {
                warn!(label, failures, error = %e, "Request failed permanently");
                return Err(e);
            }
        }
    }
}
