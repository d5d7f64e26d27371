//! Bounded retries with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FaultKind, ProviderFault, ProviderResult};

/// How transient provider failures are retried.
///
/// Every attempt is bounded by `request_timeout_ms`; an attempt that runs
/// over counts as a [`FaultKind::Timeout`] and is retried like any other
/// transient fault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Per-attempt timeout, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// The delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let millis = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// The per-attempt timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// The last fault seen by [`call_with_retry`] and how many attempts it took.
#[derive(Debug, Clone)]
pub(crate) struct RetryExhausted {
    pub fault: ProviderFault,
    pub attempts: u32,
}

/// Run `call` until it succeeds, fails with a non-transient fault, or the
/// policy's attempts are used up.
pub(crate) async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    provider: &str,
    operation: &str,
    mut call: F,
) -> std::result::Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let fault = match tokio::time::timeout(policy.request_timeout(), call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(fault)) => fault,
            Err(_) => ProviderFault::new(
                FaultKind::Timeout,
                format!("no response within {} ms", policy.request_timeout_ms),
            ),
        };

        if !fault.is_transient() || attempt >= max_attempts {
            return Err(RetryExhausted { fault, attempts: attempt });
        }

        let delay = policy.backoff(attempt);
        warn!(
            provider,
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %fault,
            "transient provider fault, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            request_timeout_ms: 5_000,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(80), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_faults_are_retried_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = call_with_retry(&RetryPolicy::default(), "mock", "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderFault::new(FaultKind::RateLimited, "slow down"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.ok(), Some(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_faults_stop_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: std::result::Result<(), _> =
            call_with_retry(&RetryPolicy::default(), "mock", "test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderFault::new(FaultKind::Auth, "bad key"))
            })
            .await;
        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 1);
        assert_eq!(exhausted.fault.kind, FaultKind::Auth);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out_and_exhaust() {
        let policy = RetryPolicy { max_attempts: 2, request_timeout_ms: 50, ..RetryPolicy::default() };
        let result: std::result::Result<(), _> =
            call_with_retry(&policy, "mock", "test", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 2);
        assert_eq!(exhausted.fault.kind, FaultKind::Timeout);
    }
}
