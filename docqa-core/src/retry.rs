//! Bounded exponential backoff for provider calls.
//!
//! Every attempt runs under [`RetryPolicy::attempt_timeout`]; an attempt that
//! exceeds it counts as a [`DocqaError::Transient`] failure. Only errors
//! whose [`DocqaError::is_retryable`] is true are attempted again.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{DocqaError, Result};

/// How many times, and how patiently, to retry a provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay, provider hints included.
    pub max_backoff: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
    /// Deadline for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * exp;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay after a failed attempt, preferring the provider's hint when present.
    fn delay_for(&self, attempt: u32, error: &DocqaError) -> Duration {
        match error.retry_after() {
            Some(hint) => hint.min(self.max_backoff),
            None => self.backoff(attempt),
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or the policy is exhausted.
///
/// `operation` names the call in log lines and in the timeout error.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(DocqaError::transient(
                operation,
                format!("timed out after {:?}", policy.attempt_timeout),
            )),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt, &e);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(10), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = retry(&RetryPolicy::default(), "complete", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DocqaError::transient("mock", "connection reset"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = retry(&RetryPolicy::default(), "embed", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(DocqaError::Authentication { provider: "mock".into(), message: "401".into() })
            }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Authentication);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_attempts_time_out_and_surface_transient() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let policy = RetryPolicy::default().with_attempt_timeout(Duration::from_secs(5));
        let result: Result<()> = retry(&policy, "complete", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<()>().await;
                Ok(())
            }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Transient);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_hint_is_honoured_but_capped() {
        let policy = RetryPolicy::default().with_max_attempts(2);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = tokio::time::Instant::now();
        let result: Result<()> = retry(&policy, "complete", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(DocqaError::QuotaExceeded {
                    provider: "mock".into(),
                    message: "429".into(),
                    retry_after: Some(Duration::from_secs(120)),
                })
            }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::QuotaExceeded);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let waited = start.elapsed();
        assert!(waited >= policy.max_backoff);
        assert!(waited < Duration::from_secs(120));
    }
}
