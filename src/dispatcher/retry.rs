//! Explicit exponential-backoff retry harness (§4.1, §5, §9 — "a systems
//! language port should make the harness explicit, not hidden under a
//! watcher, so test code can assert retry behaviour").

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    /// Dispatcher-operation default (§5): 10 tries, ~1 minute bound.
    pub fn dispatcher_default() -> Self {
        RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(60),
        }
    }

    /// Enrollment re-invocation budget (§4.3 step 7).
    pub fn enrollment_default() -> Self {
        RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_secs(1),
            max_elapsed: Duration::from_secs(10),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let millis = self.initial_backoff.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(millis).min(self.max_backoff)
    }
}

/// Run `operation` under `policy`. Stops immediately on a permanent error
/// (`Error::is_permanent`), retries transient ones with exponential
/// backoff, and gives up once either the attempt count or the elapsed-time
/// budget is exhausted.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_permanent() => {
                debug!(attempt, "retry harness stopping on permanent error: {err}");
                return Err(err);
            }
            Err(err) => {
                if attempt >= policy.max_attempts || start.elapsed() >= policy.max_elapsed {
                    debug!(attempt, "retry harness exhausted budget: {err}");
                    return Err(err);
                }
                debug!(attempt, "retry harness backing off after transient error: {err}");
                tokio::time::sleep(policy.backoff_for(attempt)).await;
            }
        }
    }
}

/// Convenience: map a raw cause into a transient backend-read error so it
/// participates in the retry harness.
pub fn backend_read(cause: impl std::fmt::Display) -> Error {
    Error::backend_read(anyhow::anyhow!(cause.to_string()))
}

/// Variant of [`retry`] used only for the enrollment follow-up call
/// (§4.3 step 7): a freshly created workflow can still read back as
/// `NOT_FOUND` on an eventually-consistent store, so that specific error is
/// treated as transient here even though [`Error::is_permanent`] classifies
/// it as permanent everywhere else.
pub async fn retry_treating_not_found_as_transient<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_permanent() && !matches!(err, Error::NotFound(_)) => {
                debug!(attempt, "retry harness stopping on permanent error: {err}");
                return Err(err);
            }
            Err(err) => {
                if attempt >= policy.max_attempts || start.elapsed() >= policy.max_elapsed {
                    debug!(attempt, "retry harness exhausted budget: {err}");
                    return Err(err);
                }
                debug!(attempt, "retry harness backing off: {err}");
                tokio::time::sleep(policy.backoff_for(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            max_elapsed: Duration::from_secs(1),
        };

        let result = retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(backend_read("not yet"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::dispatcher_default();

        let result: Result<()> = retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::NotFound("no workflow".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            max_elapsed: Duration::from_secs(5),
        };

        let result: Result<()> = retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(backend_read("still down")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
