//! Bounded retry with a fixed delay between attempts.
//!
//! Every failure is retried the same way; there is no transient/permanent
//! classification. The delay is a `tokio::time::sleep`, so only the calling
//! task is suspended.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Attempt bound and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Policy for scheduled export jobs: 3 attempts, one minute apart.
    pub const fn job() -> Self {
        Self::new(3, Duration::from_secs(60))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::job()
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// Returns the error from the last attempt. No delay follows the final
/// attempt. A policy of zero attempts still runs the operation once.
pub async fn do_with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                error!(attempt, max_attempts, error = %e, "Error in function execution");

                if attempt >= max_attempts {
                    return Err(e);
                }

                warn!(
                    retry = attempt,
                    interval = ?policy.interval,
                    "Retrying function execution"
                );
                tokio::time::sleep(policy.interval).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(60);

    fn assert_two_delays(elapsed: Duration) {
        assert!(elapsed >= INTERVAL * 2, "elapsed {:?}", elapsed);
        assert!(elapsed < INTERVAL * 3, "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result: Result<&str, String> = do_with_retry(&RetryPolicy::job(), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("failure {}", n))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_two_delays(start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result: Result<(), String> = do_with_retry(&RetryPolicy::job(), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("failure {}", n))
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // No delay after the final attempt
        assert_two_delays(start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_short_circuits() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result: Result<u32, String> = do_with_retry(&RetryPolicy::job(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_runs_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(0, INTERVAL);

        let result: Result<(), &str> = do_with_retry(&policy, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        })
        .await;

        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
