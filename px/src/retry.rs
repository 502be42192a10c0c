//! Exponential backoff with jitter for fallible external calls
//!
//! Every model call and git command goes through a [`RetryPolicy`]. Between
//! attempts the delay grows by `factor` up to `max_delay`, plus a small random
//! jitter so concurrent projects do not retry in lockstep.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Retry tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Total attempts, including the first
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    #[serde(rename = "initial-delay-ms")]
    pub initial_delay_ms: u64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay before each wait
    pub factor: u32,

    /// Upper bound of the random jitter added to each wait
    #[serde(rename = "jitter-ms")]
    pub jitter_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            factor: 2,
            jitter_ms: 100,
        }
    }
}

impl RetryOptions {
    /// Delay to wait after a failure, given the previous delay
    fn next_delay_ms(&self, current_ms: u64) -> u64 {
        current_ms.saturating_mul(u64::from(self.factor)).min(self.max_delay_ms)
    }
}

/// All attempts failed; carries the last underlying error
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.last_error
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation failed after {} attempts: {}", self.attempts, self.last_error)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Reusable retry policy
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    options: RetryOptions,
}

impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Self {
        debug!(?options, "RetryPolicy::new: called");
        Self { options }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Run `operation` until it succeeds or attempts are exhausted
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_if(operation, |_| true).await
    }

    /// Like [`run`](Self::run), but gives up early on errors `should_retry` rejects
    pub async fn run_if<T, E, F, Fut, P>(&self, operation: F, should_retry: P) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&E) -> bool,
    {
        self.run_with(operation, should_retry, |_| None).await
    }

    /// Like [`run_if`](Self::run_if); `min_wait` can stretch the next wait
    ///
    /// When `min_wait` returns a duration for the error, the wait before the
    /// next attempt is at least that long, e.g. a server's `Retry-After`.
    pub async fn run_with<T, E, F, Fut, P, W>(
        &self,
        mut operation: F,
        should_retry: P,
        min_wait: W,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&E) -> bool,
        W: Fn(&E) -> Option<Duration>,
    {
        let max_attempts = self.options.max_retries.max(1);
        let mut current_delay_ms = self.options.initial_delay_ms;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= max_attempts || !should_retry(&error) {
                debug!(attempt, error = %error, "RetryPolicy::run_with: giving up");
                return Err(RetryError {
                    attempts: attempt,
                    last_error: error,
                });
            }

            current_delay_ms = self.options.next_delay_ms(current_delay_ms);
            let jitter_ms = if self.options.jitter_ms > 0 {
                rand::rng().random_range(0..=self.options.jitter_ms)
            } else {
                0
            };
            let backoff = Duration::from_millis(current_delay_ms + jitter_ms);
            let wait = min_wait(&error).map_or(backoff, |hint| hint.max(backoff));
            warn!(attempt, max_attempts, wait_ms = wait.as_millis() as u64, error = %error, "Retrying after failure");
            tokio::time::sleep(wait).await;
        }
    }
}

/// One-shot helper for callers without a stored policy
pub async fn with_retry<T, E, F, Fut>(operation: F, options: RetryOptions) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    RetryPolicy::new(options).run(operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryOptions {
        RetryOptions {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            factor: 2,
            jitter_ms: 0,
        }
    }

    fn failing_until(calls: Arc<AtomicU32>, succeed_on: u32) -> impl FnMut() -> std::future::Ready<Result<u32, String>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= succeed_on {
                std::future::ready(Ok(n))
            } else {
                std::future::ready(Err(format!("failure {}", n)))
            }
        }
    }

    #[test]
    fn test_default_options() {
        let options = RetryOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.initial_delay_ms, 1000);
        assert_eq!(options.max_delay_ms, 10_000);
        assert_eq!(options.factor, 2);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let options = RetryOptions::default();
        assert_eq!(options.next_delay_ms(1000), 2000);
        assert_eq!(options.next_delay_ms(4000), 8000);
        assert_eq!(options.next_delay_ms(8000), 10_000);
        assert_eq!(options.next_delay_ms(10_000), 10_000);
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = with_retry(failing_until(calls.clone(), 1), fast(3)).await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_last_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = with_retry(failing_until(calls.clone(), 3), fast(3)).await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let err = with_retry(failing_until(calls.clone(), 100), fast(3)).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.to_string(), "Operation failed after 3 attempts: failure 3");
        assert!(!err.to_string().contains("failure 1"));
    }

    #[tokio::test]
    async fn test_run_if_stops_on_permanent_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(fast(5));
        let err = policy
            .run_if(failing_until(calls.clone(), 100), |e: &String| !e.ends_with('1'))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
        assert_eq!(err.into_inner(), "failure 1");
    }

    #[tokio::test]
    async fn test_min_wait_stretches_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(fast(2));
        let started = std::time::Instant::now();

        let result = policy
            .run_with(failing_until(calls.clone(), 2), |_| true, |_| Some(Duration::from_millis(50)))
            .await;

        assert_eq!(result.unwrap(), 2);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_min_wait_never_shortens_backoff() {
        let options = RetryOptions {
            initial_delay_ms: 20,
            max_delay_ms: 40,
            ..fast(2)
        };
        let calls = Arc::new(AtomicU32::new(0));
        let started = std::time::Instant::now();

        let result = RetryPolicy::new(options)
            .run_with(failing_until(calls.clone(), 2), |_| true, |_| Some(Duration::ZERO))
            .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = with_retry(failing_until(calls.clone(), 1), fast(0)).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
