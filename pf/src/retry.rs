//! Bounded retry with a fixed delay between attempts

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::GenerationConfig;

/// How often and how patiently an operation is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause after each failed attempt that will be retried
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Every attempt failed; carries the last failure
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

impl<E: fmt::Display> fmt::Display for Exhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.last)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }

    /// Run `operation` until it succeeds or the attempts are used up
    ///
    /// The closure receives the 0-based attempt index. Attempts never overlap.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        debug!(max_attempts, delay = ?self.delay, "RetryPolicy::run: called");

        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    debug!(attempt, "RetryPolicy::run: succeeded");
                    return Ok(value);
                }
                Err(err) if attempt + 1 >= max_attempts => {
                    warn!(attempt, error = %err, "Final attempt failed, giving up");
                    return Err(Exhausted {
                        attempts: attempt + 1,
                        last: err,
                    });
                }
                Err(err) => {
                    warn!(
                        "Attempt {}/{} failed, retrying in {:?}: {}",
                        attempt + 1,
                        max_attempts,
                        self.delay,
                        err
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let policy = RetryPolicy::default();
        let result: Result<u32, Exhausted<String>> = policy.run(|_| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let started = tokio::time::Instant::now();

        let counter = calls.clone();
        let result = policy
            .run(|attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { if attempt < 2 { Err("transient") } else { Ok(attempt) } }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_secs(2));

        let counter = calls.clone();
        let result: Result<(), _> = policy
            .run(|attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {}", attempt)) }
            })
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last, "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from_config(&GenerationConfig::default());
        assert_eq!(policy, RetryPolicy::default());
    }
}
