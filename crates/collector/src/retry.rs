use std::{fmt::Display, future::Future, time::Duration};

use tracing::warn;

/// Classification of errors returned by upstream collaborators.
pub trait Retryable {
    /// Whether the operation may succeed if attempted again.
    fn is_transient(&self) -> bool;

    /// Delay requested by the upstream itself, e.g. a rate limit reset.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Bounded exponential backoff policy of a single task invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl From<&common::config::Retry> for RetryPolicy {
    fn from(config: &common::config::Retry) -> Self {
        Self {
            max_attempts: config.attempts,
            base_delay: Duration::from_millis(config.delay),
            max_delay: Duration::from_millis(config.ceiling),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the provided failed attempt, starting from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));

        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run the provided operation until it succeeds, fails permanently,
    /// or the attempt limit is exhausted.
    ///
    /// The last error is returned on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match f().await {
                Ok(val) => return Ok(val),
                Err(error) if attempt < max_attempts && error.is_transient() => {
                    let delay = error.retry_after().unwrap_or_else(|| self.delay(attempt));

                    warn!(%operation, attempt, ?delay, %error, "transient upstream error, retrying");

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, time::Duration};

    use common::config::Config;
    use derive_more::Display;

    use super::{RetryPolicy, Retryable};

    #[derive(Debug, Display, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl Retryable for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn default_policy() {
        let config = Config::for_tests();

        assert_eq!(
            RetryPolicy::from(&config.retry),
            RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn exponential_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };

        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(3));
        assert_eq!(policy.delay(40), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let calls = Cell::new(0);

        let result = policy(5)
            .run("test", || {
                calls.set(calls.get() + 1);
                let outcome = if calls.get() < 3 {
                    Err(TestError::Transient)
                } else {
                    Ok(calls.get())
                };

                async move { outcome }
            })
            .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);

        let result: Result<(), _> = policy(5)
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(TestError::Permanent) }
            })
            .await;

        assert_eq!(result, Err(TestError::Permanent));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = Cell::new(0);

        let result: Result<(), _> = policy(3)
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.get(), 3);
    }
}
