//! Retry policy applied to every remote call
//!
//! Only errors that report themselves as retryable are attempted again.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;

use crate::error::FetchError;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Fixed,
    #[default]
    Exponential,
}

/// Errors that know whether a retry makes sense
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        FetchError::is_retryable(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before retry number `retry` (1 = first retry)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed => self.base_delay_ms,
            Backoff::Exponential => {
                let factor = 2u64.saturating_pow(retry.saturating_sub(1));
                self.base_delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempts are used up. The closure receives the 1-based attempt.
    pub fn run<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && err.is_retryable() => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt,
                        attempts,
                        err,
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable={})", self.retryable)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(attempts)
            .with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        // Capped at max_delay_ms
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[test]
    fn test_fixed_delays() {
        let policy = RetryPolicy::default()
            .with_backoff(Backoff::Fixed)
            .with_base_delay(Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result: Result<&str, TestError> = fast_policy(3).run(|attempt| {
            calls += 1;
            if attempt < 3 {
                Err(TestError { retryable: true })
            } else {
                Ok("ok")
            }
        });

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), TestError> = fast_policy(2).run(|_| {
            calls += 1;
            Err(TestError { retryable: true })
        });

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let mut calls = 0;
        let result: Result<(), TestError> = fast_policy(5).run(|_| {
            calls += 1;
            Err(TestError { retryable: false })
        });

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_none_policy_single_attempt() {
        let mut calls = 0;
        let _: Result<(), TestError> = RetryPolicy::none().run(|_| {
            calls += 1;
            Err(TestError { retryable: true })
        });
        assert_eq!(calls, 1);
    }
}
