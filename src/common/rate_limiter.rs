//! Rate limiter using a sliding window of call timestamps
//!
//! Bounds the number of calls issued within any trailing window. Calls are
//! only ever delayed, never rejected.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;

/// Configuration for the rate limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Maximum calls allowed within the window
    pub max_calls: usize,
    /// Window length in seconds
    pub period_secs: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_calls: 25,
            period_secs: 60,
        }
    }
}

impl RateLimiterConfig {
    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = max_calls;
        self
    }

    pub fn with_period_secs(mut self, period_secs: u64) -> Self {
        self.period_secs = period_secs;
        self
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Sliding-window rate limiter
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rsi_monitor::common::RateLimiter;
///
/// let mut limiter = RateLimiter::new(2, Duration::from_millis(50));
/// limiter.wait();
/// limiter.wait();
/// // Third call sleeps until the first leaves the window
/// limiter.wait();
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    calls: VecDeque<Instant>,
    max_calls: usize,
    period: Duration,
}

impl RateLimiter {
    /// A `max_calls` of zero is treated as one
    pub fn new(max_calls: usize, period: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            calls: VecDeque::with_capacity(max_calls),
            max_calls,
            period,
        }
    }

    pub fn from_config(config: &RateLimiterConfig) -> Self {
        Self::new(config.max_calls, config.period())
    }

    /// Block until one more call fits in the window, then record it.
    ///
    /// Returns how long the caller was held back.
    pub fn wait(&mut self) -> Duration {
        let started = Instant::now();

        loop {
            let now = Instant::now();
            self.prune(now);

            if self.calls.len() < self.max_calls {
                break;
            }

            let Some(&oldest) = self.calls.front() else {
                break;
            };
            let wait_time = (oldest + self.period).saturating_duration_since(now);
            if !wait_time.is_zero() {
                info!(
                    "Rate limit reached. Waiting for {:.2} seconds...",
                    wait_time.as_secs_f64()
                );
                std::thread::sleep(wait_time);
            }
        }

        self.calls.push_back(Instant::now());
        started.elapsed()
    }

    /// Calls currently counted against the window
    pub fn calls_in_window(&mut self) -> usize {
        self.prune(Instant::now());
        self.calls.len()
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= self.period {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.max_calls, 25);
        assert_eq!(config.period(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: RateLimiterConfig = serde_json::from_str(r#"{ "max_calls": 10 }"#).unwrap();
        assert_eq!(config.max_calls, 10);
        assert_eq!(config.period_secs, 60);

        let config: RateLimiterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RateLimiterConfig::default());
    }

    #[test]
    fn test_config_builder() {
        let config = RateLimiterConfig::default()
            .with_max_calls(5)
            .with_period_secs(10);

        assert_eq!(config.max_calls, 5);
        assert_eq!(config.period_secs, 10);
        assert_eq!(RateLimiter::from_config(&config).max_calls(), 5);
    }

    #[test]
    fn test_calls_under_limit_do_not_wait() {
        let mut limiter = RateLimiter::new(3, Duration::from_secs(60));
        let started = Instant::now();

        limiter.wait();
        limiter.wait();
        limiter.wait();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.calls_in_window(), 3);
    }

    #[test]
    fn test_extra_call_blocks_until_window_frees() {
        let period = Duration::from_millis(150);
        let mut limiter = RateLimiter::new(2, period);

        let started = Instant::now();
        limiter.wait();
        limiter.wait();
        limiter.wait();

        assert!(started.elapsed() >= period);
    }

    #[test]
    fn test_burst_of_twice_max_calls_spans_a_period() {
        let period = Duration::from_millis(100);
        let max_calls = 3;
        let mut limiter = RateLimiter::new(max_calls, period);

        let started = Instant::now();
        for _ in 0..2 * max_calls {
            limiter.wait();
        }

        assert!(started.elapsed() >= period);
        assert!(limiter.calls_in_window() <= max_calls);
    }

    #[test]
    fn test_old_calls_are_pruned() {
        let mut limiter = RateLimiter::new(1, Duration::from_millis(20));
        limiter.wait();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(limiter.calls_in_window(), 0);
        assert!(limiter.wait() < Duration::from_millis(20));
    }

    #[test]
    fn test_zero_max_calls_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_calls(), 1);
    }
}
