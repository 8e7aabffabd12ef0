//! Common utilities for remote API calls
//!
//! - Sliding-window rate limiter
//! - Retry policy with fixed or exponential backoff

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{Backoff, RetryPolicy};
