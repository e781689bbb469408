//! Retry rules for the HTTP wrapper
//!
//! A 429 is retried once after the server's `Retry-After` hint; a 401 is
//! retried once after a token refresh. Nothing else is retried here.

use std::time::Duration;

use reqwest::header::HeaderValue;

/// Upper bound on sends for one logical request: the original plus one
/// rate-limit retry plus one post-refresh retry.
pub const MAX_SENDS: u32 = 3;

/// Parse a `Retry-After` value given in whole seconds.
///
/// Missing or unparseable values fall back to `default`.
pub fn parse_retry_after(value: Option<&HeaderValue>, default: Duration) -> Duration {
    value
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Retry behavior of the HTTP wrapper.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum sends per logical request
    pub max_sends: u32,
    /// Wait used when `Retry-After` is missing
    pub default_retry_after: Duration,
    /// Cap on any single wait
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_sends: MAX_SENDS,
            default_retry_after: Duration::from_secs(1),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_retry_after(mut self, delay: Duration) -> Self {
        self.default_retry_after = delay;
        self
    }

    #[must_use]
    pub fn with_max_retry_after(mut self, delay: Duration) -> Self {
        self.max_retry_after = delay;
        self
    }

    /// Wait before retrying a 429
    pub fn retry_after(&self, header: Option<&HeaderValue>) -> Duration {
        parse_retry_after(header, self.default_retry_after).min(self.max_retry_after)
    }
}
