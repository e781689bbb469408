//! Client configuration

use std::fmt;
use std::time::Duration;

use canvas_types::config::{env_or, env_parse, load_env};
use canvas_types::ConfigError;

/// Production API root
pub const DEFAULT_API_URL: &str = "https://api.dreamcanvas.ai";

/// Client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// API root; request paths are appended to it
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Wait applied to a 429 without a usable `Retry-After`
    pub default_retry_after: Duration,
    /// Upper bound on any single `Retry-After` wait
    pub max_retry_after: Duration,
    /// Static `Api-Key` header for the generation backend
    pub api_key: Option<String>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("default_retry_after", &self.default_retry_after)
            .field("max_retry_after", &self.max_retry_after)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(30),
            default_retry_after: Duration::from_secs(1),
            max_retry_after: Duration::from_secs(60),
            api_key: None,
        }
    }

    /// Load from environment variables, reading `.env` first if present
    pub fn from_env() -> Result<Self, ConfigError> {
        load_env();
        let timeout_secs = env_parse("CANVAS_REQUEST_TIMEOUT_SECS", 30u64)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid("CANVAS_REQUEST_TIMEOUT_SECS"));
        }

        let mut config = Self::new(env_or("CANVAS_API_URL", DEFAULT_API_URL))
            .with_request_timeout(Duration::from_secs(timeout_secs));
        if let Ok(key) = std::env::var("CANVAS_API_KEY") {
            config = config.with_api_key(key);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
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

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}
