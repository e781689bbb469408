//! Client errors
//!
//! Every non-2xx response that is not handled by the 429/401 rules is
//! normalized into [`ApiError`].

use std::fmt;
use std::time::Duration;

use canvas_types::ConfigError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Normalized API error shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message
    pub message: String,
    /// Machine-readable code
    pub code: String,
    /// Extra context, e.g. `status` and `statusText`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

/// Body shape accepted as an already-normalized error
#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
    code: Option<String>,
    details: Option<Map<String, Value>>,
}

impl ApiError {
    /// Normalize a failed response
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let fallback_code = format!("HTTP_{}", status.as_u16());

        if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
            return Self {
                message: parsed.message,
                code: parsed.code.unwrap_or(fallback_code),
                details: parsed.details.unwrap_or_default(),
            };
        }

        let mut details = Map::new();
        details.insert("status".to_string(), json!(status.as_u16()));
        details.insert(
            "statusText".to_string(),
            json!(status.canonical_reason().unwrap_or_default()),
        );
        Self {
            message: format!("Request failed with status code {}", status.as_u16()),
            code: fallback_code,
            details,
        }
    }

    /// HTTP status recorded in `details`, if any
    pub fn status(&self) -> Option<u16> {
        self.details
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request could not be sent or the connection dropped
    #[error("network error: {0}")]
    Network(String),

    /// No response within the configured timeout
    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    /// Still rate limited after the single allowed retry
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Last server hint
        retry_after: Duration,
    },

    /// Session could not be refreshed; the caller must sign in again
    #[error("authentication expired")]
    AuthExpired,

    /// Normalized non-2xx response
    #[error("api error: {0}")]
    Api(ApiError),

    /// Body could not be encoded or decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Returns true if repeating the call later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Timeout(_) => true,
            Self::RateLimited { .. } => true,
            Self::AuthExpired => false, // Needs a new sign-in
            Self::Api(err) => err.status().is_some_and(|status| status >= 500),
            Self::Decode(_) => false,
            Self::Config(_) => false,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &str {
        match self {
            Self::Network(_) => "NETWORK_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::Api(err) => &err.code,
            Self::Decode(_) => "DECODE_ERROR",
            Self::Config(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_body_is_normalized() {
        let err = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded");

        assert_eq!(err.code, "HTTP_500");
        assert_eq!(err.message, "Request failed with status code 500");
        assert_eq!(err.details["status"], json!(500));
        assert_eq!(err.details["statusText"], json!("Internal Server Error"));
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_schema_body_passes_through() {
        let body =
            r#"{"message":"Prompt rejected","code":"CONTENT_POLICY","details":{"field":"prompt"}}"#;
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, body);

        assert_eq!(err.message, "Prompt rejected");
        assert_eq!(err.code, "CONTENT_POLICY");
        assert_eq!(err.details["field"], json!("prompt"));
    }

    #[test]
    fn test_schema_body_without_code_gets_status_code() {
        let err = ApiError::from_response(StatusCode::NOT_FOUND, r#"{"message":"No such image"}"#);
        assert_eq!(err.code, "HTTP_404");
        assert!(err.details.is_empty());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ClientError::Network("reset".to_string()).is_retryable());
        assert!(ClientError::RateLimited {
            retry_after: Duration::from_secs(1)
        }
        .is_retryable());
        assert!(!ClientError::AuthExpired.is_retryable());

        let server = ApiError::from_response(StatusCode::BAD_GATEWAY, "");
        assert!(ClientError::Api(server).is_retryable());
        let client = ApiError::from_response(StatusCode::BAD_REQUEST, "");
        assert!(!ClientError::Api(client).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ClientError::AuthExpired.error_code(), "AUTH_EXPIRED");
        let api = ApiError::from_response(StatusCode::CONFLICT, "");
        assert_eq!(ClientError::Api(api).error_code(), "HTTP_409");
    }
}
