//! Store errors

use thiserror::Error;

/// Document store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Target document does not exist
    #[error("document not found: {0}")]
    NotFound(String),

    /// Store could not be reached or returned a server error
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Caller is not allowed to touch the document
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A write precondition did not hold
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Backend does not offer the requested capability
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Stored data or a response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
