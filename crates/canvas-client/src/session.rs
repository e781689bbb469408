//! Session token storage
//!
//! The HTTP wrapper reads the access token for every request and replaces
//! both tokens after a successful refresh.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Access/refresh token pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Where the client keeps the current session
pub trait TokenStore: Send + Sync {
    /// Current access token
    fn access_token(&self) -> Option<String>;

    /// Current refresh token
    fn refresh_token(&self) -> Option<String>;

    /// Replace the stored tokens
    fn store(&self, tokens: SessionTokens);

    /// Forget the session
    fn clear(&self);
}

/// In-process token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Option<SessionTokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: SessionTokens) -> Self {
        Self {
            tokens: RwLock::new(Some(tokens)),
        }
    }

    fn read(&self) -> Option<SessionTokens> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.read().map(|tokens| tokens.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().and_then(|tokens| tokens.refresh_token)
    }

    fn store(&self, tokens: SessionTokens) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
    }

    fn clear(&self) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_clear() {
        let store = MemoryTokenStore::new();
        assert!(store.access_token().is_none());

        store.store(SessionTokens::new("access", Some("refresh".to_string())));
        assert_eq!(store.access_token().as_deref(), Some("access"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));

        store.clear();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_refresh_response_shape() {
        let tokens: SessionTokens =
            serde_json::from_str(r#"{"accessToken":"a2","refreshToken":"r2"}"#).unwrap();
        assert_eq!(tokens, SessionTokens::new("a2", Some("r2".to_string())));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens = SessionTokens::new("secret-access", Some("secret-refresh".to_string()));
        let debug = format!("{tokens:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}
