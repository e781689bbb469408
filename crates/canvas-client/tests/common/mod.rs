//! Common test utilities for canvas-client integration tests

use std::sync::Arc;
use std::time::Duration;

use canvas_client::{ApiClient, ClientConfig, MemoryTokenStore, SessionTokens};
use wiremock::MockServer;

/// Signed-in token store
#[allow(dead_code)]
pub fn signed_in(access: &str, refresh: Option<&str>) -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_tokens(SessionTokens::new(
        access,
        refresh.map(str::to_string),
    )))
}

/// Client pointed at the mock server
#[allow(dead_code)]
pub fn client_for(server: &MockServer, tokens: Arc<MemoryTokenStore>) -> ApiClient {
    client_with(ClientConfig::new(server.uri()), tokens)
}

/// Client with a custom config
#[allow(dead_code)]
pub fn client_with(config: ClientConfig, tokens: Arc<MemoryTokenStore>) -> ApiClient {
    ApiClient::new(config.with_max_retry_after(Duration::from_secs(5)), tokens).unwrap()
}
