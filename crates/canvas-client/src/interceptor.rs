//! Request interceptors
//!
//! Applied to every outgoing request, including retries, so a refreshed
//! token is picked up on the next send.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;

use crate::error::{ClientError, ClientResult};
use crate::session::TokenStore;

/// Header carrying the per-send request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the static generation API key
pub const API_KEY_HEADER: &str = "Api-Key";

/// Mutates an outgoing request
pub trait Interceptor: Send + Sync {
    fn intercept(&self, request: RequestBuilder) -> ClientResult<RequestBuilder>;
}

/// Format a bearer `Authorization` value
pub fn bearer(token: &str) -> ClientResult<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ClientError::Decode("invalid token format".to_string()))
}

/// Adds the current access token, if any
#[derive(Clone)]
pub struct AuthInterceptor {
    tokens: Arc<dyn TokenStore>,
}

impl AuthInterceptor {
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self { tokens }
    }
}

impl Interceptor for AuthInterceptor {
    fn intercept(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        match self.tokens.access_token() {
            Some(token) => Ok(request.header(AUTHORIZATION, bearer(&token)?)),
            None => Ok(request),
        }
    }
}

/// Adds a fresh UUID v4 request id
#[derive(Debug, Clone, Default)]
pub struct RequestIdInterceptor;

impl RequestIdInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for RequestIdInterceptor {
    fn intercept(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        Ok(request.header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string()))
    }
}

/// Adds a static `Api-Key` header
#[derive(Clone)]
pub struct ApiKeyInterceptor {
    value: HeaderValue,
}

impl ApiKeyInterceptor {
    pub fn new(key: &str) -> ClientResult<Self> {
        let mut value = HeaderValue::from_str(key)
            .map_err(|_| ClientError::Decode("invalid api key format".to_string()))?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

impl Interceptor for ApiKeyInterceptor {
    fn intercept(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        Ok(request.header(API_KEY_HEADER, self.value.clone()))
    }
}

/// Applies interceptors in order
#[derive(Clone, Default)]
pub struct CombinedInterceptor {
    chain: Vec<Arc<dyn Interceptor>>,
}

impl CombinedInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.chain.push(Arc::new(interceptor));
        self
    }
}

impl Interceptor for CombinedInterceptor {
    fn intercept(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        self.chain
            .iter()
            .try_fold(request, |request, interceptor| interceptor.intercept(request))
    }
}
