//! HTTP wrapper
//!
//! Every request carries a bearer token (when signed in) and a fresh
//! request id. Responses are handled as follows:
//! - 429: wait for `Retry-After` (default 1s) and retry once; a second 429
//!   becomes [`ClientError::RateLimited`]
//! - 401: refresh the session once and retry; if the refresh fails the
//!   stored tokens are cleared and the call fails with
//!   [`ClientError::AuthExpired`]
//! - timeouts fail with [`ClientError::Timeout`] and are not retried
//! - any other non-2xx becomes [`ClientError::Api`]

use std::sync::Arc;

use reqwest::header::RETRY_AFTER;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ClientError, ClientResult};
use crate::interceptor::{
    ApiKeyInterceptor, AuthInterceptor, CombinedInterceptor, Interceptor, RequestIdInterceptor,
};
use crate::retry::RetryPolicy;
use crate::session::{SessionTokens, TokenStore};

/// Path of the session refresh endpoint
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Authenticated JSON client
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: Arc<dyn TokenStore>,
    interceptor: CombinedInterceptor,
    refresh_interceptor: CombinedInterceptor,
    policy: RetryPolicy,
}

impl ApiClient {
    /// Create a new client
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let mut interceptor = CombinedInterceptor::new()
            .with(AuthInterceptor::new(tokens.clone()))
            .with(RequestIdInterceptor::new());
        if let Some(key) = config.api_key.as_deref() {
            interceptor = interceptor.with(ApiKeyInterceptor::new(key)?);
        }

        let policy = RetryPolicy::new()
            .with_default_retry_after(config.default_retry_after)
            .with_max_retry_after(config.max_retry_after);

        Ok(Self {
            http,
            config,
            tokens,
            interceptor,
            refresh_interceptor: CombinedInterceptor::new().with(RequestIdInterceptor::new()),
            policy,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session token store
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(&body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(&body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request(Method::DELETE, path, None).await
    }

    /// Send one logical request, applying the 429 and 401 rules
    #[instrument(skip(self, method, body), fields(method = %method))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<T> {
        let mut sends = 0u32;
        let mut rate_limited = false;
        let mut refreshed = false;

        loop {
            sends += 1;
            let response = self.send(&self.interceptor, method.clone(), path, body).await?;
            let status = response.status();

            if status.is_success() {
                return decode(response).await;
            }

            match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    let wait = self.policy.retry_after(response.headers().get(RETRY_AFTER));
                    if rate_limited || sends >= self.policy.max_sends {
                        warn!(path, ?wait, "Still rate limited after retry");
                        return Err(ClientError::RateLimited { retry_after: wait });
                    }
                    rate_limited = true;
                    debug!(path, ?wait, "Rate limited, waiting before retry");
                    tokio::time::sleep(wait).await;
                }
                StatusCode::UNAUTHORIZED => {
                    if refreshed || sends >= self.policy.max_sends {
                        warn!(path, "Refreshed session was rejected");
                        self.tokens.clear();
                        return Err(ClientError::AuthExpired);
                    }
                    refreshed = true;
                    self.refresh().await?;
                }
                _ => {
                    let text = response.text().await.unwrap_or_default();
                    let err = ApiError::from_response(status, &text);
                    debug!(path, status = status.as_u16(), code = %err.code, "Request failed");
                    return Err(ClientError::Api(err));
                }
            }
        }
    }

    /// Exchange the refresh token for a new pair.
    ///
    /// Any failure clears the session.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> ClientResult<()> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            warn!("No refresh token, session expired");
            self.tokens.clear();
            return Err(ClientError::AuthExpired);
        };

        let body = json!({ "refreshToken": refresh_token });
        let result = match self
            .send(&self.refresh_interceptor, Method::POST, REFRESH_PATH, Some(&body))
            .await
        {
            Ok(response) if response.status().is_success() => {
                decode::<SessionTokens>(response).await
            }
            Ok(response) => Err(ClientError::Api(ApiError::from_response(
                response.status(),
                "",
            ))),
            Err(err) => Err(err),
        };

        match result {
            Ok(tokens) => {
                debug!("Session refreshed");
                self.tokens.store(tokens);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Session refresh failed");
                self.tokens.clear();
                Err(ClientError::AuthExpired)
            }
        }
    }

    async fn send(
        &self,
        interceptor: &CombinedInterceptor,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<Response> {
        let mut request = self.http.request(method, self.config.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = interceptor.intercept(request)?;

        request.send().await.map_err(|err| {
            if err.is_timeout() {
                ClientError::Timeout(self.config.request_timeout)
            } else {
                ClientError::from(err)
            }
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}
