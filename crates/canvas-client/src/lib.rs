//! Canvas Client - HTTP access to the DreamCanvas backend
//!
//! [`ApiClient`] wraps `reqwest` with bearer auth, request ids, a single
//! rate-limit retry and a single post-refresh retry. [`GenerationClient`]
//! builds on it to implement [`canvas_ledger::ImageGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canvas_client::{ApiClient, ClientConfig, GenerationClient, MemoryTokenStore};
//!
//! let api = ApiClient::new(ClientConfig::from_env()?, Arc::new(MemoryTokenStore::new()))?;
//! let orchestrator = GenerationOrchestrator::new(ledger, Arc::new(GenerationClient::new(api)));
//! ```

pub mod config;
pub mod error;
pub mod generation;
pub mod http;
pub mod interceptor;
pub mod retry;
pub mod session;

pub use config::ClientConfig;
pub use error::{ApiError, ClientError, ClientResult};
pub use generation::{flux_proportion, Endpoint, GenerationClient};
pub use http::ApiClient;
pub use session::{MemoryTokenStore, SessionTokens, TokenStore};
