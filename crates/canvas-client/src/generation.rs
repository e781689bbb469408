//! Generation API client
//!
//! Model routing:
//! - `realistic`, `portrait` -> `/xl`
//! - `artistic` -> `/flux`, with a named proportion instead of pixel sizes
//! - anything else -> `/`
//!
//! The backend answers with base64 image data which is returned as a
//! `data:` URL.

use async_trait::async_trait;
use canvas_ledger::{GeneratedImage, ImageGenerator};
use canvas_types::{models, GenerationParams};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;

/// Mime type assumed when the backend omits one
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Generation backend endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Xl,
    Flux,
    Standard,
}

impl Endpoint {
    /// Endpoint serving `model`
    pub fn for_model(model: &str) -> Self {
        match model {
            models::REALISTIC | models::PORTRAIT => Self::Xl,
            models::ARTISTIC => Self::Flux,
            _ => Self::Standard,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Xl => "/xl",
            Self::Flux => "/flux",
            Self::Standard => "/",
        }
    }
}

/// Named aspect ratio for the flux endpoint
pub fn flux_proportion(width: u32, height: u32) -> &'static str {
    if height == 0 {
        return "square";
    }
    let ratio = f64::from(width) / f64::from(height);

    if ratio > 1.4 {
        "wide"
    } else if ratio > 1.1 {
        "landscape"
    } else if ratio < 0.7 {
        "vertical"
    } else if ratio < 0.9 {
        "portrait"
    } else {
        "square"
    }
}

#[derive(Debug, Serialize)]
struct GenerationPayload<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proportion: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
}

impl<'a> GenerationPayload<'a> {
    fn new(endpoint: Endpoint, params: &'a GenerationParams) -> Self {
        let flux = endpoint == Endpoint::Flux;
        Self {
            prompt: &params.prompt,
            negative_prompt: params.negative_prompt.as_deref(),
            proportion: flux.then(|| flux_proportion(params.width, params.height)),
            width: (!flux).then_some(params.width),
            height: (!flux).then_some(params.height),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    image_data: Option<String>,
    mime_type: Option<String>,
}

impl GenerationResponse {
    fn into_data_url(self) -> ClientResult<String> {
        let data = self
            .image_data
            .filter(|data| !data.is_empty())
            .ok_or_else(|| ClientError::Decode("response carried no image data".to_string()))?;
        let mime = self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE);
        Ok(format!("data:{mime};base64,{data}"))
    }
}

/// Image generator backed by the generation API
#[derive(Clone)]
pub struct GenerationClient {
    api: ApiClient,
}

impl GenerationClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Underlying HTTP client
    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl ImageGenerator for GenerationClient {
    type Error = ClientError;

    #[instrument(skip(self, params), fields(model = %params.model))]
    async fn generate(&self, params: &GenerationParams) -> Result<GeneratedImage, ClientError> {
        let endpoint = Endpoint::for_model(&params.model);
        let payload = GenerationPayload::new(endpoint, params);
        debug!(path = endpoint.path(), "Requesting generation");

        let response: GenerationResponse = self.api.post(endpoint.path(), &payload).await?;
        Ok(GeneratedImage {
            url: response.into_data_url()?,
        })
    }
}
