//! Generation request and generated asset types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AccountId, ValidationError};

/// Model identifiers with special pricing or routing
pub mod models {
    pub const DEFAULT: &str = "default";
    pub const REALISTIC: &str = "realistic";
    pub const PORTRAIT: &str = "portrait";
    pub const ARTISTIC: &str = "artistic";
}

/// Maximum prompt length in characters
pub const MAX_PROMPT_CHARS: usize = 1_000;

/// Accepted sampling step range
pub const STEPS_RANGE: std::ops::RangeInclusive<u32> = 10..=150;

/// Accepted guidance scale range
pub const GUIDANCE_RANGE: std::ops::RangeInclusive<f32> = 1.0..=20.0;

/// Parameters of one generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    /// Positive prompt
    pub prompt: String,
    /// Negative prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Model selection
    pub model: String,
    /// Sampling steps
    pub steps: u32,
    /// Guidance scale
    pub guidance: f32,
}

impl GenerationParams {
    /// Request with default settings (512x512, default model, 30 steps, 7.5 guidance)
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            width: 512,
            height: 512,
            model: models::DEFAULT.to_string(),
            steps: 30,
            guidance: 7.5,
        }
    }

    /// Set output dimensions
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the negative prompt; blank strings clear it
    #[must_use]
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        self.negative_prompt = (!negative.trim().is_empty()).then_some(negative);
        self
    }

    /// Set sampling steps
    #[must_use]
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Set guidance scale
    #[must_use]
    pub fn with_guidance(mut self, guidance: f32) -> Self {
        self.guidance = guidance;
        self
    }

    /// Check the request against the accepted ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        let chars = prompt.chars().count();
        if chars > MAX_PROMPT_CHARS {
            return Err(ValidationError::PromptTooLong {
                max: MAX_PROMPT_CHARS,
                actual: chars,
            });
        }
        if self.width == 0 || self.height == 0 {
            return Err(ValidationError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if !STEPS_RANGE.contains(&self.steps) {
            return Err(ValidationError::StepsOutOfRange(self.steps));
        }
        if !GUIDANCE_RANGE.contains(&self.guidance) {
            return Err(ValidationError::GuidanceOutOfRange(self.guidance));
        }
        Ok(())
    }
}

/// Generated asset identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Create a new random asset ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored generation result, owned by an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAsset {
    /// Asset ID
    pub id: AssetId,
    /// Image location (remote URL or `data:` URL)
    pub url: String,
    /// Prompt used
    pub prompt: String,
    /// Full request parameters
    pub parameters: GenerationParams,
    /// When the asset was stored
    pub created_at: DateTime<Utc>,
    /// Owning account
    pub owner_id: AccountId,
}
