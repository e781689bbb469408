//! Credit cost calculation
//!
//! Pure and deterministic so callers can preview the price of a request
//! before submitting it.

use serde::{Deserialize, Serialize};

use crate::{models, GenerationParams};

/// Pricing bucket for a generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostTier {
    /// Up to 512x512 on a basic model
    Standard,
    /// Above 512 on either side, or a realistic/portrait model
    Hd,
    /// Above 1024 on either side
    UltraHd,
    /// Artistic model at standard resolution
    Custom,
    /// Variation of an existing asset (not priced by [`cost`] yet)
    EditExisting,
}

impl CostTier {
    /// Credits charged for this bucket
    pub const fn credits(&self) -> u32 {
        match self {
            Self::Standard => 1,
            Self::Hd => 3,
            Self::UltraHd => 7,
            Self::Custom => 10,
            Self::EditExisting => 2,
        }
    }

    /// Classify a request; the first matching rule wins
    pub fn classify(params: &GenerationParams) -> Self {
        let model = params.model.as_str();
        if params.width > 1024 || params.height > 1024 {
            Self::UltraHd
        } else if params.width > 512
            || params.height > 512
            || model == models::REALISTIC
            || model == models::PORTRAIT
        {
            Self::Hd
        } else if model == models::ARTISTIC {
            Self::Custom
        } else {
            Self::Standard
        }
    }
}

/// Credits a generation request will consume
pub fn cost(params: &GenerationParams) -> u32 {
    CostTier::classify(params).credits()
}
