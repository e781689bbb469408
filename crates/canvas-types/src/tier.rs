//! Subscription tier types

use serde::{Deserialize, Serialize};

/// Subscription tier levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// Free tier - $0/mo, 50 credits
    Free,
    /// Basic tier - $9.99/mo, 200 credits
    Basic,
    /// Pro tier - $19.99/mo, 600 credits
    Pro,
    /// Unlimited tier - $49.99/mo, 2000 credits
    Unlimited,
}

impl Tier {
    /// All tiers, cheapest first
    pub const ALL: [Tier; 4] = [Self::Free, Self::Basic, Self::Pro, Self::Unlimited];

    /// Credits granted at the start of every billing cycle
    pub const fn monthly_credits(&self) -> u32 {
        match self {
            Self::Free => 50,
            Self::Basic => 200,
            Self::Pro => 600,
            Self::Unlimited => 2_000,
        }
    }

    /// Get the monthly price in cents
    pub const fn price_cents(&self) -> u32 {
        match self {
            Self::Free => 0,
            Self::Basic => 999,
            Self::Pro => 1_999,
            Self::Unlimited => 4_999,
        }
    }

    /// Marketing name shown on the plans page
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Basic => "Basic",
            Self::Pro => "Professional",
            Self::Unlimited => "Enterprise",
        }
    }

    /// Get features available for this tier
    pub const fn features(&self) -> &'static [&'static str] {
        match self {
            Self::Free => &[
                "Basic image generation",
                "Standard resolution (512x512)",
                "Basic models only",
                "50 tokens per month",
                "Community support",
            ],
            Self::Basic => &[
                "Higher quality image generation",
                "HD resolution (1024x1024)",
                "Access to all models",
                "200 tokens per month",
                "Email support",
                "Save and organize creations",
            ],
            Self::Pro => &[
                "Premium image generation",
                "Ultra HD resolution (2048x2048)",
                "Advanced settings and controls",
                "Priority processing",
                "600 tokens per month",
                "Priority support",
                "Commercial usage rights",
            ],
            Self::Unlimited => &[
                "Unlimited resolution options",
                "API access",
                "Custom model fine-tuning",
                "Bulk generation",
                "2000 tokens per month",
                "Dedicated support manager",
                "Full commercial rights",
                "White-label option",
            ],
        }
    }

    /// Stored string form (`FREE`, `BASIC`, ...)
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Basic => "BASIC",
            Self::Pro => "PRO",
            Self::Unlimited => "UNLIMITED",
        }
    }

    /// Full catalog entry for this tier
    pub fn definition(&self) -> TierDefinition {
        TierDefinition {
            tier: *self,
            name: self.display_name(),
            monthly_credits: self.monthly_credits(),
            price_cents: self.price_cents(),
            features: self.features(),
        }
    }

    /// Resolve a stored tier string for allotment purposes.
    ///
    /// Unknown values resolve to [`Tier::Free`]; the stored value itself is
    /// left untouched by callers.
    pub fn resolve_or_free(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Free)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FREE" => Ok(Self::Free),
            "BASIC" => Ok(Self::Basic),
            "PRO" | "PROFESSIONAL" => Ok(Self::Pro),
            "UNLIMITED" | "ENTERPRISE" => Ok(Self::Unlimited),
            _ => Err(TierParseError(s.to_string())),
        }
    }
}

/// Error parsing a tier string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tier: {0}")]
pub struct TierParseError(pub String);

/// Static catalog entry for a tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDefinition {
    /// Tier this entry describes
    pub tier: Tier,
    /// Display name
    pub name: &'static str,
    /// Credits granted per billing cycle
    pub monthly_credits: u32,
    /// Monthly price in cents
    pub price_cents: u32,
    /// Feature bullet points
    pub features: &'static [&'static str],
}

impl TierDefinition {
    /// Price formatted as dollars, e.g. `$19.99`
    pub fn price_display(&self) -> String {
        format!("${}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}

/// The full tier catalog, cheapest first
pub fn catalog() -> Vec<TierDefinition> {
    Tier::ALL.iter().map(Tier::definition).collect()
}
