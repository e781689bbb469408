//! Account types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Tier;

/// Opaque identity-provider key for an account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create a new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Document field names used by account records.
pub mod fields {
    pub const ID: &str = "id";
    pub const EMAIL: &str = "email";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const PHOTO_URL: &str = "photoURL";
    pub const PROVIDER: &str = "provider";
    pub const TIER: &str = "tier";
    pub const CREDITS_REMAINING: &str = "creditsRemaining";
    pub const CREDITS_USED_THIS_CYCLE: &str = "creditsUsedThisCycle";
    pub const TOTAL_GENERATIONS: &str = "totalGenerations";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const LAST_CREDIT_RESET: &str = "lastCreditReset";
    pub const LAST_GENERATION_AT: &str = "lastGenerationAt";
    pub const LAST_LOGIN_AT: &str = "lastLoginAt";
    pub const TIER_CHANGED_AT: &str = "tierChangedAt";
}

/// One account per authenticated identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Identity-provider key
    pub id: AccountId,
    /// Email address
    pub email: Option<String>,
    /// Display name
    pub display_name: Option<String>,
    /// Avatar URL
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Sign-in provider (e.g. `google.com`, `password`)
    #[serde(default)]
    pub provider: Option<String>,
    /// Stored tier string; see [`Account::effective_tier`]
    pub tier: String,
    /// Spendable balance
    pub credits_remaining: u32,
    /// Credits spent since the last reset
    #[serde(default)]
    pub credits_used_this_cycle: u32,
    /// Lifetime successful generations
    #[serde(default)]
    pub total_generations: u64,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Start of the current billing cycle
    pub last_credit_reset: DateTime<Utc>,
    /// Last successful consume
    #[serde(default)]
    pub last_generation_at: Option<DateTime<Utc>>,
    /// Last subscription change
    #[serde(default)]
    pub tier_changed_at: Option<DateTime<Utc>>,
    /// Last profile edit
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last successful sign-in bootstrap
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Fresh FREE-tier account for a newly seen identity
    pub fn new_free(id: AccountId, profile: Profile, now: DateTime<Utc>) -> Self {
        let display_name = profile.display_name_or_default();
        Self {
            id,
            email: profile.email,
            display_name: Some(display_name),
            photo_url: profile.photo_url,
            provider: profile.provider,
            tier: Tier::Free.as_str().to_string(),
            credits_remaining: Tier::Free.monthly_credits(),
            credits_used_this_cycle: 0,
            total_generations: 0,
            created_at: now,
            last_credit_reset: now,
            last_generation_at: None,
            tier_changed_at: None,
            updated_at: None,
            last_login_at: Some(now),
        }
    }

    /// Tier used for allotment; unknown stored values count as FREE
    pub fn effective_tier(&self) -> Tier {
        Tier::resolve_or_free(&self.tier)
    }

    /// Whether the balance covers `amount`
    pub fn can_afford(&self, amount: u32) -> bool {
        self.credits_remaining >= amount
    }
}

/// Profile attributes issued by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Email address
    pub email: Option<String>,
    /// Display name
    pub display_name: Option<String>,
    /// Avatar URL
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Sign-in provider
    pub provider: Option<String>,
}

impl Profile {
    /// Display name, falling back to the email local part, then `User`
    pub fn display_name_or_default(&self) -> String {
        self.display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string())
    }
}
