//! Ledger errors

use canvas_store::StoreError;
use canvas_types::{AccountId, AssetId, ValidationError};
use thiserror::Error;

/// Ledger, library and orchestration errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Balance does not cover the charge; nothing was written
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientCredits {
        /// Credits the operation needs
        required: u32,
        /// Balance at the time of the check
        available: u32,
    },

    /// Tier string is not one of the catalog tiers
    #[error("invalid tier: {0}")]
    InvalidTier(String),

    /// Charges must be positive
    #[error("invalid amount: {0}")]
    InvalidAmount(u32),

    /// No account record for this identity
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Stored balance is negative after an unguarded concurrent charge.
    ///
    /// Cleared by the next monthly reset or a tier change.
    #[error("account {account_id} is overdrawn: balance {balance}")]
    Overdrawn {
        account_id: AccountId,
        /// Stored balance, below zero
        balance: i64,
    },

    /// Document store outage or unreadable record
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Only the owning account may perform this action
    #[error("not the owner of this asset")]
    NotOwner,

    /// No asset with this id for the owner
    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),

    /// Generation request failed validation
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// Generation collaborator failed after credits were charged
    #[error("generation failed after charging {charged} credits: {message}")]
    Generation {
        /// Collaborator error message
        message: String,
        /// Credits already consumed for the request
        charged: u32,
    },

    /// Image was generated and paid for but could not be stored
    #[error("asset could not be saved after charging {charged} credits: {message}")]
    AssetSave {
        /// Store error message
        message: String,
        /// Credits already consumed for the request
        charged: u32,
    },
}

/// Result alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            Self::InvalidTier(_) => "INVALID_TIER",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::Overdrawn { .. } => "ACCOUNT_OVERDRAWN",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::NotOwner => "NOT_OWNER",
            Self::AssetNotFound(_) => "ASSET_NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Generation { .. } => "GENERATION_FAILED",
            Self::AssetSave { .. } => "ASSET_SAVE_FAILED",
        }
    }

    /// Whether the user can resolve this (upgrade, wait, retry, edit the request)
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCredits { .. }
                | Self::Overdrawn { .. }
                | Self::StoreUnavailable(_)
                | Self::InvalidRequest(_)
                | Self::Generation { .. }
                | Self::AssetSave { .. }
        )
    }

    /// Map a store error for a write against a known account
    pub(crate) fn for_account(err: StoreError, id: &AccountId) -> Self {
        match err {
            StoreError::NotFound(_) => Self::AccountNotFound(id.clone()),
            other => other.into(),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Store error: {}", err);
        Self::StoreUnavailable(err.to_string())
    }
}
