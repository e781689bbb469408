//! Canvas Types - Shared domain types
//!
//! This crate contains domain types used across the DreamCanvas ledger:
//! - Accounts and identity profiles
//! - Subscription tiers and the tier catalog
//! - Generation requests, stored assets and credit pricing
//! - Environment configuration helpers

pub mod account;
pub mod asset;
pub mod config;
pub mod cost;
pub mod error;
pub mod tier;

pub use account::*;
pub use asset::*;
pub use config::ConfigError;
pub use cost::*;
pub use error::*;
pub use tier::*;
