//! Canvas Ledger - Credit accounting
//!
//! Ledger operations (consume, monthly reset, tier change), per-sign-in
//! account bootstrap, the asset library, profile edits and the generation
//! orchestrator. All of it runs against an injected
//! [`canvas_store::AccountStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canvas_ledger::{Identity, Ledger, SessionBootstrap};
//! use canvas_store::MemoryStore;
//!
//! let ledger = Ledger::new(Arc::new(MemoryStore::new()));
//! let report = SessionBootstrap::new(ledger.clone()).run(&identity).await?;
//! let receipt = ledger.consume(&report.account.id, 3).await?;
//! ```

pub mod assets;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod error;
pub mod generation;
pub mod ledger;
pub mod profile;

pub use assets::{AssetFilter, AssetLibrary};
pub use bootstrap::{
    BootstrapConfig, BootstrapError, BootstrapReport, BootstrapState, Identity, SessionBootstrap,
};
pub use clock::{Clock, SystemClock};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use generation::{GeneratedImage, GenerationOrchestrator, GenerationOutcome, ImageGenerator};
pub use ledger::{ConsumeReceipt, Ledger, ResetOutcome, TierChange, TierChangeQuote};
pub use profile::ProfileUpdate;
