//! Common test utilities for canvas-ledger integration tests

pub mod fakes;

#[allow(unused_imports)]
pub use fakes::{
    account_with, ledger_for, seed_account, seed_overdrawn, utc, FlakyStore, ManualClock,
    StubGenerator, YieldingStore,
};
