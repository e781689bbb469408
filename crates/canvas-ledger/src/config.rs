//! Ledger configuration

use std::time::Duration;

use canvas_types::config::{env_or, env_parse, load_env};
use canvas_types::ConfigError;

use crate::bootstrap::BootstrapConfig;

/// Collection holding one document per account
pub const DEFAULT_ACCOUNTS_COLLECTION: &str = "users";

/// Ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Account collection name; assets live under `{collection}/{owner}/images`
    pub accounts_collection: String,
    /// Session bootstrap retry settings
    pub bootstrap: BootstrapConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            accounts_collection: DEFAULT_ACCOUNTS_COLLECTION.to_string(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        load_env();
        let defaults = BootstrapConfig::default();
        let attempts = env_parse("CANVAS_BOOTSTRAP_ATTEMPTS", defaults.max_attempts)?;
        if attempts == 0 {
            return Err(ConfigError::Invalid("CANVAS_BOOTSTRAP_ATTEMPTS"));
        }
        let base_delay_ms = env_parse(
            "CANVAS_BOOTSTRAP_BASE_DELAY_MS",
            defaults.base_delay.as_millis() as u64,
        )?;

        Ok(Self {
            accounts_collection: env_or("CANVAS_ACCOUNTS_COLLECTION", DEFAULT_ACCOUNTS_COLLECTION),
            bootstrap: defaults
                .with_max_attempts(attempts)
                .with_base_delay(Duration::from_millis(base_delay_ms)),
        })
    }

    #[must_use]
    pub fn with_accounts_collection(mut self, collection: impl Into<String>) -> Self {
        self.accounts_collection = collection.into();
        self
    }

    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: BootstrapConfig) -> Self {
        self.bootstrap = bootstrap;
        self
    }
}
