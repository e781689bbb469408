//! Session bootstrap
//!
//! Runs once per sign-in: makes sure exactly one account record exists for
//! the identity, confirms it can be read back, then replenishes credits if a
//! new month has started.
//!
//! ```text
//! Checking --present--> Verifying --> Ready
//!    |                      ^
//!    +--absent--> Creating -+    (create/verify retried with backoff)
//!                                 exhausted or read error --> Failed
//! ```
//!
//! An existing overdrawn record is accepted; the reset that follows may
//! repair it. The reported account is read back after a reset fires.

use std::fmt;
use std::time::Duration;

use canvas_store::{to_document, AccountStore, Document, FieldUpdates};
use canvas_types::fields;
use canvas_types::{Account, AccountId, Profile};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::clock::timestamp_value;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{decode_account, Ledger, ResetOutcome};

/// Authenticated identity handed over by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider user id, used as the account id
    pub id: AccountId,
    /// Profile attributes from the provider
    pub profile: Profile,
}

impl Identity {
    pub fn new(id: impl Into<String>, profile: Profile) -> Self {
        Self {
            id: AccountId::new(id),
            profile,
        }
    }
}

/// Bootstrap state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapState {
    Checking,
    Creating,
    Verifying,
    Ready,
    Failed,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Checking => "checking",
            Self::Creating => "creating",
            Self::Verifying => "verifying",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Retry settings for the create/verify cycle
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Create/verify cycles attempted before giving up
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BootstrapConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay after failed attempt `attempt` (0-based): `base_delay * 2^attempt`,
    /// capped at `max_delay`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Successful bootstrap
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    /// Account after verification and any credit reset
    pub account: Account,
    /// Whether this run wrote the record
    pub created: bool,
    /// Create/verify cycles used (0 when the record already existed)
    pub attempts: u32,
    /// Result of the post-bootstrap credit reset; `None` if it failed
    pub reset: Option<ResetOutcome>,
    /// States visited, in order
    pub transitions: Vec<BootstrapState>,
}

/// Bootstrap gave up; the identity stays signed in without a usable balance
#[derive(Debug, thiserror::Error)]
#[error("account bootstrap failed for {account_id} after {attempts} attempt(s): {source}")]
pub struct BootstrapError {
    /// Identity that could not be provisioned
    pub account_id: AccountId,
    /// Create/verify cycles attempted
    pub attempts: u32,
    /// Last underlying failure
    #[source]
    pub source: LedgerError,
    /// States visited, ending in [`BootstrapState::Failed`]
    pub transitions: Vec<BootstrapState>,
}

impl BootstrapError {
    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        "ACCOUNT_BOOTSTRAP_FAILED"
    }
}

/// Per-sign-in account provisioning
pub struct SessionBootstrap<S: AccountStore> {
    ledger: Ledger<S>,
    config: BootstrapConfig,
}

impl<S: AccountStore> SessionBootstrap<S> {
    /// Create using the ledger's bootstrap settings
    pub fn new(ledger: Ledger<S>) -> Self {
        let config = ledger.config().bootstrap.clone();
        Self { ledger, config }
    }

    /// Override retry settings
    pub fn with_config(mut self, config: BootstrapConfig) -> Self {
        self.config = config;
        self
    }

    /// Ensure the account exists and is current
    #[instrument(skip(self, identity), fields(account_id = %identity.id))]
    pub async fn run(&self, identity: &Identity) -> Result<BootstrapReport, BootstrapError> {
        let mut transitions = Vec::new();
        enter(&mut transitions, BootstrapState::Checking);

        let existing = match self
            .ledger
            .store()
            .get(self.ledger.collection(), identity.id.as_str())
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "Account lookup failed");
                return Err(self.fail(identity, 0, e.into(), transitions));
            }
        };

        let (verified, created, attempts) = match existing {
            Some(document) => {
                enter(&mut transitions, BootstrapState::Verifying);
                match verify(&identity.id, document) {
                    Ok(account) => {
                        self.stamp_login(&identity.id).await;
                        (Some(account), false, 0)
                    }
                    Err(LedgerError::Overdrawn { balance, .. }) => {
                        warn!(balance, "Existing account is overdrawn");
                        self.stamp_login(&identity.id).await;
                        (None, false, 0)
                    }
                    Err(e) => return Err(self.fail(identity, 0, e, transitions)),
                }
            }
            None => {
                let (account, created, attempts) =
                    self.create_with_retry(identity, &mut transitions).await?;
                (Some(account), created, attempts)
            }
        };

        let reset = match self.ledger.reset_if_due(&identity.id).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "Credit reset during bootstrap failed");
                None
            }
        };

        let account = match (verified, reset) {
            (Some(account), None | Some(ResetOutcome::NotDue)) => account,
            (verified, _) => match self.ledger.account(&identity.id).await {
                Ok(account) => account,
                Err(e) => match (verified, reset) {
                    (Some(mut account), Some(ResetOutcome::Reset { credits, .. })) => {
                        warn!(error = %e, "Read-back after reset failed, applying locally");
                        account.credits_remaining = credits;
                        account.credits_used_this_cycle = 0;
                        account.last_credit_reset = self.ledger.now();
                        account
                    }
                    _ => return Err(self.fail(identity, attempts, e, transitions)),
                },
            },
        };

        enter(&mut transitions, BootstrapState::Ready);
        Ok(BootstrapReport {
            account,
            created,
            attempts,
            reset,
            transitions,
        })
    }

    async fn create_with_retry(
        &self,
        identity: &Identity,
        transitions: &mut Vec<BootstrapState>,
    ) -> Result<(Account, bool, u32), BootstrapError> {
        let mut created = false;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.create_and_verify(identity, transitions, &mut created).await {
                Ok(account) => {
                    info!(attempt, created, "Account provisioned");
                    return Ok((account, created, attempt));
                }
                Err(e) if attempt < self.config.max_attempts => {
                    let delay = self.config.delay_for_attempt(attempt - 1);
                    warn!(
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Account provisioning failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    return Err(self.fail(identity, attempt, e, std::mem::take(transitions)));
                }
            }
        }
    }

    /// One create-if-absent write followed by a read-back
    async fn create_and_verify(
        &self,
        identity: &Identity,
        transitions: &mut Vec<BootstrapState>,
        created: &mut bool,
    ) -> LedgerResult<Account> {
        let store = self.ledger.store();
        let collection = self.ledger.collection();
        let id = identity.id.as_str();

        enter(transitions, BootstrapState::Creating);
        let account = Account::new_free(
            identity.id.clone(),
            identity.profile.clone(),
            self.ledger.now(),
        );
        if store.create(collection, id, to_document(&account)?).await? {
            *created = true;
        } else if !*created {
            debug!("Account appeared concurrently, keeping existing record");
            self.stamp_login(&identity.id).await;
        }

        enter(transitions, BootstrapState::Verifying);
        let document = store
            .get(collection, id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(identity.id.clone()))?;
        verify(&identity.id, document)
    }

    async fn stamp_login(&self, id: &AccountId) {
        let updates =
            FieldUpdates::new().set(fields::LAST_LOGIN_AT, timestamp_value(self.ledger.now()));
        if let Err(e) = self
            .ledger
            .store()
            .update(self.ledger.collection(), id.as_str(), updates)
            .await
        {
            warn!(error = %e, "Failed to record last login");
        }
    }

    fn fail(
        &self,
        identity: &Identity,
        attempts: u32,
        source: LedgerError,
        mut transitions: Vec<BootstrapState>,
    ) -> BootstrapError {
        enter(&mut transitions, BootstrapState::Failed);
        BootstrapError {
            account_id: identity.id.clone(),
            attempts,
            source,
            transitions,
        }
    }
}

fn enter(transitions: &mut Vec<BootstrapState>, state: BootstrapState) {
    debug!(state = %state, "Bootstrap state");
    transitions.push(state);
}

/// A record counts as present only if it is non-empty and decodes
fn verify(id: &AccountId, document: Document) -> LedgerResult<Account> {
    if document.is_empty() {
        return Err(LedgerError::StoreUnavailable(
            "account record is empty".to_string(),
        ));
    }
    decode_account(id, document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = BootstrapConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(8));
    }

    #[test]
    fn test_at_least_one_attempt() {
        let config = BootstrapConfig::new().with_max_attempts(0);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_empty_record_fails_verification() {
        let result = verify(&AccountId::new("u1"), Document::new());
        assert!(matches!(result, Err(LedgerError::StoreUnavailable(_))));
    }
}
