//! Credit ledger operations
//!
//! Every balance mutation is a single field-level update request. When the
//! store supports conditional updates, `consume` sends its decrement with a
//! `creditsRemaining >= amount` precondition so check and write are atomic.
//! Against a plain store the read-check-write window remains: two concurrent
//! consumers can both pass the check before either write lands, leaving a
//! negative balance. Such an account reads as [`LedgerError::Overdrawn`]
//! until `reset_if_due` or `set_tier` overwrites the balance; both work from
//! a signed balance view that tolerates the negative value.

use std::sync::Arc;

use canvas_store::{from_document, AccountStore, Document, FieldUpdates, Precondition};
use canvas_types::fields;
use canvas_types::{Account, AccountId, Tier, TierParseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::clock::{months_between, timestamp_value, Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};

/// Result of a successful charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeReceipt {
    /// Charged account
    pub account_id: AccountId,
    /// Credits deducted
    pub charged: u32,
    /// Balance after the charge, computed from the balance read before the write
    pub remaining: u32,
    /// Timestamp written to `lastGenerationAt`
    pub consumed_at: DateTime<Utc>,
}

/// Outcome of [`Ledger::reset_if_due`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ResetOutcome {
    /// Balance replenished to the tier allotment
    Reset {
        /// New balance
        credits: u32,
        /// Calendar months since the previous reset
        months_elapsed: u32,
    },
    /// Still inside the current cycle
    NotDue,
}

impl ResetOutcome {
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset { .. })
    }
}

/// Result of a subscription change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierChange {
    /// Stored tier string before the change
    pub previous_tier: String,
    /// New tier
    pub tier: Tier,
    /// Balance before the change; negative for an overdrawn account
    pub previous_credits: i64,
    /// Balance after the change (full allotment)
    pub credits: u32,
    /// Timestamp written to `tierChangedAt` and `lastCreditReset`
    pub changed_at: DateTime<Utc>,
}

/// What a subscription change would do, shown for confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierChangeQuote {
    /// Tier used for the current allotment
    pub current_tier: Tier,
    /// Requested tier
    pub new_tier: Tier,
    /// New monthly price in cents
    pub monthly_price_cents: u32,
    /// Balance now; negative for an overdrawn account
    pub current_credits: i64,
    /// Balance right after the change
    pub new_credits: u32,
}

impl TierChangeQuote {
    /// Literal credit delta; negative when the change lowers the balance
    pub fn credit_delta(&self) -> i64 {
        i64::from(self.new_credits) - self.current_credits
    }

    /// Price formatted as dollars, e.g. `$19.99`
    pub fn price_display(&self) -> String {
        self.new_tier.definition().price_display()
    }
}

/// Fields read by the absolute-set paths
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceView {
    tier: String,
    credits_remaining: i64,
    last_credit_reset: DateTime<Utc>,
}

impl BalanceView {
    fn effective_tier(&self) -> Tier {
        Tier::resolve_or_free(&self.tier)
    }
}

/// Decode a full account record, reporting a negative balance as
/// [`LedgerError::Overdrawn`]
pub(crate) fn decode_account(id: &AccountId, document: Document) -> LedgerResult<Account> {
    let balance = document
        .get(fields::CREDITS_REMAINING)
        .and_then(Value::as_i64)
        .filter(|balance| *balance < 0);
    if let Some(balance) = balance {
        return Err(LedgerError::Overdrawn {
            account_id: id.clone(),
            balance,
        });
    }
    Ok(from_document(document)?)
}

/// Credit ledger over an injected account store
pub struct Ledger<S: AccountStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl<S: AccountStore> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S: AccountStore> Ledger<S> {
    /// Create a ledger with default configuration and the wall clock
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(store: Arc<S>, config: LedgerConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current time from the configured clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn collection(&self) -> &str {
        &self.config.accounts_collection
    }

    async fn document(&self, id: &AccountId) -> LedgerResult<Document> {
        self.store
            .get(self.collection(), id.as_str())
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))
    }

    /// Read an account
    pub async fn account(&self, id: &AccountId) -> LedgerResult<Account> {
        decode_account(id, self.document(id).await?)
    }

    async fn balance_view(&self, id: &AccountId) -> LedgerResult<BalanceView> {
        Ok(from_document(self.document(id).await?)?)
    }

    /// Charge `amount` credits for one generation
    #[instrument(skip(self, id), fields(account_id = %id))]
    pub async fn consume(&self, id: &AccountId, amount: u32) -> LedgerResult<ConsumeReceipt> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let account = self.account(id).await?;
        if !account.can_afford(amount) {
            warn!(
                required = amount,
                available = account.credits_remaining,
                "Insufficient credits"
            );
            return Err(LedgerError::InsufficientCredits {
                required: amount,
                available: account.credits_remaining,
            });
        }

        let now = self.clock.now();
        let delta = i64::from(amount);
        let updates = FieldUpdates::new()
            .increment(fields::CREDITS_REMAINING, -delta)
            .increment(fields::CREDITS_USED_THIS_CYCLE, delta)
            .increment(fields::TOTAL_GENERATIONS, 1)
            .set(fields::LAST_GENERATION_AT, timestamp_value(now));

        if self.store.supports_conditional_updates() {
            let applied = self
                .store
                .update_if(
                    self.collection(),
                    id.as_str(),
                    Precondition::at_least(fields::CREDITS_REMAINING, delta),
                    updates,
                )
                .await
                .map_err(|e| LedgerError::for_account(e, id))?;

            if !applied {
                // Another writer spent the balance between our read and write
                let current = self.account(id).await?;
                warn!(
                    required = amount,
                    available = current.credits_remaining,
                    "Balance changed before charge"
                );
                return Err(LedgerError::InsufficientCredits {
                    required: amount,
                    available: current.credits_remaining,
                });
            }
        } else {
            self.store
                .update(self.collection(), id.as_str(), updates)
                .await
                .map_err(|e| LedgerError::for_account(e, id))?;
        }

        let remaining = account.credits_remaining - amount;
        info!(charged = amount, remaining, "Credits consumed");

        Ok(ConsumeReceipt {
            account_id: id.clone(),
            charged: amount,
            remaining,
            consumed_at: now,
        })
    }

    /// Replenish the balance if at least one calendar month has started
    /// since the last reset
    #[instrument(skip(self, id), fields(account_id = %id))]
    pub async fn reset_if_due(&self, id: &AccountId) -> LedgerResult<ResetOutcome> {
        let account = self.balance_view(id).await?;
        let now = self.clock.now();

        let elapsed = months_between(account.last_credit_reset, now);
        if elapsed < 1 {
            debug!(last_reset = %account.last_credit_reset, "Credit reset not due");
            return Ok(ResetOutcome::NotDue);
        }

        let credits = account.effective_tier().monthly_credits();
        let updates = FieldUpdates::new()
            .set(fields::CREDITS_REMAINING, credits)
            .set(fields::CREDITS_USED_THIS_CYCLE, 0)
            .set(fields::LAST_CREDIT_RESET, timestamp_value(now));
        self.store
            .update(self.collection(), id.as_str(), updates)
            .await
            .map_err(|e| LedgerError::for_account(e, id))?;

        info!(
            tier = %account.tier,
            previous = account.credits_remaining,
            credits,
            months_elapsed = elapsed,
            "Monthly credits reset"
        );

        Ok(ResetOutcome::Reset {
            credits,
            months_elapsed: elapsed.unsigned_abs(),
        })
    }

    /// Move the account to `tier`, granting its full allotment immediately
    #[instrument(skip(self, id), fields(account_id = %id))]
    pub async fn set_tier(&self, id: &AccountId, tier: &str) -> LedgerResult<TierChange> {
        let tier = parse_tier(tier)?;
        let account = self.balance_view(id).await?;
        let now = self.clock.now();
        let credits = tier.monthly_credits();

        let updates = FieldUpdates::new()
            .set(fields::TIER, tier.as_str())
            .set(fields::CREDITS_REMAINING, credits)
            .set(fields::CREDITS_USED_THIS_CYCLE, 0)
            .set(fields::TIER_CHANGED_AT, timestamp_value(now))
            .set(fields::LAST_CREDIT_RESET, timestamp_value(now));
        self.store
            .update(self.collection(), id.as_str(), updates)
            .await
            .map_err(|e| LedgerError::for_account(e, id))?;

        info!(from = %account.tier, to = %tier, credits, "Tier changed");

        Ok(TierChange {
            previous_tier: account.tier,
            tier,
            previous_credits: account.credits_remaining,
            credits,
            changed_at: now,
        })
    }

    /// Describe a tier change without applying it
    pub async fn quote_tier_change(
        &self,
        id: &AccountId,
        tier: &str,
    ) -> LedgerResult<TierChangeQuote> {
        let new_tier = parse_tier(tier)?;
        let account = self.balance_view(id).await?;

        Ok(TierChangeQuote {
            current_tier: account.effective_tier(),
            new_tier,
            monthly_price_cents: new_tier.price_cents(),
            current_credits: account.credits_remaining,
            new_credits: new_tier.monthly_credits(),
        })
    }
}

fn parse_tier(raw: &str) -> LedgerResult<Tier> {
    raw.parse()
        .map_err(|TierParseError(value)| LedgerError::InvalidTier(value))
}
