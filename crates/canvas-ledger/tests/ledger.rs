//! Integration tests for ledger operations against the in-memory store

mod common;

use std::sync::Arc;

use canvas_ledger::{LedgerError, ProfileUpdate, ResetOutcome};
use canvas_store::{AccountStore, MemoryStore};
use canvas_types::{cost, Account, AccountId, GenerationParams, Tier};
use chrono::Duration;
use common::{
    account_with, ledger_for, seed_account, seed_overdrawn, utc, ManualClock, YieldingStore,
};

async fn stored(store: &MemoryStore, id: &str) -> Account {
    let document = store.get("users", id).await.unwrap().unwrap();
    canvas_store::from_document(document).unwrap()
}

#[tokio::test]
async fn test_consume_updates_all_counters() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "FREE", 50, utc(2025, 3, 1)));
    let clock = ManualClock::at(utc(2025, 3, 10));
    let ledger = ledger_for(store.clone(), clock);

    let receipt = ledger.consume(&AccountId::new("u1"), 3).await.unwrap();

    assert_eq!(receipt.charged, 3);
    assert_eq!(receipt.remaining, 47);
    let account = stored(&store, "u1").await;
    assert_eq!(account.credits_remaining, 47);
    assert_eq!(account.credits_used_this_cycle, 3);
    assert_eq!(account.total_generations, 1);
    assert_eq!(account.last_generation_at, Some(utc(2025, 3, 10)));
}

#[tokio::test]
async fn test_consume_insufficient_leaves_balance() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "FREE", 2, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 10)));

    // 1024x1024 on the default model is an HD request
    let params = GenerationParams::new("a lighthouse at dusk").with_size(1024, 1024);
    let amount = cost(&params);
    assert_eq!(amount, 3);

    let result = ledger.consume(&AccountId::new("u1"), amount).await;

    match result {
        Err(LedgerError::InsufficientCredits {
            required,
            available,
        }) => {
            assert_eq!(required, 3);
            assert_eq!(available, 2);
        }
        other => panic!("Expected InsufficientCredits, got: {:?}", other),
    }
    let account = stored(&store, "u1").await;
    assert_eq!(account.credits_remaining, 2);
    assert_eq!(account.credits_used_this_cycle, 0);
    assert_eq!(account.total_generations, 0);
}

#[tokio::test]
async fn test_consume_exact_balance_reaches_zero() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "FREE", 7, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 2)));

    ledger.consume(&AccountId::new("u1"), 7).await.unwrap();

    assert_eq!(stored(&store, "u1").await.credits_remaining, 0);
    assert!(matches!(
        ledger.consume(&AccountId::new("u1"), 1).await,
        Err(LedgerError::InsufficientCredits { available: 0, .. })
    ));
}

#[tokio::test]
async fn test_consume_rejects_zero_and_missing_account() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger_for(store, ManualClock::at(utc(2025, 3, 2)));

    assert!(matches!(
        ledger.consume(&AccountId::new("u1"), 0).await,
        Err(LedgerError::InvalidAmount(0))
    ));
    assert!(matches!(
        ledger.consume(&AccountId::new("ghost"), 1).await,
        Err(LedgerError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_consume_without_conditional_updates() {
    let store = Arc::new(MemoryStore::without_conditional_updates());
    seed_account(&store, &account_with("u1", "BASIC", 200, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 2)));

    ledger.consume(&AccountId::new("u1"), 10).await.unwrap();

    let account = stored(&store, "u1").await;
    assert_eq!(account.credits_remaining, 190);
    assert_eq!(account.credits_used_this_cycle, 10);
}

#[tokio::test]
async fn test_concurrent_consumes_never_overspend() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "FREE", 10, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 2)));
    let id = AccountId::new("u1");

    let attempts = (0..25).map(|_| ledger.consume(&id, 1));
    let results = futures::future::join_all(attempts).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 10);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::InsufficientCredits { .. })));
    let account = stored(&store, "u1").await;
    assert_eq!(account.credits_remaining, 0);
    assert_eq!(account.credits_used_this_cycle, 10);
    assert_eq!(account.total_generations, 10);
}

#[tokio::test]
async fn test_interleaved_consumes_lose_the_precondition() {
    let store = Arc::new(YieldingStore::new(MemoryStore::new()));
    seed_account(&store.inner, &account_with("u1", "FREE", 3, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 2)));
    let id = AccountId::new("u1");

    // Both calls read a balance of 3 before either writes
    let (first, second) = futures::join!(ledger.consume(&id, 3), ledger.consume(&id, 3));

    assert_eq!(first.unwrap().remaining, 0);
    assert!(matches!(
        second,
        Err(LedgerError::InsufficientCredits {
            required: 3,
            available: 0
        })
    ));
    let account = stored(&store.inner, "u1").await;
    assert_eq!(account.credits_remaining, 0);
    assert_eq!(account.total_generations, 1);
}

#[tokio::test]
async fn test_unguarded_race_overdraws_and_tier_change_repairs() {
    let store = Arc::new(YieldingStore::new(MemoryStore::without_conditional_updates()));
    seed_account(&store.inner, &account_with("u1", "BASIC", 3, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 2)));
    let id = AccountId::new("u1");

    let (first, second) = futures::join!(ledger.consume(&id, 3), ledger.consume(&id, 3));
    assert!(first.is_ok());
    assert!(second.is_ok());

    match ledger.account(&id).await {
        Err(err @ LedgerError::Overdrawn { balance: -3, .. }) => {
            assert_eq!(err.error_code(), "ACCOUNT_OVERDRAWN");
        }
        other => panic!("Expected Overdrawn, got: {:?}", other),
    }
    assert!(matches!(
        ledger.consume(&id, 1).await,
        Err(LedgerError::Overdrawn { .. })
    ));

    let quote = ledger.quote_tier_change(&id, "PRO").await.unwrap();
    assert_eq!(quote.current_credits, -3);
    assert_eq!(quote.credit_delta(), 603);

    let change = ledger.set_tier(&id, "PRO").await.unwrap();
    assert_eq!(change.previous_credits, -3);
    assert_eq!(change.credits, 600);
    assert_eq!(ledger.account(&id).await.unwrap().credits_remaining, 600);
}

#[tokio::test]
async fn test_overdrawn_account_is_repaired_by_monthly_reset() {
    let store = Arc::new(MemoryStore::new());
    seed_overdrawn(&store, &account_with("u1", "BASIC", 0, utc(2025, 1, 15)), -4);
    let clock = ManualClock::at(utc(2025, 1, 20));
    let ledger = ledger_for(store.clone(), clock.clone());
    let id = AccountId::new("u1");

    assert_eq!(ledger.reset_if_due(&id).await.unwrap(), ResetOutcome::NotDue);
    assert!(matches!(
        ledger.account(&id).await,
        Err(LedgerError::Overdrawn { balance: -4, .. })
    ));

    clock.set(utc(2025, 2, 1));
    let outcome = ledger.reset_if_due(&id).await.unwrap();
    assert_eq!(
        outcome,
        ResetOutcome::Reset {
            credits: 200,
            months_elapsed: 1
        }
    );

    let account = ledger.account(&id).await.unwrap();
    assert_eq!(account.credits_remaining, 200);
    assert_eq!(account.credits_used_this_cycle, 0);
    assert_eq!(ledger.consume(&id, 5).await.unwrap().remaining, 195);
}

#[tokio::test]
async fn test_reset_after_month_boundary_then_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let mut account = account_with("u1", "BASIC", 12, utc(2025, 1, 31));
    account.credits_used_this_cycle = 188;
    seed_account(&store, &account);
    let clock = ManualClock::at(utc(2025, 2, 1));
    let ledger = ledger_for(store.clone(), clock.clone());
    let id = AccountId::new("u1");

    let outcome = ledger.reset_if_due(&id).await.unwrap();
    assert_eq!(
        outcome,
        ResetOutcome::Reset {
            credits: 200,
            months_elapsed: 1
        }
    );
    let account = stored(&store, "u1").await;
    assert_eq!(account.credits_remaining, 200);
    assert_eq!(account.credits_used_this_cycle, 0);
    assert_eq!(account.last_credit_reset, utc(2025, 2, 1));

    ledger.consume(&id, 5).await.unwrap();
    clock.advance(Duration::days(20));
    assert_eq!(ledger.reset_if_due(&id).await.unwrap(), ResetOutcome::NotDue);
    assert_eq!(stored(&store, "u1").await.credits_remaining, 195);
}

#[tokio::test]
async fn test_reset_is_absolute_set_without_rollover() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "PRO", 590, utc(2024, 11, 3)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 2, 1)));

    let outcome = ledger.reset_if_due(&AccountId::new("u1")).await.unwrap();

    assert_eq!(
        outcome,
        ResetOutcome::Reset {
            credits: 600,
            months_elapsed: 3
        }
    );
    assert_eq!(stored(&store, "u1").await.credits_remaining, 600);
}

#[tokio::test]
async fn test_reset_unknown_tier_uses_free_allotment() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "GOLD", 3, utc(2025, 1, 5)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 2, 5)));

    ledger.reset_if_due(&AccountId::new("u1")).await.unwrap();

    let account = stored(&store, "u1").await;
    assert_eq!(account.credits_remaining, Tier::Free.monthly_credits());
    assert_eq!(account.tier, "GOLD");
}

#[tokio::test]
async fn test_set_tier_grants_full_allotment() {
    let store = Arc::new(MemoryStore::new());
    let mut account = account_with("u1", "FREE", 50, utc(2025, 3, 1));
    account.credits_used_this_cycle = 9;
    seed_account(&store, &account);
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 20)));

    let change = ledger.set_tier(&AccountId::new("u1"), "PRO").await.unwrap();

    assert_eq!(change.previous_tier, "FREE");
    assert_eq!(change.tier, Tier::Pro);
    assert_eq!(change.credits, 600);
    let account = stored(&store, "u1").await;
    assert_eq!(account.tier, "PRO");
    assert_eq!(account.credits_remaining, 600);
    assert_eq!(account.credits_used_this_cycle, 0);
    assert_eq!(account.tier_changed_at, Some(utc(2025, 3, 20)));
    assert_eq!(account.last_credit_reset, utc(2025, 3, 20));
}

#[tokio::test]
async fn test_set_tier_rejects_unknown_tier() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "FREE", 50, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 20)));

    let result = ledger.set_tier(&AccountId::new("u1"), "PLATINUM").await;

    assert!(matches!(result, Err(LedgerError::InvalidTier(ref t)) if t == "PLATINUM"));
    let account = stored(&store, "u1").await;
    assert_eq!(account.tier, "FREE");
    assert_eq!(account.credits_remaining, 50);
}

#[tokio::test]
async fn test_quote_tier_change_does_not_mutate() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "PRO", 450, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 20)));

    let quote = ledger
        .quote_tier_change(&AccountId::new("u1"), "basic")
        .await
        .unwrap();

    assert_eq!(quote.current_tier, Tier::Pro);
    assert_eq!(quote.new_tier, Tier::Basic);
    assert_eq!(quote.monthly_price_cents, 999);
    assert_eq!(quote.credit_delta(), -250);
    assert_eq!(stored(&store, "u1").await.credits_remaining, 450);
}

#[tokio::test]
async fn test_update_profile_touches_only_profile_fields() {
    let store = Arc::new(MemoryStore::new());
    seed_account(&store, &account_with("u1", "BASIC", 120, utc(2025, 3, 1)));
    let ledger = ledger_for(store.clone(), ManualClock::at(utc(2025, 3, 4)));
    let id = AccountId::new("u1");

    let written = ledger
        .update_profile(&id, ProfileUpdate::new().with_display_name("Ada"))
        .await
        .unwrap();
    assert!(written);
    assert!(!ledger.update_profile(&id, ProfileUpdate::new()).await.unwrap());

    let account = stored(&store, "u1").await;
    assert_eq!(account.display_name.as_deref(), Some("Ada"));
    assert_eq!(account.email.as_deref(), Some("u1@example.com"));
    assert_eq!(account.credits_remaining, 120);
    assert_eq!(account.updated_at, Some(utc(2025, 3, 4)));

    let missing = ledger
        .update_profile(
            &AccountId::new("ghost"),
            ProfileUpdate::new().with_photo_url("https://example.com/a.png"),
        )
        .await;
    assert!(matches!(missing, Err(LedgerError::AccountNotFound(_))));
}
