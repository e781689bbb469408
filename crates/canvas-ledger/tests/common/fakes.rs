//! In-memory fakes for the ledger's collaborators

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use canvas_ledger::{Clock, GeneratedImage, ImageGenerator, Ledger};
use canvas_store::{
    to_document, AccountStore, Document, FieldUpdates, MemoryStore, Precondition, Query,
    StoreError, StoreResult,
};
use canvas_types::{fields, Account, AccountId, GenerationParams, Profile};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Midday UTC on the given date
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    #[allow(dead_code)]
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    #[allow(dead_code)]
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Ledger over `store` with a manual clock
#[allow(dead_code)]
pub fn ledger_for<S: AccountStore>(store: Arc<S>, clock: Arc<ManualClock>) -> Ledger<S> {
    Ledger::new(store).with_clock(clock)
}

/// Account record with the given tier string, balance and cycle start
pub fn account_with(id: &str, tier: &str, credits: u32, last_reset: DateTime<Utc>) -> Account {
    let profile = Profile {
        email: Some(format!("{id}@example.com")),
        display_name: Some(format!("User {id}")),
        ..Profile::default()
    };
    let mut account = Account::new_free(AccountId::new(id), profile, last_reset);
    account.tier = tier.to_string();
    account.credits_remaining = credits;
    account
}

/// Insert an account document directly into a memory store
#[allow(dead_code)]
pub fn seed_account(store: &MemoryStore, account: &Account) {
    store.insert_document("users", account.id.as_str(), to_document(account).unwrap());
}

/// Insert an account whose stored balance is `balance`, which may be negative
#[allow(dead_code)]
pub fn seed_overdrawn(store: &MemoryStore, account: &Account, balance: i64) {
    let mut document = to_document(account).unwrap();
    document.insert(fields::CREDITS_REMAINING.to_string(), balance.into());
    store.insert_document("users", account.id.as_str(), document);
}

/// Store wrapper that injects failures in front of a [`MemoryStore`]
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_creates: AtomicU32,
    failing_sets: AtomicU32,
    failing_gets: AtomicU32,
    hidden_reads: AtomicU32,
    pub creates: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` creates with `Unavailable`
    pub fn fail_creates(self, n: u32) -> Self {
        self.failing_creates.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` full-document writes with `Unavailable`
    pub fn fail_sets(self, n: u32) -> Self {
        self.failing_sets.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` reads with `Unavailable`
    pub fn fail_gets(self, n: u32) -> Self {
        self.failing_gets.store(n, Ordering::SeqCst);
        self
    }

    /// Report the next `n` reads of an existing document as absent
    pub fn hide_reads(self, n: u32) -> Self {
        self.hidden_reads.store(n, Ordering::SeqCst);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        if take_one(&self.failing_gets) {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        let found = self.inner.get(collection, id).await?;
        if found.is_some() && take_one(&self.hidden_reads) {
            return Ok(None);
        }
        Ok(found)
    }

    async fn create(&self, collection: &str, id: &str, document: Document) -> StoreResult<bool> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_creates) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        self.inner.create(collection, id, document).await
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        if take_one(&self.failing_sets) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        self.inner.set(collection, id, document).await
    }

    async fn update(&self, collection: &str, id: &str, updates: FieldUpdates) -> StoreResult<()> {
        self.inner.update(collection, id, updates).await
    }

    fn supports_conditional_updates(&self) -> bool {
        self.inner.supports_conditional_updates()
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
        updates: FieldUpdates,
    ) -> StoreResult<bool> {
        self.inner.update_if(collection, id, precondition, updates).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.query(collection, query).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }
}

/// Store wrapper whose reads suspend once before returning, so concurrent
/// callers interleave between their read and their write
#[allow(dead_code)]
pub struct YieldingStore {
    pub inner: MemoryStore,
}

#[allow(dead_code)]
impl YieldingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AccountStore for YieldingStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let found = self.inner.get(collection, id).await?;
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn create(&self, collection: &str, id: &str, document: Document) -> StoreResult<bool> {
        self.inner.create(collection, id, document).await
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        self.inner.set(collection, id, document).await
    }

    async fn update(&self, collection: &str, id: &str, updates: FieldUpdates) -> StoreResult<()> {
        self.inner.update(collection, id, updates).await
    }

    fn supports_conditional_updates(&self) -> bool {
        self.inner.supports_conditional_updates()
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
        updates: FieldUpdates,
    ) -> StoreResult<bool> {
        self.inner.update_if(collection, id, precondition, updates).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.query(collection, query).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }
}

/// Generation failure returned by [`StubGenerator`]
#[derive(Debug, thiserror::Error)]
#[error("generation backend error: {0}")]
pub struct StubError(pub String);

/// Image generator returning a fixed URL, or failing on demand
#[derive(Default)]
pub struct StubGenerator {
    fail_with: Option<String>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl StubGenerator {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    type Error = StubError;

    async fn generate(&self, params: &GenerationParams) -> Result<GeneratedImage, StubError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(StubError(message.clone())),
            None => Ok(GeneratedImage {
                url: format!(
                    "https://images.example.com/{}/{call}.png",
                    params.model
                ),
            }),
        }
    }
}
