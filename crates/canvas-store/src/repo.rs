//! Store trait
//!
//! The document database is an external collaborator reached only through
//! this interface. Ledger components take it as an injected `Arc<S>`.

use async_trait::async_trait;

use crate::document::{Document, FieldUpdates, Precondition, Query};
use crate::error::{StoreError, StoreResult};

/// Document store contract
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch a document, `None` if absent
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Create the document only if it does not exist.
    ///
    /// Returns `false` when a document with this id is already present; the
    /// existing document is left untouched.
    async fn create(&self, collection: &str, id: &str, document: Document) -> StoreResult<bool>;

    /// Create or fully replace a document
    async fn set(&self, collection: &str, id: &str, document: Document) -> StoreResult<()>;

    /// Apply field mutations as one write; fails with `NotFound` if absent
    async fn update(&self, collection: &str, id: &str, updates: FieldUpdates) -> StoreResult<()>;

    /// Whether [`AccountStore::update_if`] is implemented
    fn supports_conditional_updates(&self) -> bool {
        false
    }

    /// Apply field mutations only if `precondition` holds at write time.
    ///
    /// Returns `false` when the precondition failed and nothing was written.
    async fn update_if(
        &self,
        _collection: &str,
        _id: &str,
        _precondition: Precondition,
        _updates: FieldUpdates,
    ) -> StoreResult<bool> {
        Err(StoreError::Unsupported("conditional update"))
    }

    /// Run a query against one collection
    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Delete a document; deleting an absent document is not an error
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}
