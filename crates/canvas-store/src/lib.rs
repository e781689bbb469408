//! Canvas Store - Document store abstractions
//!
//! The ledger reaches its remote document database only through the
//! [`AccountStore`] trait. Two backends ship here: an in-memory store for
//! tests and embedding, and a Firestore REST store.
//!
//! # Example
//!
//! ```rust,ignore
//! use canvas_store::{AccountStore, FirestoreConfig, FirestoreStore};
//!
//! let store = FirestoreStore::new(FirestoreConfig::from_env()?)?;
//! let account = store.get("users", "uid-123").await?;
//! ```

pub mod document;
pub mod error;
pub mod firestore;
pub mod memory;
pub mod repo;

pub use document::{
    field_at, from_document, to_document, Direction, Document, FieldUpdate, FieldUpdates, Filter,
    OrderBy, Precondition, Query,
};
pub use error::{StoreError, StoreResult};
pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::MemoryStore;
pub use repo::AccountStore;
