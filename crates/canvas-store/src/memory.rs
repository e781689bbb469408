//! In-memory store
//!
//! Backed by a `DashMap`, so conditional updates hold the document's shard
//! lock between the precondition check and the write.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use crate::document::{field_at, Direction, Document, FieldUpdates, Precondition, Query};
use crate::error::{StoreError, StoreResult};
use crate::repo::AccountStore;

type Key = (String, String);

/// In-memory document store
#[derive(Debug, Clone)]
pub struct MemoryStore {
    documents: Arc<DashMap<Key, Document>>,
    conditional_updates: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store with conditional updates enabled
    pub fn new() -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            conditional_updates: true,
        }
    }

    /// Empty store that behaves like a backend without compare-and-swap
    pub fn without_conditional_updates() -> Self {
        Self {
            conditional_updates: false,
            ..Self::new()
        }
    }

    /// Insert a document directly, bypassing the trait
    pub fn insert_document(&self, collection: &str, id: &str, document: Document) {
        self.documents.insert(key(collection, id), document);
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }
}

fn key(collection: &str, id: &str) -> Key {
    (collection.to_string(), id.to_string())
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        Ok(self
            .documents
            .get(&key(collection, id))
            .map(|entry| entry.value().clone()))
    }

    async fn create(&self, collection: &str, id: &str, document: Document) -> StoreResult<bool> {
        match self.documents.entry(key(collection, id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(document);
                Ok(true)
            }
        }
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        self.documents.insert(key(collection, id), document);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, updates: FieldUpdates) -> StoreResult<()> {
        let mut document = self
            .documents
            .get_mut(&key(collection, id))
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
        updates.apply_to(document.value_mut());
        Ok(())
    }

    fn supports_conditional_updates(&self) -> bool {
        self.conditional_updates
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
        updates: FieldUpdates,
    ) -> StoreResult<bool> {
        if !self.conditional_updates {
            return Err(StoreError::Unsupported("conditional update"));
        }

        let Some(mut document) = self.documents.get_mut(&key(collection, id)) else {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        };
        if !precondition.holds(Some(document.value())) {
            return Ok(false);
        }
        updates.apply_to(document.value_mut());
        Ok(true)
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let mut results: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| query.filters.iter().all(|f| f.matches(entry.value())))
            .map(|entry| entry.value().clone())
            .collect();

        if let Some(order) = &query.order_by {
            results.sort_by(|a, b| {
                let ordering = compare_values(field_at(a, &order.field), field_at(b, &order.field));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.documents.remove(&key(collection, id));
        Ok(())
    }
}
