//! Documents, partial updates and queries

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// A stored record: a JSON object keyed by field name
pub type Document = serde_json::Map<String, Value>;

/// Serialize a typed record into a document
pub fn to_document<T: Serialize>(record: &T) -> StoreResult<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Deserialize a document into a typed record
pub fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// Look up a possibly dotted field path (`parameters.model`)
pub fn field_at<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// A single field mutation
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Overwrite the field
    Set(Value),
    /// Add `delta` to an integer field; a missing field counts as zero
    Increment(i64),
}

/// Ordered set of field mutations applied as one write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates(Vec<(String, FieldUpdate)>);

impl FieldUpdates {
    /// Empty update set
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `field` with `value`
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((field.into(), FieldUpdate::Set(value.into())));
        self
    }

    /// Atomically add `delta` to `field`
    #[must_use]
    pub fn increment(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.0.push((field.into(), FieldUpdate::Increment(delta)));
        self
    }

    /// Iterate over the mutations in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldUpdate)> {
        self.0.iter().map(|(field, update)| (field.as_str(), update))
    }

    /// Number of mutations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply the mutations to an in-memory document
    pub fn apply_to(&self, document: &mut Document) {
        for (field, update) in &self.0 {
            match update {
                FieldUpdate::Set(value) => {
                    document.insert(field.clone(), value.clone());
                }
                FieldUpdate::Increment(delta) => {
                    let current = document.get(field).and_then(Value::as_i64).unwrap_or(0);
                    document.insert(field.clone(), Value::from(current.saturating_add(*delta)));
                }
            }
        }
    }
}

/// Condition checked atomically before a conditional write
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The document must exist
    Exists,
    /// The integer field must be at least `min`
    AtLeast {
        /// Field to compare
        field: String,
        /// Inclusive lower bound
        min: i64,
    },
}

impl Precondition {
    /// Require `field >= min`
    pub fn at_least(field: impl Into<String>, min: i64) -> Self {
        Self::AtLeast {
            field: field.into(),
            min,
        }
    }

    /// Evaluate against the current document, if any
    pub fn holds(&self, document: Option<&Document>) -> bool {
        match (self, document) {
            (_, None) => false,
            (Self::Exists, Some(_)) => true,
            (Self::AtLeast { field, min }, Some(doc)) => doc
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|value| value >= *min),
        }
    }
}

/// Equality filter on a (possibly dotted) field path
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field path
    pub field: String,
    /// Required value
    pub value: Value,
}

impl Filter {
    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the document satisfies the filter
    pub fn matches(&self, document: &Document) -> bool {
        field_at(document, &self.field) == Some(&self.value)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// Sort key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Field path
    pub field: String,
    /// Direction
    pub direction: Direction,
}

/// Collection query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Conjunction of equality filters
    pub filters: Vec<Filter>,
    /// Optional sort key
    pub order_by: Option<OrderBy>,
    /// Optional maximum number of results
    pub limit: Option<usize>,
}

impl Query {
    /// Match every document in the collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sort by `field`
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Cap the number of results
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
