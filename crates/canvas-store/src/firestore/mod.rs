//! Firestore REST store
//!
//! Talks to the Firestore v1 REST surface. Increments travel as
//! `updateTransforms` in a `:commit` so they are applied server-side in the
//! same write as the plain field sets.

mod value;

pub use value::{decode, decode_fields, encode, encode_fields};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use canvas_types::config::{env_or, env_parse, env_required, load_env};
use canvas_types::ConfigError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, instrument, warn};

use crate::document::{Direction, Document, FieldUpdate, FieldUpdates, Precondition, Query};
use crate::error::{StoreError, StoreResult};
use crate::repo::AccountStore;

/// Public Firestore endpoint
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Database used when none is configured
pub const DEFAULT_DATABASE: &str = "(default)";

/// Read/commit rounds attempted by an optimistic conditional update
const MAX_OPTIMISTIC_ROUNDS: usize = 5;

/// Firestore connection settings
#[derive(Clone)]
pub struct FirestoreConfig {
    /// Google Cloud project id
    pub project_id: String,
    /// Database id, `(default)` unless configured
    pub database: String,
    /// REST root, overridable for emulators and tests
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// OAuth bearer token; emulators accept unauthenticated calls
    pub auth_token: Option<String>,
}

impl fmt::Debug for FirestoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl FirestoreConfig {
    /// Settings for `project_id` against the public endpoint
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }

    /// Load from `FIRESTORE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        load_env();
        let project_id = env_required("FIRESTORE_PROJECT_ID")?;
        let timeout_secs = env_parse("CANVAS_REQUEST_TIMEOUT_SECS", 30u64)?;

        let mut config = Self::new(project_id)
            .with_database(env_or("FIRESTORE_DATABASE", DEFAULT_DATABASE))
            .with_base_url(env_or("FIRESTORE_BASE_URL", DEFAULT_BASE_URL))
            .with_request_timeout(Duration::from_secs(timeout_secs));
        if let Ok(token) = std::env::var("FIRESTORE_AUTH_TOKEN") {
            config = config.with_auth_token(token);
        }
        Ok(config)
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// `projects/{project}/databases/{database}/documents`
    fn documents_path(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    fields: Map<String, Value>,
    update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<RawDocument>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Firestore REST backed store
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: Client,
    config: FirestoreConfig,
}

impl FirestoreStore {
    /// Build a store with its own HTTP client
    pub fn new(config: FirestoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn documents_url(&self) -> String {
        format!("{}/{}", self.config.base_url, self.config.documents_path())
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.config.documents_path())
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.config.base_url, self.document_name(collection, id))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch a document together with its `updateTime`
    async fn fetch(&self, collection: &str, id: &str) -> StoreResult<Option<(Document, String)>> {
        let url = self.document_url(collection, id);
        let response = self.request(Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: RawDocument = check(response).await?.json().await?;
        let update_time = raw
            .update_time
            .ok_or_else(|| StoreError::Decode("document without updateTime".to_string()))?;
        Ok(Some((decode_fields(&raw.fields)?, update_time)))
    }

    async fn commit(&self, write: Value) -> StoreResult<()> {
        let url = format!("{}:commit", self.documents_url());
        let response = self
            .request(Method::POST, &url)
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Turn a non-success response into a store error
async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (grpc_status, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => (envelope.error.status, envelope.error.message),
        Err(_) => (String::new(), body),
    };

    let err = match (status, grpc_status.as_str()) {
        (StatusCode::NOT_FOUND, _) => StoreError::NotFound(message),
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            StoreError::PermissionDenied(message)
        }
        (StatusCode::CONFLICT, _) | (_, "FAILED_PRECONDITION") => {
            StoreError::PreconditionFailed(message)
        }
        _ => {
            error!(status = %status, body = %message, "Firestore request failed");
            StoreError::Unavailable(format!("{status}: {message}"))
        }
    };
    Err(err)
}

/// Build a single `Write` that sets and increments fields of `name`
fn update_write(name: String, updates: &FieldUpdates, current_document: Value) -> Value {
    let mut fields = Map::new();
    let mut mask = Vec::new();
    let mut transforms = Vec::new();

    for (field, update) in updates.iter() {
        match update {
            FieldUpdate::Set(value) => {
                fields.insert(field.to_string(), encode(value));
                mask.push(field.to_string());
            }
            FieldUpdate::Increment(delta) => transforms.push(json!({
                "fieldPath": field,
                "increment": { "integerValue": delta.to_string() },
            })),
        }
    }

    json!({
        "update": { "name": name, "fields": fields },
        "updateMask": { "fieldPaths": mask },
        "updateTransforms": transforms,
        "currentDocument": current_document,
    })
}

/// Build a `StructuredQuery` over one collection id
fn structured_query(collection_id: &str, query: &Query) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection_id }] });

    let mut filters: Vec<Value> = query
        .filters
        .iter()
        .map(|filter| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": filter.field },
                    "op": "EQUAL",
                    "value": encode(&filter.value),
                }
            })
        })
        .collect();
    match filters.len() {
        0 => {}
        1 => structured["where"] = filters.remove(0),
        _ => {
            structured["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } })
        }
    }

    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured["orderBy"] = json!([{
            "field": { "fieldPath": order.field },
            "direction": direction
        }]);
    }
    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }

    structured
}

#[async_trait]
impl AccountStore for FirestoreStore {
    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        Ok(self.fetch(collection, id).await?.map(|(document, _)| document))
    }

    #[instrument(skip(self, document))]
    async fn create(&self, collection: &str, id: &str, document: Document) -> StoreResult<bool> {
        let url = format!("{}/{collection}", self.documents_url());
        let response = self
            .request(Method::POST, &url)
            .query(&[("documentId", id)])
            .json(&json!({ "fields": encode_fields(&document) }))
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!("Document already exists, create skipped");
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    #[instrument(skip(self, document))]
    async fn set(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        let url = self.document_url(collection, id);
        let response = self
            .request(Method::PATCH, &url)
            .json(&json!({ "fields": encode_fields(&document) }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, updates), fields(fields = updates.len()))]
    async fn update(&self, collection: &str, id: &str, updates: FieldUpdates) -> StoreResult<()> {
        let write = update_write(
            self.document_name(collection, id),
            &updates,
            json!({ "exists": true }),
        );
        self.commit(write).await
    }

    fn supports_conditional_updates(&self) -> bool {
        true
    }

    #[instrument(skip(self, updates))]
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
        updates: FieldUpdates,
    ) -> StoreResult<bool> {
        for round in 1..=MAX_OPTIMISTIC_ROUNDS {
            let Some((document, update_time)) = self.fetch(collection, id).await? else {
                return Err(StoreError::NotFound(format!("{collection}/{id}")));
            };
            if !precondition.holds(Some(&document)) {
                return Ok(false);
            }

            let write = update_write(
                self.document_name(collection, id),
                &updates,
                json!({ "updateTime": update_time }),
            );
            match self.commit(write).await {
                Ok(()) => return Ok(true),
                Err(StoreError::PreconditionFailed(reason)) => {
                    debug!(round, reason = %reason, "Document changed during conditional update");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(rounds = MAX_OPTIMISTIC_ROUNDS, "Conditional update kept conflicting");
        Err(StoreError::PreconditionFailed(format!(
            "{collection}/{id} changed on every attempt"
        )))
    }

    #[instrument(skip(self, query))]
    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let (parent, collection_id) = match collection.rsplit_once('/') {
            Some((parent, collection_id)) => {
                (format!("{}/{parent}", self.documents_url()), collection_id)
            }
            None => (self.documents_url(), collection),
        };

        let url = format!("{parent}:runQuery");
        let response = self
            .request(Method::POST, &url)
            .json(&json!({ "structuredQuery": structured_query(collection_id, query) }))
            .send()
            .await?;

        let items: Vec<RunQueryItem> = check(response).await?.json().await?;
        let documents = items
            .into_iter()
            .filter_map(|item| item.document)
            .map(|raw| decode_fields(&raw.fields))
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(count = documents.len(), "Query returned documents");
        Ok(documents)
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let url = self.document_url(collection, id);
        let response = self.request(Method::DELETE, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }
}
