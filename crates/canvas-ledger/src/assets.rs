//! Generated asset library
//!
//! Assets are stored per owner under `{accounts}/{owner}/images`. Deleting an
//! asset never touches the ledger.

use std::sync::Arc;

use canvas_store::{from_document, to_document, AccountStore, Direction, Filter, Query};
use canvas_types::fields;
use canvas_types::{AccountId, AssetId, GeneratedAsset};
use tracing::{debug, info, instrument, warn};

use crate::error::{LedgerError, LedgerResult};

/// Listing options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    /// Only assets generated with this model
    pub model: Option<String>,
    /// Maximum number of assets returned
    pub limit: Option<usize>,
}

impl AssetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Owner-scoped asset storage
pub struct AssetLibrary<S: AccountStore> {
    store: Arc<S>,
    accounts_collection: String,
}

impl<S: AccountStore> Clone for AssetLibrary<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            accounts_collection: self.accounts_collection.clone(),
        }
    }
}

impl<S: AccountStore> AssetLibrary<S> {
    pub fn new(store: Arc<S>, accounts_collection: impl Into<String>) -> Self {
        Self {
            store,
            accounts_collection: accounts_collection.into(),
        }
    }

    /// Collection holding `owner`'s assets
    pub fn collection_for(&self, owner: &AccountId) -> String {
        format!("{}/{}/images", self.accounts_collection, owner)
    }

    /// Store an asset under its owner
    #[instrument(skip(self, asset), fields(owner = %asset.owner_id, asset_id = %asset.id))]
    pub async fn save(&self, asset: &GeneratedAsset) -> LedgerResult<()> {
        let collection = self.collection_for(&asset.owner_id);
        self.store
            .set(&collection, asset.id.as_str(), to_document(asset)?)
            .await?;
        debug!("Asset saved");
        Ok(())
    }

    /// Owner's assets, newest first
    #[instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn list(
        &self,
        owner: &AccountId,
        filter: &AssetFilter,
    ) -> LedgerResult<Vec<GeneratedAsset>> {
        let mut query = Query::new().order_by(fields::CREATED_AT, Direction::Descending);
        if let Some(model) = &filter.model {
            query = query.filter(Filter::eq("parameters.model", model.as_str()));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let documents = self.store.query(&self.collection_for(owner), &query).await?;
        let assets = documents
            .into_iter()
            .map(from_document::<GeneratedAsset>)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = assets.len(), "Assets listed");
        Ok(assets)
    }

    /// One asset of `owner`
    pub async fn get(&self, owner: &AccountId, id: &AssetId) -> LedgerResult<GeneratedAsset> {
        let document = self
            .store
            .get(&self.collection_for(owner), id.as_str())
            .await?
            .ok_or_else(|| LedgerError::AssetNotFound(id.clone()))?;
        Ok(from_document(document)?)
    }

    /// Remove an asset; only the owner may do this
    #[instrument(skip(self, owner, requester, id), fields(owner = %owner, asset_id = %id))]
    pub async fn delete(
        &self,
        owner: &AccountId,
        requester: &AccountId,
        id: &AssetId,
    ) -> LedgerResult<()> {
        if owner != requester {
            warn!(requester = %requester, "Asset delete by non-owner rejected");
            return Err(LedgerError::NotOwner);
        }

        let collection = self.collection_for(owner);
        if self.store.get(&collection, id.as_str()).await?.is_none() {
            return Err(LedgerError::AssetNotFound(id.clone()));
        }
        self.store.delete(&collection, id.as_str()).await?;

        info!("Asset deleted");
        Ok(())
    }
}
