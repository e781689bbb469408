//! Owner profile edits

use canvas_store::{AccountStore, FieldUpdates};
use canvas_types::fields;
use canvas_types::AccountId;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::clock::timestamp_value;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;

/// Profile fields an owner may change; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.photo_url.is_none()
    }
}

impl<S: AccountStore> Ledger<S> {
    /// Apply a partial profile edit and stamp `updatedAt`.
    ///
    /// Returns `false` when the update carried no fields and nothing was written.
    #[instrument(skip(self, id, update), fields(account_id = %id))]
    pub async fn update_profile(
        &self,
        id: &AccountId,
        update: ProfileUpdate,
    ) -> LedgerResult<bool> {
        if update.is_empty() {
            debug!("Empty profile update ignored");
            return Ok(false);
        }

        let mut updates = FieldUpdates::new();
        if let Some(name) = update.display_name {
            updates = updates.set(fields::DISPLAY_NAME, name);
        }
        if let Some(url) = update.photo_url {
            updates = updates.set(fields::PHOTO_URL, url);
        }
        updates = updates.set(fields::UPDATED_AT, timestamp_value(self.now()));

        self.store()
            .update(self.collection(), id.as_str(), updates)
            .await
            .map_err(|e| LedgerError::for_account(e, id))?;

        info!("Profile updated");
        Ok(true)
    }
}
