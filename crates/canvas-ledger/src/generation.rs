//! Generation orchestration
//!
//! `validate -> cost -> consume -> generate -> save`. An asset is only ever
//! written after its charge succeeded. A generator failure after the charge
//! or a failed asset write is reported with the charged amount; credits are
//! not refunded.

use std::sync::Arc;

use async_trait::async_trait;
use canvas_store::AccountStore;
use canvas_types::{cost, AccountId, AssetId, GeneratedAsset, GenerationParams};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::assets::AssetLibrary;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{ConsumeReceipt, Ledger};

/// Image returned by a generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Remote URL or `data:` URL
    pub url: String,
}

/// External image generation collaborator
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Produce one image for `params`
    async fn generate(&self, params: &GenerationParams) -> Result<GeneratedImage, Self::Error>;
}

/// A charged and stored generation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub asset: GeneratedAsset,
    pub receipt: ConsumeReceipt,
}

/// Runs one user-visible generation against the ledger
pub struct GenerationOrchestrator<S: AccountStore, G: ImageGenerator> {
    ledger: Ledger<S>,
    library: AssetLibrary<S>,
    generator: Arc<G>,
}

impl<S: AccountStore, G: ImageGenerator> GenerationOrchestrator<S, G> {
    /// Create an orchestrator storing assets next to the ledger's accounts
    pub fn new(ledger: Ledger<S>, generator: Arc<G>) -> Self {
        let library = AssetLibrary::new(
            Arc::clone(ledger.store()),
            ledger.config().accounts_collection.clone(),
        );
        Self {
            ledger,
            library,
            generator,
        }
    }

    /// Get the asset library
    pub fn library(&self) -> &AssetLibrary<S> {
        &self.library
    }

    /// Credits a request would cost, without touching the network
    pub fn preview_cost(&self, params: &GenerationParams) -> u32 {
        cost(params)
    }

    /// Validate, charge, generate and store
    #[instrument(
        skip(self, account_id, params),
        fields(account_id = %account_id, model = %params.model)
    )]
    pub async fn generate(
        &self,
        account_id: &AccountId,
        params: GenerationParams,
    ) -> LedgerResult<GenerationOutcome> {
        params.validate()?;

        let amount = cost(&params);
        let receipt = self.ledger.consume(account_id, amount).await?;

        let image = self.generator.generate(&params).await.map_err(|e| {
            error!(error = %e, charged = amount, "Generation failed after charge");
            LedgerError::Generation {
                message: e.to_string(),
                charged: amount,
            }
        })?;

        let asset = GeneratedAsset {
            id: AssetId::generate(),
            url: image.url,
            prompt: params.prompt.clone(),
            parameters: params,
            created_at: self.ledger.now(),
            owner_id: account_id.clone(),
        };
        self.library.save(&asset).await.map_err(|e| {
            error!(error = %e, charged = amount, "Asset save failed after charge");
            LedgerError::AssetSave {
                message: e.to_string(),
                charged: amount,
            }
        })?;

        info!(
            asset_id = %asset.id,
            charged = amount,
            remaining = receipt.remaining,
            "Generation completed"
        );
        Ok(GenerationOutcome { asset, receipt })
    }
}
