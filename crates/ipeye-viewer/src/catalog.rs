use std::{collections::HashSet, sync::Arc};

use ipeye_client::{DeviceDirectory, models::Device};
use ipeye_data::CatalogStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    Error, Result,
    enrich::{EnrichSummary, Enricher},
};

pub type UpdateSummary = EnrichSummary;

/// Owns the update cycle of the on-disk camera catalog.
///
/// Updates must not overlap: callers serialize calls to [`CatalogManager::update`].
pub struct CatalogManager {
    directory: Arc<dyn DeviceDirectory>,
    store: CatalogStore,
    enricher: Enricher,
}

impl CatalogManager {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        store: CatalogStore,
        enricher: Enricher,
    ) -> Self {
        Self {
            directory,
            store,
            enricher,
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub async fn update(&self) -> Result<UpdateSummary> {
        self.update_with(&CancellationToken::new()).await
    }

    /// Bootstraps the catalog if needed, resolves stream URLs and persists the
    /// result, including devices that could not be resolved.
    #[tracing::instrument(skip_all, fields(path = %self.store.path().display()))]
    pub async fn update_with(&self, cancel: &CancellationToken) -> Result<UpdateSummary> {
        if !self.store.exists().await {
            self.download_all_devices(cancel).await?;
        }

        let mut devices: Vec<Device> = self.store.load().await.map_err(Error::Load)?;

        let summary = self.enricher.process_devices(&mut devices, cancel).await;

        self.store.save(&devices).await.map_err(Error::Save)?;

        info!(
            total = summary.total,
            resolved = summary.resolved,
            failed = summary.failed,
            "Camera catalog updated"
        );
        Ok(summary)
    }

    /// Current persisted catalog; read fresh from disk on every call.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        self.store.load().await.map_err(Error::Load)
    }

    async fn download_all_devices(&self, cancel: &CancellationToken) -> Result<()> {
        info!("No local catalog found, downloading device listing");

        let devices = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.directory.list_devices() => result.map_err(Error::Fetch)?,
        };

        let mut seen = HashSet::new();
        for device in &devices {
            if !seen.insert(device.devcode.as_str()) {
                warn!(devcode = device.devcode, "Duplicate device code in listing");
            }
        }

        self.store.save(&devices).await.map_err(Error::Save)?;

        info!(count = devices.len(), "Saved initial device catalog");
        Ok(())
    }
}
