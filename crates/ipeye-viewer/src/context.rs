use std::sync::Arc;

use ipeye_client::{DeviceDirectory, IpeyeClient};
use ipeye_data::CatalogStore;

use crate::{
    Result,
    catalog::CatalogManager,
    config::Config,
    enrich::Enricher,
    server::{Router, WebServer},
};

pub struct Context {
    pub config: Config,
    pub catalog: Arc<CatalogManager>,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let client = IpeyeClient::new(config.ipeye.clone())?;
        Ok(Self::with_directory(config, Arc::new(client)))
    }

    pub fn with_directory(config: Config, directory: Arc<dyn DeviceDirectory>) -> Self {
        let store = CatalogStore::new(&config.storage.path);
        let enricher = Enricher::new(directory.clone(), config.enrich.clone());

        Self {
            catalog: Arc::new(CatalogManager::new(directory, store, enricher)),
            config,
        }
    }

    pub fn web_server(&self) -> WebServer {
        let router = Router::new(self.catalog.clone(), &self.config.server.static_dir);
        WebServer::new(router, self.config.server.clone())
    }
}
