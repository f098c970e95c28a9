use std::sync::Arc;

use ipeye_client::{
    DeviceDirectory,
    models::{Device, render_stream_url},
};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub const DEFAULT_STREAM_URL_TEMPLATE: &str =
    "http://{server}/api/v1/stream/{devcode}/hls/index.m3u8";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"), default)]
pub struct Config {
    /// Size of the worker pool.
    pub workers: usize,
    /// Lookup attempts per device.
    pub retries: u32,
    pub stream_url_template: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 10,
            retries: 3,
            stream_url_template: DEFAULT_STREAM_URL_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub total: usize,
    pub resolved: usize,
    pub failed: usize,
}

/// Resolves stream URLs for a catalog with a fixed pool of workers sharing one queue.
#[derive(Clone)]
pub struct Enricher {
    directory: Arc<dyn DeviceDirectory>,
    config: Arc<Config>,
}

impl Enricher {
    pub fn new(directory: Arc<dyn DeviceDirectory>, config: Config) -> Self {
        Self {
            directory,
            config: Arc::new(config),
        }
    }

    /// Attempts every device once the pool is up and returns after all of them
    /// have been tried. Failures stay per device: the device keeps whatever
    /// stream URL it had before.
    pub async fn process_devices(
        &self,
        devices: &mut [Device],
        cancel: &CancellationToken,
    ) -> EnrichSummary {
        let total = devices.len();
        if total == 0 {
            return EnrichSummary::default();
        }

        let (tx, rx) = mpsc::unbounded_channel::<(usize, Device)>();
        for (index, device) in devices.iter().enumerate() {
            if let Err(e) = tx.send((index, device.clone())) {
                error!("Failed to queue device: {}", e);
                break;
            }
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        let mut workers = JoinSet::new();

        for worker in 0..self.config.workers.clamp(1, total) {
            let queue = queue.clone();
            let enricher = self.clone();
            let cancel = cancel.clone();

            workers.spawn(async move {
                let mut resolved = Vec::new();

                loop {
                    let next = queue.lock().await.recv().await;
                    let Some((index, mut device)) = next else {
                        break;
                    };

                    if enricher.process_single_device(&mut device, &cancel).await {
                        resolved.push((index, device));
                    }
                }

                debug!(worker, resolved = resolved.len(), "Worker drained queue");
                resolved
            });
        }

        let mut resolved = 0;
        while let Some(result) = workers.join_next().await {
            match result {
                Ok(results) => {
                    for (index, device) in results {
                        devices[index] = device;
                        resolved += 1;
                    }
                }
                Err(err) => error!(err = ?err, "Enrichment worker failed"),
            }
        }

        EnrichSummary {
            total,
            resolved,
            failed: total - resolved,
        }
    }

    /// Resolves a single device in place. Returns whether a stream URL was set.
    pub async fn process_single_device(
        &self,
        device: &mut Device,
        cancel: &CancellationToken,
    ) -> bool {
        match resolve_stream_url(self.directory.as_ref(), &self.config, &device.devcode, cancel)
            .await
        {
            Some(url) => {
                device.stream_url = Some(url);
                true
            }
            None => false,
        }
    }
}

async fn resolve_stream_url(
    directory: &dyn DeviceDirectory,
    config: &Config,
    devcode: &str,
    cancel: &CancellationToken,
) -> Option<String> {
    for attempt in 1..=config.retries {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(devcode, "Lookup cancelled");
                return None;
            }
            result = directory.resolve_server(devcode) => result,
        };

        match result {
            Ok(server) => {
                return Some(render_stream_url(
                    &config.stream_url_template,
                    &server,
                    devcode,
                ));
            }
            Err(err) => warn!(devcode, attempt, err = %err, "Stream info lookup failed"),
        }
    }

    warn!(
        devcode,
        attempts = config.retries,
        "Giving up on device, stream URL left unchanged"
    );
    None
}
