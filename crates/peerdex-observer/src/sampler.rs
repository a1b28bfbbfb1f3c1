//! Reading and classifying the three resource axes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use peerdex_config::components::ResourceConfig;
use peerdex_core::{ServiceError, ServiceResult};
use peerdex_core::traits::SystemProbe;
use tracing::{debug, warn};

use crate::disk_usage::DiskUsageCache;
use crate::state::{Axis, AxisReading, ResourceSnapshot, Thresholds};

/// Takes readings from a [`SystemProbe`] off the async runtime.
pub struct ResourceSampler {
    probe: Arc<dyn SystemProbe>,
    data_dir: PathBuf,
    config: ResourceConfig,
    disk_used: DiskUsageCache,
}

impl ResourceSampler {
    pub fn new(probe: Arc<dyn SystemProbe>, config: ResourceConfig) -> Self {
        let interval = Duration::from_secs(config.disk_used.rescan_interval_secs);
        Self {
            probe,
            data_dir: config.data_dir.clone(),
            disk_used: DiskUsageCache::new(interval),
            config,
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Drop the cached directory size so the next reading rescans.
    pub fn invalidate_disk_used(&self) {
        self.disk_used.invalidate();
    }

    pub async fn disk_free(&self) -> AxisReading {
        let probe = Arc::clone(&self.probe);
        let dir = self.data_dir.clone();
        let value = blocking(move || probe.disk_free(&dir)).await;
        self.reading(Axis::DiskFree, value)
    }

    pub async fn disk_used(&self) -> AxisReading {
        let value = match self.disk_used.fresh() {
            Some(bytes) => Ok(bytes),
            None => {
                let probe = Arc::clone(&self.probe);
                let dir = self.data_dir.clone();
                let scanned = blocking(move || probe.dir_size(&dir)).await;
                if let Ok(bytes) = scanned {
                    debug!(bytes, dir = %self.data_dir.display(), "data directory rescanned");
                    self.disk_used.store(bytes);
                }
                scanned
            }
        };
        self.reading(Axis::DiskUsed, value)
    }

    pub async fn memory(&self) -> AxisReading {
        let probe = Arc::clone(&self.probe);
        let value = blocking(move || probe.memory_free()).await;
        self.reading(Axis::Memory, value)
    }

    pub async fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            disk_free: self.disk_free().await,
            disk_used: self.disk_used().await,
            memory: self.memory().await,
        }
    }

    fn reading(&self, axis: Axis, value: ServiceResult<u64>) -> AxisReading {
        let value = match value {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(axis = %axis, error = %e, "resource probe failed, treating axis as ample");
                None
            }
        };
        AxisReading::classify(axis, value, Thresholds::for_axis(axis, &self.config))
    }
}

async fn blocking<F>(probe: F) -> ServiceResult<u64>
where
    F: FnOnce() -> ServiceResult<u64> + Send + 'static,
{
    tokio::task::spawn_blocking(probe)
        .await
        .map_err(|e| ServiceError::Probe(format!("probe task failed: {e}")))?
}
