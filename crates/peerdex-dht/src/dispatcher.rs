//! Accumulation and transmission of reverse word index references.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use peerdex_config::components::{StageConfig, BYTES_PER_MIB};
use peerdex_core::model::ReferenceContainer;
use peerdex_core::traits::IndexingLoad;
use peerdex_core::{spawn_periodic, DhtHash, PeriodicTask, ServiceError, Switchboard};
use peerdex_pipeline::Stage;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chunk::{Cloud, TransmissionChunk};
use crate::error::{DeferReason, TransferRejection};
use crate::transmission::{TransmissionProcessor, TRANSMISSION_STAGE};

/// Outcome of one accumulation or transmission decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Progress,
    Deferred(DeferReason),
}

impl Decision {
    pub fn made_progress(&self) -> bool {
        matches!(self, Decision::Progress)
    }
}

/// Both decisions of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub accumulated: Decision,
    pub transmitted: Decision,
}

/// Failed chunks handled at the start of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleReport {
    /// Chunks put back into the cloud for another attempt
    pub requeued: usize,
    /// Chunks that used up their attempts and were restored locally
    pub restored: usize,
}

/// Moves parts of the local reverse word index to the peers responsible
/// for them.
///
/// Each tick first settles failed transmissions, then checks the transfer
/// preconditions, then takes one accumulation and one transmission
/// decision. Neither decision blocks: both act once or defer.
///
/// The cloud is written only by the dispatcher's own tick; other tasks may
/// read its size.
pub struct DhtDispatcher {
    switchboard: Arc<Switchboard>,
    indexing: Arc<dyn IndexingLoad>,
    cloud: Mutex<Cloud>,
    transmissions: Arc<Stage<TransmissionChunk>>,
    failures: flume::Receiver<TransmissionChunk>,
    delivered: Arc<AtomicU64>,
}

impl DhtDispatcher {
    /// Create the dispatcher and start its transmission workers. Must run
    /// inside a tokio runtime.
    pub fn new(switchboard: Arc<Switchboard>, indexing: Arc<dyn IndexingLoad>) -> Self {
        let config = &switchboard.config.dht;
        let workers = config.transmission_workers.max(1);
        let (failure_tx, failures) = flume::unbounded();
        let delivered = Arc::new(AtomicU64::new(0));

        let processor = TransmissionProcessor::new(
            Arc::clone(&switchboard.services.network),
            Duration::from_secs(config.transmission_timeout_secs.max(1)),
            failure_tx,
            Arc::clone(&delivered),
        );
        let transmissions = Stage::spawn(
            TRANSMISSION_STAGE,
            StageConfig::new(workers, workers * 3),
            Arc::new(processor),
            None,
        );

        Self {
            switchboard,
            indexing,
            cloud: Mutex::new(Cloud::default()),
            transmissions,
            failures,
            delivered,
        }
    }

    pub fn cloud_size(&self) -> usize {
        self.cloud.lock().len()
    }

    pub fn cloud_references(&self) -> usize {
        self.cloud.lock().reference_count()
    }

    pub fn cloud_snapshot(&self) -> Vec<TransmissionChunk> {
        self.cloud.lock().snapshot()
    }

    /// Transmissions queued or running.
    pub fn sessions(&self) -> usize {
        self.transmissions.queue_depth() + self.transmissions.in_flight()
    }

    /// Chunks delivered since start.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Check whether the node may distribute its index right now.
    pub fn shall_transfer(&self) -> Result<(), TransferRejection> {
        let sb = &self.switchboard;
        let config = &sb.config.dht;

        if let Some(cause) = sb.activity.caution_cause(&sb.config.caution) {
            return Err(TransferRejection::OnlineCaution(cause));
        }

        let status = sb.services.network.status();
        if !status.seed_db_ready {
            return Err(TransferRejection::SeedDbNotReady);
        }
        if status.local_seed_virgin {
            return Err(TransferRejection::VirginPeer);
        }
        if !config.enabled || !status.dht_active {
            return Err(TransferRejection::NetworkPolicy);
        }
        if !config.distribution_allowed {
            return Err(TransferRejection::NotAllowed);
        }

        let count = sb.services.index.rwi_count();
        let min = config.min_rwi_count as u64;
        if count < min {
            return Err(TransferRejection::TooFewEntries { count, min });
        }

        if !config.allow_while_crawling {
            let queued = sb.services.crawl_queues.local_size();
            if queued > 0 {
                return Err(TransferRejection::Crawling { queued });
            }
        }
        if !config.allow_while_indexing {
            let queued = self.indexing.queue_size();
            if queued > 1 {
                return Err(TransferRejection::Indexing { queued });
            }
        }
        Ok(())
    }

    /// Select references from a random ring range into the cloud.
    pub async fn accumulate(&self) -> Decision {
        let sb = &self.switchboard;
        let config = &sb.config.dht;
        let network = &sb.services.network;
        let partitions = network.vertical_partitions().max(1);

        let size = self.cloud_size();
        if size >= partitions {
            return Decision::Deferred(DeferReason::CloudFull { size, partitions });
        }

        if let Some(free) = self.free_memory().await {
            let min = config.min_free_memory_mib.saturating_mul(BYTES_PER_MIB);
            if free < min {
                return Decision::Deferred(DeferReason::LowMemory {
                    free_mib: free / BYTES_PER_MIB,
                    min_mib: config.min_free_memory_mib,
                });
            }
        }

        let load = network.connection_load_percent();
        if load > config.accumulate_max_connection_load {
            return Decision::Deferred(DeferReason::ConnectionLoad {
                load,
                max: config.accumulate_max_connection_load,
            });
        }
        let kib = network.active_upload_bytes_per_sec() / 1024;
        if kib > config.accumulate_max_upload_kib {
            return Decision::Deferred(DeferReason::Upload {
                kib,
                max_kib: config.accumulate_max_upload_kib,
            });
        }

        let Some(horizon) = network.dht_horizon() else {
            return Decision::Deferred(DeferReason::NoHorizon);
        };
        let start = DhtHash(rand::random::<u64>());
        let limit = start.offset(horizon);

        let selected = match network
            .select_containers(
                start,
                limit,
                config.max_container_count,
                config.max_reference_count,
            )
            .await
        {
            Ok(containers) => containers,
            Err(e) => return Decision::Deferred(DeferReason::SelectionFailed(e.to_string())),
        };
        if selected.iter().all(ReferenceContainer::is_empty) {
            return Decision::Deferred(DeferReason::NothingSelected);
        }

        let selected_containers = selected.len();
        let mut unplaced = Vec::new();
        {
            let mut cloud = self.cloud.lock();
            for container in selected {
                for (vertical, part) in container.split_by_vertical(partitions) {
                    let Some(part) = cloud.add_to_existing(vertical, part) else {
                        continue;
                    };
                    match network.dht_target(part.term_hash, vertical) {
                        Some(target) => cloud.insert(TransmissionChunk::new(vertical, target, part)),
                        None => unplaced.push(part),
                    }
                }
            }
        }

        if !unplaced.is_empty() {
            warn!(
                containers = unplaced.len(),
                "no target peer for selected references, restoring them"
            );
            self.restore(unplaced).await;
        }

        info!(
            start = %start,
            limit = %limit,
            containers = selected_containers,
            cloud = self.cloud_size(),
            "references accumulated"
        );
        Decision::Progress
    }

    async fn free_memory(&self) -> Option<u64> {
        let probe = Arc::clone(&self.switchboard.services.probe);
        let reading = tokio::task::spawn_blocking(move || probe.memory_free())
            .await
            .map_err(|e| ServiceError::Probe(e.to_string()))
            .and_then(|r| r);
        match reading {
            Ok(free) => Some(free),
            Err(e) => {
                debug!(error = %e, "free memory unknown, not limiting accumulation");
                None
            }
        }
    }

    /// Hand the largest cloud chunk to the transmission workers.
    pub async fn transmit(&self) -> Decision {
        if self.transmissions.is_closed() {
            return Decision::Deferred(DeferReason::Closed);
        }
        let sb = &self.switchboard;
        let config = &sb.config.dht;
        let network = &sb.services.network;

        let sessions = self.sessions();
        if sessions >= config.transmit_max_sessions
            || self.transmissions.queue_depth() >= self.transmissions.capacity()
        {
            return Decision::Deferred(DeferReason::TooManySessions { sessions });
        }

        let load = network.connection_load_percent();
        if load > config.transmit_max_connection_load {
            return Decision::Deferred(DeferReason::ConnectionLoad {
                load,
                max: config.transmit_max_connection_load,
            });
        }
        let kib = network.active_upload_bytes_per_sec() / 1024;
        if kib > config.transmit_max_upload_kib {
            return Decision::Deferred(DeferReason::Upload {
                kib,
                max_kib: config.transmit_max_upload_kib,
            });
        }

        let Some(chunk) = self.cloud.lock().take_largest() else {
            return Decision::Deferred(DeferReason::CloudEmpty);
        };
        debug!(
            target_peer = %chunk.target,
            vertical = chunk.vertical,
            references = chunk.reference_count,
            "chunk handed to transmission"
        );
        let references = chunk.reference_count;
        if let Err(e) = self.transmissions.enqueue(chunk).await {
            error!(error = %e, references, "transmission stage closed, chunk lost");
            return Decision::Deferred(DeferReason::Closed);
        }
        Decision::Progress
    }

    /// Requeue failed chunks that have attempts left and restore the rest
    /// into the local index.
    pub async fn settle_failures(&self) -> SettleReport {
        let max_attempts = self.switchboard.config.dht.max_transmission_attempts;
        let mut report = SettleReport::default();
        let mut exhausted = Vec::new();

        for chunk in self.failures.try_iter() {
            if chunk.attempts < max_attempts {
                report.requeued += 1;
                self.cloud.lock().insert(chunk);
            } else {
                warn!(
                    target_peer = %chunk.target,
                    vertical = chunk.vertical,
                    attempts = chunk.attempts,
                    "giving up on chunk, restoring references locally"
                );
                report.restored += 1;
                exhausted.extend(chunk.containers);
            }
        }

        if !exhausted.is_empty() {
            self.restore(exhausted).await;
        }
        report
    }

    async fn restore(&self, containers: Vec<ReferenceContainer>) {
        let references: usize = containers.iter().map(ReferenceContainer::len).sum();
        if let Err(e) = self
            .switchboard
            .services
            .index
            .restore_references(containers)
            .await
        {
            error!(error = %e, references, "restoring references failed");
        }
    }

    /// One scheduling round.
    pub async fn tick(&self) -> DispatchReport {
        let settled = self.settle_failures().await;
        if settled != SettleReport::default() {
            debug!(requeued = settled.requeued, restored = settled.restored, "failed chunks settled");
        }

        if let Err(rejection) = self.shall_transfer() {
            debug!(reason = %rejection, "DHT transfer not allowed");
            return DispatchReport {
                accumulated: Decision::Deferred(rejection.clone().into()),
                transmitted: Decision::Deferred(rejection.into()),
            };
        }

        let accumulated = self.accumulate().await;
        let transmitted = self.transmit().await;
        for (decision, name) in [(&accumulated, "accumulation"), (&transmitted, "transmission")] {
            if let Decision::Deferred(reason) = decision {
                debug!(decision = name, reason = %reason, "DHT decision deferred");
            }
        }
        DispatchReport {
            accumulated,
            transmitted,
        }
    }

    /// Finish running transmissions and restore everything still in the
    /// cloud into the local index. Returns the number of restored chunks.
    pub async fn close(&self) -> usize {
        if let Err(e) = self.transmissions.shutdown(true).await {
            error!(error = %e, "transmission stage did not stop cleanly");
        }

        let mut chunks = self.cloud.lock().drain();
        chunks.extend(self.failures.try_iter());
        let count = chunks.len();
        let containers: Vec<ReferenceContainer> =
            chunks.into_iter().flat_map(|c| c.containers).collect();
        if !containers.is_empty() {
            self.restore(containers).await;
        }
        info!(restored = count, delivered = self.delivered(), "DHT dispatcher closed");
        count
    }

    /// Run [`tick`](Self::tick) on the configured cadence until cancelled.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.switchboard.config.dht.interval_secs.max(1));
        spawn_periodic("dht-dispatcher", interval, token, self)
    }
}

#[async_trait]
impl PeriodicTask for DhtDispatcher {
    async fn run_once(&self) {
        self.tick().await;
    }
}
