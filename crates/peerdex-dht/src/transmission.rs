//! Sending chunks to their target peers on a worker stage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use peerdex_core::traits::PeerNetwork;
use peerdex_pipeline::{StageFailure, StageOutcome, StageProcessor};
use tracing::{info, warn};

use crate::chunk::TransmissionChunk;

/// Stage name of the transmission workers.
pub const TRANSMISSION_STAGE: &str = "dht-transmission";

/// Transmits one chunk, bounded by a timeout.
///
/// A failed chunk goes back to the dispatcher through `failures` with its
/// attempt count raised; the dispatcher decides whether to retry it.
pub(crate) struct TransmissionProcessor {
    network: Arc<dyn PeerNetwork>,
    timeout: Duration,
    failures: flume::Sender<TransmissionChunk>,
    delivered: Arc<AtomicU64>,
}

impl TransmissionProcessor {
    pub(crate) fn new(
        network: Arc<dyn PeerNetwork>,
        timeout: Duration,
        failures: flume::Sender<TransmissionChunk>,
        delivered: Arc<AtomicU64>,
    ) -> Self {
        Self {
            network,
            timeout,
            failures,
            delivered,
        }
    }
}

#[async_trait]
impl StageProcessor<TransmissionChunk> for TransmissionProcessor {
    async fn process(&self, mut chunk: TransmissionChunk) -> StageOutcome<TransmissionChunk> {
        let sent = tokio::time::timeout(
            self.timeout,
            self.network.transmit(&chunk.target, &chunk.containers),
        )
        .await;

        let reason = match sent {
            Ok(Ok(())) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                info!(
                    target_peer = %chunk.target,
                    vertical = chunk.vertical,
                    references = chunk.reference_count,
                    containers = chunk.containers.len(),
                    "chunk transmitted"
                );
                return StageOutcome::Passed(chunk);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", self.timeout.as_secs()),
        };

        chunk.attempts += 1;
        warn!(
            target_peer = %chunk.target,
            vertical = chunk.vertical,
            attempts = chunk.attempts,
            error = %reason,
            "chunk transmission failed"
        );
        let failure = StageFailure::new(format!("transmission to {}: {reason}", chunk.target));
        if self.failures.send(chunk).is_err() {
            warn!("dispatcher gone, failed chunk dropped");
        }
        StageOutcome::Failed(failure)
    }
}
