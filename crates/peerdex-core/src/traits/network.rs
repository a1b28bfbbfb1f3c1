use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::hash::DhtHash;
use crate::model::{CommittedRecord, PeerId, ReferenceContainer};

/// Snapshot of the peer network relevant to DHT distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkStatus {
    /// The seed database has been loaded
    pub seed_db_ready: bool,
    /// This peer has never connected to the network
    pub local_seed_virgin: bool,
    /// The network policy allows DHT distribution
    pub dht_active: bool,
}

/// Peer discovery and transfer layer.
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    fn status(&self) -> NetworkStatus;

    /// Number of vertical DHT partitions.
    fn vertical_partitions(&self) -> usize;

    /// Ring distance covered by the peers this node knows, `None` when
    /// there are too few peers to compute one.
    fn dht_horizon(&self) -> Option<u64>;

    /// Peer responsible for `term_hash` in vertical partition `vertical`.
    fn dht_target(&self, term_hash: DhtHash, vertical: usize) -> Option<PeerId>;

    /// Take reference containers in `[start, limit)` out of the local index.
    async fn select_containers(
        &self,
        start: DhtHash,
        limit: DhtHash,
        max_containers: usize,
        max_references: usize,
    ) -> ServiceResult<Vec<ReferenceContainer>>;

    async fn transmit(&self, target: &PeerId, containers: &[ReferenceContainer]) -> ServiceResult<()>;

    /// Busy share of the outbound HTTP connection pool, 0 to 100.
    fn connection_load_percent(&self) -> f64;

    fn active_upload_bytes_per_sec(&self) -> u64;

    /// Tell a peer that a URL it asked us to crawl has been indexed.
    async fn send_receipt(&self, peer: &PeerId, record: &CommittedRecord) -> ServiceResult<()>;
}
