//! The outbound cloud of reference chunks.

use std::collections::BTreeMap;

use peerdex_core::model::{PeerId, ReferenceContainer};

/// References of one vertical partition bound for one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionChunk {
    pub vertical: usize,
    pub target: PeerId,
    pub containers: Vec<ReferenceContainer>,
    pub reference_count: usize,
    /// Failed transmissions so far
    pub attempts: u32,
}

impl TransmissionChunk {
    pub fn new(vertical: usize, target: PeerId, container: ReferenceContainer) -> Self {
        let reference_count = container.len();
        Self {
            vertical,
            target,
            containers: vec![container],
            reference_count,
            attempts: 0,
        }
    }

    /// Add references, merging into a container for the same term.
    pub fn add(&mut self, container: ReferenceContainer) {
        self.reference_count += container.len();
        match self
            .containers
            .iter_mut()
            .find(|c| c.term_hash == container.term_hash)
        {
            Some(existing) => existing.merge(container),
            None => self.containers.push(container),
        }
    }

    /// Fold another chunk of the same partition into this one.
    pub fn absorb(&mut self, other: TransmissionChunk) {
        self.attempts = self.attempts.max(other.attempts);
        for container in other.containers {
            self.add(container);
        }
    }
}

/// Chunks waiting for transmission, keyed by vertical partition.
///
/// There is at most one chunk per partition, so the cloud never holds more
/// entries than the network has partitions.
#[derive(Debug, Default)]
pub struct Cloud {
    chunks: BTreeMap<usize, TransmissionChunk>,
}

impl Cloud {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn reference_count(&self) -> usize {
        self.chunks.values().map(|c| c.reference_count).sum()
    }

    /// Add references to the chunk of `vertical`. Returns the container
    /// back if the partition has no chunk yet.
    pub fn add_to_existing(
        &mut self,
        vertical: usize,
        container: ReferenceContainer,
    ) -> Option<ReferenceContainer> {
        match self.chunks.get_mut(&vertical) {
            Some(chunk) => {
                chunk.add(container);
                None
            }
            None => Some(container),
        }
    }

    /// Put a chunk in, merging with a chunk already held for its partition.
    pub fn insert(&mut self, chunk: TransmissionChunk) {
        match self.chunks.get_mut(&chunk.vertical) {
            Some(existing) => existing.absorb(chunk),
            None => {
                self.chunks.insert(chunk.vertical, chunk);
            }
        }
    }

    /// Remove the chunk with the most references.
    pub fn take_largest(&mut self) -> Option<TransmissionChunk> {
        let vertical = self
            .chunks
            .iter()
            .max_by_key(|(_, chunk)| chunk.reference_count)
            .map(|(vertical, _)| *vertical)?;
        self.chunks.remove(&vertical)
    }

    pub fn drain(&mut self) -> Vec<TransmissionChunk> {
        std::mem::take(&mut self.chunks).into_values().collect()
    }

    pub fn snapshot(&self) -> Vec<TransmissionChunk> {
        self.chunks.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdex_core::model::WordReference;
    use peerdex_core::DhtHash;

    fn container(term: u64, refs: u64) -> ReferenceContainer {
        ReferenceContainer::with_references(
            DhtHash(term),
            (0..refs).map(|i| WordReference::new(DhtHash(i), 1, 0)).collect(),
        )
    }

    #[test]
    fn test_one_chunk_per_partition() {
        let mut cloud = Cloud::default();
        cloud.insert(TransmissionChunk::new(0, PeerId::new("a"), container(1, 2)));
        cloud.insert(TransmissionChunk::new(0, PeerId::new("b"), container(2, 3)));
        cloud.insert(TransmissionChunk::new(1, PeerId::new("c"), container(3, 1)));

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.reference_count(), 6);
        let first = &cloud.snapshot()[0];
        assert_eq!(first.target, PeerId::new("a"));
        assert_eq!(first.containers.len(), 2);
    }

    #[test]
    fn test_same_term_merges_into_one_container() {
        let mut chunk = TransmissionChunk::new(0, PeerId::new("a"), container(7, 2));
        chunk.add(container(7, 3));
        assert_eq!(chunk.containers.len(), 1);
        assert_eq!(chunk.reference_count, 5);
    }

    #[test]
    fn test_take_largest() {
        let mut cloud = Cloud::default();
        cloud.insert(TransmissionChunk::new(0, PeerId::new("a"), container(1, 2)));
        cloud.insert(TransmissionChunk::new(3, PeerId::new("b"), container(2, 9)));

        let largest = cloud.take_largest().unwrap();
        assert_eq!(largest.vertical, 3);
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn test_absorb_keeps_highest_attempt_count() {
        let mut kept = TransmissionChunk::new(0, PeerId::new("a"), container(1, 1));
        let mut failed = TransmissionChunk::new(0, PeerId::new("a"), container(2, 1));
        failed.attempts = 2;
        kept.absorb(failed);
        assert_eq!(kept.attempts, 2);
        assert_eq!(kept.reference_count, 2);
    }
}
