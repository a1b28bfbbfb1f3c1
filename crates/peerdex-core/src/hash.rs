//! Positions on the DHT ring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 64-bit position on the DHT ring.
///
/// URL hashes and word (term) hashes share the same ring, so a term hash
/// selects the peers responsible for a word and a URL hash selects the
/// vertical partition a single reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DhtHash(pub u64);

impl DhtHash {
    /// Hash arbitrary text (a URL or a word) onto the ring.
    pub fn of(text: &str) -> Self {
        let digest = blake3::hash(text.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        DhtHash(u64::from_be_bytes(prefix))
    }

    /// Vertical partition of this hash when the ring is cut into
    /// `partitions` equal slices.
    pub fn vertical_position(&self, partitions: usize) -> usize {
        if partitions <= 1 {
            return 0;
        }
        ((self.0 as u128 * partitions as u128) >> 64) as usize
    }

    /// Clockwise distance from `self` to `other`.
    pub fn distance_to(&self, other: DhtHash) -> u64 {
        other.0.wrapping_sub(self.0)
    }

    /// The position `distance` steps clockwise from `self`.
    pub fn offset(&self, distance: u64) -> DhtHash {
        DhtHash(self.0.wrapping_add(distance))
    }

    /// `true` if `self` lies in the half-open ring interval `[start, limit)`.
    pub fn in_range(&self, start: DhtHash, limit: DhtHash) -> bool {
        start.distance_to(*self) < start.distance_to(limit)
    }
}

impl fmt::Display for DhtHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
