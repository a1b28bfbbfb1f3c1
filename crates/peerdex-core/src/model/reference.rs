use crate::hash::DhtHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One posting in the reverse word index: a word occurs in a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordReference {
    pub url_hash: DhtHash,
    pub hit_count: u32,
    pub first_position: u32,
}

impl WordReference {
    pub fn new(url_hash: DhtHash, hit_count: u32, first_position: u32) -> Self {
        Self {
            url_hash,
            hit_count,
            first_position,
        }
    }
}

/// All references of one word (term hash) in a slice of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceContainer {
    pub term_hash: DhtHash,
    pub references: Vec<WordReference>,
}

impl ReferenceContainer {
    pub fn new(term_hash: DhtHash) -> Self {
        Self {
            term_hash,
            references: Vec::new(),
        }
    }

    pub fn with_references(term_hash: DhtHash, references: Vec<WordReference>) -> Self {
        Self {
            term_hash,
            references,
        }
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn add(&mut self, reference: WordReference) {
        self.references.push(reference);
    }

    /// Merge the references of `other` (same term) into this container.
    pub fn merge(&mut self, other: ReferenceContainer) {
        self.references.extend(other.references);
    }

    /// Split this container by the vertical position of each reference's
    /// URL hash. Empty partitions are left out.
    pub fn split_by_vertical(self, partitions: usize) -> BTreeMap<usize, ReferenceContainer> {
        let mut split: BTreeMap<usize, ReferenceContainer> = BTreeMap::new();
        for reference in self.references {
            let vertical = reference.url_hash.vertical_position(partitions);
            split
                .entry(vertical)
                .or_insert_with(|| ReferenceContainer::new(self.term_hash))
                .add(reference);
        }
        split
    }
}

/// What the full-text store reports back for a committed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedRecord {
    pub url: String,
    pub url_hash: DhtHash,
    pub word_count: usize,
    pub stored_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_by_vertical_keeps_every_reference() {
        let term = DhtHash::of("word");
        let refs = vec![
            WordReference::new(DhtHash(0), 1, 0),
            WordReference::new(DhtHash(u64::MAX), 1, 0),
            WordReference::new(DhtHash(1), 2, 3),
        ];
        let split = ReferenceContainer::with_references(term, refs).split_by_vertical(4);

        assert_eq!(split.len(), 2);
        assert_eq!(split[&0].len(), 2);
        assert_eq!(split[&3].len(), 1);
        assert!(split.values().all(|c| c.term_hash == term));
    }
}
