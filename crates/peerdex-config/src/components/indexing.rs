use serde::{Deserialize, Serialize};

/// Indexing policy shared by all crawl profiles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexingConfig {
    /// Words removed from every condenser before the document is stored
    pub stopwords: Vec<String>,
    /// Intranet nodes index documents even if they carry a noindex rule
    pub intranet_mode: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            stopwords: ["a", "an", "and", "der", "die", "das", "in", "of", "the", "to", "und"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
            intranet_mode: false,
        }
    }
}
