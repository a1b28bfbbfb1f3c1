use crate::model::document::Document;
use crate::traits::SynonymLibrary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Occurrence statistics of one word in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordStatistic {
    pub count: u32,
    /// Zero-based word position of the first occurrence
    pub first_position: u32,
    /// Zero-based index of the phrase holding the first occurrence
    pub first_phrase: u32,
}

/// Word and phrase statistics of one document, computed in the Condense stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Condenser {
    words: BTreeMap<String, WordStatistic>,
    phrase_count: u32,
    word_count: u32,
    synonyms: BTreeSet<String>,
}

fn is_phrase_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ';' | '\n')
}

impl Condenser {
    pub fn new(document: &Document, synonyms: Option<&dyn SynonymLibrary>) -> Self {
        let mut condenser = Condenser::default();
        let mut position = 0u32;

        let body = format!("{}\n{}", document.title, document.text);
        for phrase in body.split(is_phrase_end) {
            let mut phrase_has_words = false;
            for word in phrase
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
            {
                let word = word.to_lowercase();
                let phrase_index = condenser.phrase_count;
                condenser
                    .words
                    .entry(word)
                    .and_modify(|stat| stat.count += 1)
                    .or_insert(WordStatistic {
                        count: 1,
                        first_position: position,
                        first_phrase: phrase_index,
                    });
                position += 1;
                phrase_has_words = true;
            }
            if phrase_has_words {
                condenser.phrase_count += 1;
            }
        }
        condenser.word_count = position;

        if let Some(library) = synonyms {
            for word in condenser.words.keys() {
                for synonym in library.synonyms(word) {
                    if !condenser.words.contains_key(&synonym) {
                        condenser.synonyms.insert(synonym);
                    }
                }
            }
        }

        condenser
    }

    pub fn words(&self) -> &BTreeMap<String, WordStatistic> {
        &self.words
    }

    pub fn word(&self, word: &str) -> Option<&WordStatistic> {
        self.words.get(word)
    }

    pub fn synonyms(&self) -> &BTreeSet<String> {
        &self.synonyms
    }

    pub fn phrase_count(&self) -> u32 {
        self.phrase_count
    }

    /// Total number of words, duplicates included.
    pub fn word_count(&self) -> u32 {
        self.word_count
    }

    pub fn distinct_words(&self) -> usize {
        self.words.len()
    }

    /// Remove stopwords. Returns how many distinct words were removed.
    pub fn exclude_words(&mut self, stopwords: &HashSet<String>) -> usize {
        let before = self.words.len();
        self.words.retain(|word, _| !stopwords.contains(word));
        before - self.words.len()
    }
}
