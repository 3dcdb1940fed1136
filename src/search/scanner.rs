use std::collections::BTreeSet;
use tracing::debug;
use crate::core::error::Result;
use crate::core::types::{IndexedAttribute, RecordId};
use crate::index::inverted::InvertedIndex;
use crate::search::aho_corasick::AhoCorasick;

/// Substring search over the keys of the text-attribute index.
pub struct MultiPatternScanner {
    automaton: AhoCorasick,
}

impl MultiPatternScanner {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(MultiPatternScanner {
            automaton: AhoCorasick::new(patterns)?,
        })
    }

    /// Text-attribute keys containing at least one pattern, ascending.
    pub fn matching_keys(&self, index: &InvertedIndex) -> Vec<String> {
        index
            .keys(IndexedAttribute::Text)
            .into_iter()
            .filter(|key| self.automaton.is_match(key))
            .collect()
    }

    /// Union of the posting lists of every matching key.
    pub fn run_over_text_index(&self, index: &InvertedIndex) -> BTreeSet<RecordId> {
        let keys = self.matching_keys(index);
        let mut found = BTreeSet::new();
        for key in &keys {
            if let Some(list) = index.postings(IndexedAttribute::Text, key) {
                found.extend(list.ids);
            }
        }

        debug!(
            patterns = self.automaton.patterns().len(),
            keys = keys.len(),
            ids = found.len(),
            "text index scan"
        );
        found
    }
}
