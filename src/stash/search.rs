//! Substring search over stored values

use super::Stash;
use crate::model::Many;
use crate::store::BlobStore;

impl<S: BlobStore> Stash<Many, S> {
    /// Keys whose values contain `term`
    ///
    /// This is a flat scan over (key, value) pairs: a key is reported once per
    /// matching value, so it can appear more than once. Use
    /// [`search_unique`](Self::search_unique) for a deduplicated key list.
    /// With `any_case`, both sides are lowercased before matching.
    pub fn search(&self, term: &str, any_case: bool) -> Vec<String> {
        let term = if any_case {
            term.to_lowercase()
        } else {
            term.to_string()
        };

        let mut matches = Vec::new();
        for (key, values) in self.iter() {
            for value in values {
                let hit = if any_case {
                    value.to_lowercase().contains(&term)
                } else {
                    value.contains(&term)
                };
                if hit {
                    matches.push(key.to_string());
                }
            }
        }
        matches
    }

    /// Keys with at least one value containing `term`, each reported once
    pub fn search_unique(&self, term: &str, any_case: bool) -> Vec<String> {
        let mut keys = self.search(term, any_case);
        // Keys come out sorted, so repeats are adjacent.
        keys.dedup();
        keys
    }
}
