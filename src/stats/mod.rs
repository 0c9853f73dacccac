//! Key frequency tables
//!
//! [`FrequencyTable`] is both the per-worker partial result and the
//! coordinator's aggregate. Merging is a key-wise sum; absent keys are
//! inserted. Sorting for output is by count descending, ties broken by key
//! ascending so the emitted order does not depend on message arrival order.
//!
//! # Example
//!
//! ```
//! use shardtally::stats::FrequencyTable;
//!
//! let mut left = FrequencyTable::new();
//! left.record("a");
//! left.record("a");
//!
//! let mut right = FrequencyTable::new();
//! right.record("b");
//! right.record("a");
//!
//! left.merge(right);
//! assert_eq!(left.get("a"), 3);
//! assert_eq!(left.sorted_entries()[0], ("a".to_string(), 3));
//! ```

use std::collections::HashMap;

/// Key → count mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: HashMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `key`
    pub fn record(&mut self, key: &str) {
        if let Some(count) = self.counts.get_mut(key) {
            *count += 1;
        } else {
            self.counts.insert(key.to_string(), 1);
        }
    }

    /// Count one occurrence of an owned key without re-allocating it
    pub fn record_owned(&mut self, key: String) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Fold another table into this one
    pub fn merge(&mut self, other: FrequencyTable) {
        for (key, value) in other.counts {
            *self.counts.entry(key).or_insert(0) += value;
        }
    }

    /// Count for `key`, zero if never seen
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Entries ordered by count descending, then key ascending
    pub fn sorted_entries(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (key, count) in iter {
            *table.counts.entry(key.into()).or_insert(0) += count;
        }
        table
    }
}
