use crate::events::{Action, Row};
use anyhow::Result;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Reconstructed rows for one (entity label, query name) pair.
///
/// A bag: duplicates are tracked independently and removal takes out at
/// most one occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn add(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Removes the first structurally equal occurrence; false when absent.
    pub fn remove_first(&mut self, row: &Row) -> bool {
        match self.rows.iter().position(|r| r == row) {
            Some(idx) => {
                self.rows.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, row: &Row) -> usize {
        self.rows.iter().filter(|r| *r == row).count()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Appended,
    Removed,
    /// Remove of a row never seen in this set; expected when the log starts
    /// mid-history.
    Absent,
    Ignored(String),
}

pub fn apply(set: &mut ResultSet, action: &Action, row: Row) -> ApplyOutcome {
    match action {
        Action::Added => {
            set.add(row);
            ApplyOutcome::Appended
        }
        Action::Removed => {
            if set.remove_first(&row) {
                ApplyOutcome::Removed
            } else {
                ApplyOutcome::Absent
            }
        }
        Action::Unknown(raw) => ApplyOutcome::Ignored(raw.clone()),
    }
}

/// In-memory overlay of persisted result sets, keyed label -> query.
///
/// Entries are seeded from storage on first touch and live here until the
/// cache is cleared after a checkpoint.
#[derive(Debug, Default)]
pub struct WorkingCache {
    entries: BTreeMap<String, BTreeMap<String, ResultSet>>,
}

impl WorkingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached set, calling `load` only if the pair is not cached.
    pub fn entry_or_load<F>(&mut self, label: &str, query: &str, load: F) -> Result<&mut ResultSet>
    where
        F: FnOnce(&str, &str) -> Result<Vec<Row>>,
    {
        let queries = self.entries.entry(label.to_string()).or_default();
        match queries.entry(query.to_string()) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let rows = load(label, query)?;
                Ok(slot.insert(ResultSet::from_rows(rows)))
            }
        }
    }

    pub fn get(&self, label: &str, query: &str) -> Option<&ResultSet> {
        self.entries.get(label).and_then(|q| q.get(query))
    }

    /// Entries in (label, query) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &ResultSet)> {
        self.entries.iter().flat_map(|(label, queries)| {
            queries
                .iter()
                .map(move |(query, set)| (label.as_str(), query.as_str(), set))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: serde_json::Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn added_appends_duplicates() {
        let mut set = ResultSet::default();
        let r = row(json!({"pid": "1"}));
        assert_eq!(apply(&mut set, &Action::Added, r.clone()), ApplyOutcome::Appended);
        assert_eq!(apply(&mut set, &Action::Added, r.clone()), ApplyOutcome::Appended);
        assert_eq!(set.count(&r), 2);
    }

    #[test]
    fn removed_takes_first_match_only() {
        let a = row(json!({"pid": "1"}));
        let b = row(json!({"pid": "2"}));
        let mut set = ResultSet::from_rows(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(apply(&mut set, &Action::Removed, a.clone()), ApplyOutcome::Removed);
        assert_eq!(set.rows, vec![b, a]);
    }

    #[test]
    fn removing_absent_row_is_noop() {
        let mut set = ResultSet::from_rows(vec![row(json!({"pid": "1"}))]);
        let before = set.clone();
        let outcome = apply(&mut set, &Action::Removed, row(json!({"pid": "9"})));
        assert_eq!(outcome, ApplyOutcome::Absent);
        assert_eq!(set, before);
    }

    #[test]
    fn unknown_action_leaves_set_untouched() {
        let mut set = ResultSet::from_rows(vec![row(json!({"pid": "1"}))]);
        let before = set.clone();
        let outcome = apply(
            &mut set,
            &Action::Unknown("snapshot".to_string()),
            row(json!({"pid": "1"})),
        );
        assert_eq!(outcome, ApplyOutcome::Ignored("snapshot".to_string()));
        assert_eq!(set, before);
    }

    #[test]
    fn equality_is_structural_not_ordered() {
        let mut set = ResultSet::default();
        set.add(row(json!({"a": "1", "b": "2"})));
        assert!(set.remove_first(&row(json!({"b": "2", "a": "1"}))));
        assert!(set.is_empty());
    }

    #[test]
    fn bag_counts_never_go_negative() {
        let r = row(json!({"path": "/etc/passwd"}));
        for (adds, removes) in [(3usize, 1usize), (2, 2), (1, 4), (0, 2)] {
            let mut set = ResultSet::default();
            for _ in 0..adds {
                apply(&mut set, &Action::Added, r.clone());
            }
            for _ in 0..removes {
                apply(&mut set, &Action::Removed, r.clone());
            }
            assert_eq!(set.count(&r), adds.saturating_sub(removes));
        }
    }

    #[test]
    fn cache_loads_each_pair_once() {
        let mut cache = WorkingCache::new();
        let mut loads = 0;
        for _ in 0..3 {
            cache
                .entry_or_load("web-1", "users", |_, _| {
                    loads += 1;
                    Ok(vec![row(json!({"a": 1}))])
                })
                .unwrap();
        }
        assert_eq!(loads, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("web-1", "users").map(ResultSet::len), Some(1));
    }

    #[test]
    fn cache_iterates_in_key_order_and_clears() {
        let mut cache = WorkingCache::new();
        for (label, query) in [("web-2", "b"), ("web-1", "z"), ("web-1", "a")] {
            cache.entry_or_load(label, query, |_, _| Ok(Vec::new())).unwrap();
        }
        let keys: Vec<_> = cache.iter().map(|(l, q, _)| (l, q)).collect();
        assert_eq!(keys, vec![("web-1", "a"), ("web-1", "z"), ("web-2", "b")]);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_load_leaves_pair_uncached() {
        let mut cache = WorkingCache::new();
        let err = cache
            .entry_or_load("web-1", "users", |_, _| anyhow::bail!("disk on fire"))
            .unwrap_err();
        assert!(format!("{err}").contains("disk on fire"));
        assert!(cache.get("web-1", "users").is_none());
    }
}
