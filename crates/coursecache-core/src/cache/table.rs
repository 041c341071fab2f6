//! Entity tables and secondary indices.
//!
//! An [`EntityTable`] is the canonical by-id store for one entity family.
//! A [`SecondaryIndex`] groups child ids under a parent id; it never owns
//! records and can always be rebuilt from a table plus the parent key.

use std::collections::BTreeMap;

use crate::models::{Assignment, ContentItem, Course, Module, Submission};

/// A record with a server-assigned identifier.
pub trait Entity: Clone {
    /// Singular name used in log fields and stale-reference errors.
    const KIND: &'static str;

    fn id(&self) -> i64;

    /// Merge a fresh copy of this record while keeping locally derived
    /// fields. Records without derived fields just take the fresh copy.
    fn merge_preserving_derived(&mut self, incoming: Self) {
        *self = incoming;
    }
}

impl Entity for Course {
    const KIND: &'static str = "course";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Module {
    const KIND: &'static str = "module";

    fn id(&self) -> i64 {
        self.id
    }

    fn merge_preserving_derived(&mut self, incoming: Self) {
        self.absorb_remote(incoming);
    }
}

impl Entity for ContentItem {
    const KIND: &'static str = "content";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Assignment {
    const KIND: &'static str = "assignment";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Submission {
    const KIND: &'static str = "submission";

    fn id(&self) -> i64 {
        self.id
    }
}

/// How an incoming record is combined with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// The incoming record fully supersedes the local one.
    Replace,
    /// Shallow merge that keeps locally derived fields.
    PreserveDerived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityTable<T> {
    records: BTreeMap<i64, T>,
}

impl<T> Default for EntityTable<T> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }
}

impl<T: Entity> EntityTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or combine with the existing record of the same id.
    pub fn merge(&mut self, record: T, strategy: MergeStrategy) -> MergeOutcome {
        match self.records.get_mut(&record.id()) {
            Some(existing) => {
                match strategy {
                    MergeStrategy::Replace => *existing = record,
                    MergeStrategy::PreserveDerived => existing.merge_preserving_derived(record),
                }
                MergeOutcome::Updated
            }
            None => {
                self.records.insert(record.id(), record);
                MergeOutcome::Inserted
            }
        }
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut T> {
        self.records.get_mut(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.records.contains_key(&id)
    }

    pub fn remove(&mut self, id: i64) -> Option<T> {
        self.records.remove(&id)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parent id -> ordered child ids.
///
/// A missing bucket means "never loaded"; an empty bucket means "loaded,
/// and there is nothing under this parent".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecondaryIndex {
    buckets: BTreeMap<i64, Vec<i64>>,
}

impl SecondaryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from the records of a table.
    pub fn rebuild<'a, T, I, F>(records: I, parent_of: F) -> Self
    where
        T: Entity + 'a,
        I: IntoIterator<Item = &'a T>,
        F: Fn(&T) -> i64,
    {
        let mut index = Self::new();
        for record in records {
            index.insert(parent_of(record), record.id());
        }
        index
    }

    /// Add a child, creating the bucket if needed. Returns false if it was already there.
    pub fn insert(&mut self, parent: i64, child: i64) -> bool {
        let bucket = self.buckets.entry(parent).or_default();
        if bucket.contains(&child) {
            false
        } else {
            bucket.push(child);
            true
        }
    }

    pub fn remove(&mut self, parent: i64, child: i64) -> bool {
        match self.buckets.get_mut(&parent) {
            Some(bucket) => {
                let before = bucket.len();
                bucket.retain(|&c| c != child);
                bucket.len() != before
            }
            None => false,
        }
    }

    /// Set a bucket's exact contents and order, returning the previous contents.
    pub fn replace_bucket(&mut self, parent: i64, children: Vec<i64>) -> Vec<i64> {
        let mut deduped = Vec::with_capacity(children.len());
        for child in children {
            if !deduped.contains(&child) {
                deduped.push(child);
            }
        }
        self.buckets.insert(parent, deduped).unwrap_or_default()
    }

    pub fn take_bucket(&mut self, parent: i64) -> Option<Vec<i64>> {
        self.buckets.remove(&parent)
    }

    pub fn bucket(&self, parent: i64) -> Option<&[i64]> {
        self.buckets.get(&parent).map(Vec::as_slice)
    }

    /// Children of a parent; empty when the bucket was never loaded.
    pub fn children(&self, parent: i64) -> &[i64] {
        self.bucket(parent).unwrap_or(&[])
    }

    pub fn contains_bucket(&self, parent: i64) -> bool {
        self.buckets.contains_key(&parent)
    }

    pub fn parents(&self) -> impl Iterator<Item = i64> + '_ {
        self.buckets.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(id: i64, module_id: i64) -> ContentItem {
        serde_json::from_value(serde_json::json!({
            "id": id, "moduleId": module_id, "title": format!("Item {}", id)
        }))
        .expect("valid content json")
    }

    #[test]
    fn test_merge_inserts_then_updates() {
        let mut table = EntityTable::new();
        assert_eq!(table.merge(content(1, 10), MergeStrategy::Replace), MergeOutcome::Inserted);
        let mut renamed = content(1, 10);
        renamed.title = "Renamed".to_string();
        assert_eq!(table.merge(renamed, MergeStrategy::Replace), MergeOutcome::Updated);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(1).map(|c| c.title.as_str()), Some("Renamed"));
    }

    #[test]
    fn test_index_insert_is_idempotent() {
        let mut index = SecondaryIndex::new();
        assert!(!index.contains_bucket(10));
        assert!(index.insert(10, 1));
        assert!(!index.insert(10, 1));
        assert_eq!(index.children(10), &[1]);
    }

    #[test]
    fn test_empty_bucket_differs_from_missing() {
        let mut index = SecondaryIndex::new();
        index.replace_bucket(10, vec![]);
        assert!(index.contains_bucket(10));
        assert_eq!(index.bucket(10), Some(&[][..]));
        assert_eq!(index.bucket(11), None);
    }

    #[test]
    fn test_replace_bucket_dedupes_and_returns_previous() {
        let mut index = SecondaryIndex::new();
        index.insert(10, 1);
        let previous = index.replace_bucket(10, vec![3, 2, 3]);
        assert_eq!(previous, vec![1]);
        assert_eq!(index.children(10), &[3, 2]);
    }

    #[test]
    fn test_rebuild_groups_by_parent() {
        let items = [content(1, 10), content(2, 20), content(3, 10)];
        let index = SecondaryIndex::rebuild(items.iter(), |c| c.module_id);
        assert_eq!(index.children(10), &[1, 3]);
        assert_eq!(index.children(20), &[2]);
    }
}
