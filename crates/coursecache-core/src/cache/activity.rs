//! Bounded, most-recent-first log of user activity.

use std::collections::VecDeque;

use chrono::Utc;

use crate::config::DEFAULT_ACTIVITY_CAPACITY;
use crate::models::{ActivityAction, ActivityKind, ActivityRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLog {
    entries: VecDeque<ActivityRecord>,
    capacity: usize,
    next_id: i64,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    /// A log holding at most `capacity` entries, never fewer than one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a new entry timestamped now and return it.
    pub fn record(
        &mut self,
        kind: ActivityKind,
        action: ActivityAction,
        item_id: i64,
        item_name: impl Into<String>,
        course_id: Option<i64>,
        course_name: Option<String>,
    ) -> &ActivityRecord {
        let record = ActivityRecord {
            id: self.next_id,
            kind,
            action,
            item_id,
            course_id,
            timestamp: Utc::now(),
            item_name: item_name.into(),
            course_name,
        };
        self.next_id += 1;
        self.push(record)
    }

    /// Prepend an entry, dropping the oldest beyond capacity.
    pub fn push(&mut self, record: ActivityRecord) -> &ActivityRecord {
        self.entries.push_front(record);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Replace the whole log with a server-provided list (most recent first).
    pub fn replace(&mut self, records: Vec<ActivityRecord>) {
        self.entries = records.into_iter().take(self.capacity).collect();
        if let Some(max) = self.entries.iter().map(|r| r.id).max() {
            self.next_id = self.next_id.max(max + 1);
        }
    }

    pub fn latest(&self) -> Option<&ActivityRecord> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_course(&self, course_id: i64) -> Vec<&ActivityRecord> {
        self.entries
            .iter()
            .filter(|r| r.course_id == Some(course_id))
            .collect()
    }

    /// Distinct course ids in order of most recent activity.
    pub fn recent_course_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for id in self.entries.iter().filter_map(|r| r.course_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}
