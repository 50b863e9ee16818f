//! Time-ordered run queue.
//!
//! Maps task ids to their next eligible unix time. A `BTreeSet` index keeps
//! entries totally ordered by `(time, id)` so ties resolve by id and every
//! ordered walk is reproducible.

use std::collections::{BTreeSet, HashMap};

use crate::util::clock::UnixTime;

/// Queue of tasks waiting for their next run.
#[derive(Debug, Default, Clone)]
pub struct RunQueue {
    entries: HashMap<String, UnixTime>,
    order: BTreeSet<(UnixTime, String)>,
}

impl RunQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `id` is tracked.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Queued time for `id`.
    pub fn get(&self, id: &str) -> Option<UnixTime> {
        self.entries.get(id).copied()
    }

    /// Track `id` at `at` unless it is already queued.
    ///
    /// Returns `false` when an entry already existed; the existing time is kept.
    pub fn insert(&mut self, id: &str, at: UnixTime) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.to_owned(), at);
        self.order.insert((at, id.to_owned()));
        true
    }

    /// Push `id` back by `delay` seconds. Untracked ids are ignored.
    ///
    /// Returns the new queued time.
    pub fn defer(&mut self, id: &str, delay: i64) -> Option<UnixTime> {
        let slot = self.entries.get_mut(id)?;
        let old = *slot;
        let new = old.saturating_add(delay);
        *slot = new;
        self.order.remove(&(old, id.to_owned()));
        self.order.insert((new, id.to_owned()));
        Some(new)
    }

    /// Stop tracking `id`, returning its queued time.
    pub fn remove(&mut self, id: &str) -> Option<UnixTime> {
        let at = self.entries.remove(id)?;
        self.order.remove(&(at, id.to_owned()));
        Some(at)
    }

    /// Earliest entry.
    pub fn earliest(&self) -> Option<(&str, UnixTime)> {
        self.order.first().map(|(at, id)| (id.as_str(), *at))
    }

    /// Entries in ascending `(time, id)` order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, UnixTime)> + '_ {
        self.order.iter().map(|(at, id)| (id.as_str(), *at))
    }

    /// Owned copy of the ordered entries, for walks that mutate the queue.
    pub fn ordered(&self) -> Vec<(String, UnixTime)> {
        self.order.iter().map(|(at, id)| (id.clone(), *at)).collect()
    }
}
