//! Keyed priority backlog.
//!
//! A binary max-heap over [`Item`]s with a `key -> slot` index kept in sync on
//! every swap, so a key can be updated or removed in O(log n) without
//! rebuilding the heap.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::Item;

/// Result of [`PendingIndex::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

#[derive(Debug, Default)]
pub struct PendingIndex {
    heap: Vec<Item>,
    slots: HashMap<String, usize>,
    next_seq: u64,
}

impl PendingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, or re-rank it in place if it is already present.
    pub fn upsert(
        &mut self,
        key: impl Into<String>,
        priority: i64,
        enqueued_at: DateTime<Utc>,
    ) -> Upsert {
        let key = key.into();
        if let Some(&slot) = self.slots.get(&key) {
            let item = &mut self.heap[slot];
            item.priority = priority;
            item.enqueued_at = enqueued_at;
            self.restore(slot);
            return Upsert::Updated;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = self.heap.len();
        self.slots.insert(key.clone(), slot);
        self.heap.push(Item {
            key,
            priority,
            enqueued_at,
            seq,
        });
        self.sift_up(slot);
        Upsert::Inserted
    }

    pub fn get(&self, key: &str) -> Option<&Item> {
        self.slots.get(key).map(|&slot| &self.heap[slot])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Remove an arbitrary key.
    pub fn remove(&mut self, key: &str) -> Option<Item> {
        let slot = self.slots.remove(key)?;
        let last = self.heap.len() - 1;
        if slot != last {
            self.heap.swap(slot, last);
            self.slots.insert(self.heap[slot].key.clone(), slot);
        }
        let item = self.heap.pop()?;
        if slot < self.heap.len() {
            self.restore(slot);
        }
        Some(item)
    }

    /// The item that would be admitted next.
    pub fn peek_max(&self) -> Option<&Item> {
        self.heap.first()
    }

    pub fn pop_max(&mut self) -> Option<Item> {
        let key = self.heap.first()?.key.clone();
        self.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// All items in admission order. Does not disturb the heap.
    pub fn iter_ordered(&self) -> Vec<&Item> {
        let mut items: Vec<&Item> = self.heap.iter().collect();
        items.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.enqueued_at.cmp(&b.enqueued_at))
                .then(a.seq.cmp(&b.seq))
        });
        items
    }

    fn restore(&mut self, slot: usize) {
        if !self.sift_up(slot) {
            self.sift_down(slot);
        }
    }

    /// Returns whether the item moved.
    fn sift_up(&mut self, mut slot: usize) -> bool {
        let start = slot;
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.heap[slot].outranks(&self.heap[parent]) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot != start
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut best = slot;
            if left < len && self.heap[left].outranks(&self.heap[best]) {
                best = left;
            }
            if right < len && self.heap[right].outranks(&self.heap[best]) {
                best = right;
            }
            if best == slot {
                break;
            }
            self.swap(slot, best);
            slot = best;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots.insert(self.heap[a].key.clone(), a);
        self.slots.insert(self.heap[b].key.clone(), b);
    }
}
