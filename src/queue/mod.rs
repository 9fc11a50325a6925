//! Admission queue: a priority backlog feeding a bounded set of processing slots.
//!
//! [`EnhancedQueue`] is the thread-safe entry point. The backlog, the
//! processing set and the window live together in one [`QueueState`] behind a
//! single mutex, and every method holds it for its full duration, so "is there
//! a free slot, and if so take the best item" never interleaves with another
//! caller.
//!
//! Callers that need several decisions inside one critical section (probe a
//! few candidate keys, then commit one) take the lock with
//! [`EnhancedQueue::lock`] and call the [`QueueState`] methods on the guard.
//! Holding the guard is what makes those calls safe; there is no separate
//! "unlocked" entry point on `EnhancedQueue` itself.
//!
//! Empty results are not errors. `None` from a pop means "nothing to admit
//! right now" (window saturated, backlog empty, or key not pending) and the
//! caller should retry later.

pub mod pending;
pub mod processing;

pub use pending::{PendingIndex, Upsert};
pub use processing::ProcessingSet;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::model::{AddOutcome, Item, KeyState, QueueStats};
use crate::telemetry::metrics::{QueueMetrics, Rejection};
use crate::telemetry::queue::{record_admission, record_state_transition, start_admission_span};

/// Exclusive access to a queue's state, from [`EnhancedQueue::lock`].
pub type QueueGuard<'a> = MutexGuard<'a, QueueState>;

// ---------------------------------------------------------------------------
// QueueState
// ---------------------------------------------------------------------------

/// The unsynchronized core. Owns both collections and the window.
///
/// Reached through a [`QueueGuard`] when shared, or used directly when the
/// caller already owns it exclusively.
#[derive(Debug)]
pub struct QueueState {
    pending: PendingIndex,
    processing: ProcessingSet,
    window: i64,
    rejected: u64,
    metrics: QueueMetrics,
}

impl QueueState {
    /// Negative windows are clamped to zero.
    pub fn new(window: i64) -> Self {
        Self {
            pending: PendingIndex::new(),
            processing: ProcessingSet::new(),
            window: window.max(0),
            rejected: 0,
            metrics: QueueMetrics::new(),
        }
    }

    /// Queue a key, or re-rank it if it is already pending.
    ///
    /// A key that holds a processing slot is left alone: re-adding it must
    /// not put a running item back in the backlog.
    pub fn add(
        &mut self,
        key: impl Into<String>,
        priority: i64,
        enqueued_at: DateTime<Utc>,
    ) -> AddOutcome {
        let key = key.into();
        if self.processing.contains(&key) {
            debug!(key = key.as_str(), priority, "add ignored, key is processing");
            self.metrics.added("ignored");
            return AddOutcome::Ignored;
        }

        let outcome = match self.pending.upsert(key.as_str(), priority, enqueued_at) {
            Upsert::Inserted => {
                record_state_transition(&key, KeyState::NotQueued, KeyState::Pending);
                AddOutcome::Inserted
            }
            Upsert::Updated => {
                record_state_transition(&key, KeyState::Pending, KeyState::Pending);
                AddOutcome::Updated
            }
        };
        debug!(key = key.as_str(), priority, %enqueued_at, ?outcome, "added");
        self.metrics.added(match outcome {
            AddOutcome::Inserted => "inserted",
            _ => "updated",
        });
        outcome
    }

    /// Admit the highest-ranked pending key.
    ///
    /// With `dry_run` the same checks run but nothing moves, so repeated
    /// probes return the same answer.
    pub fn pop_pending(&mut self, dry_run: bool) -> Option<String> {
        if !self.has_capacity() {
            self.reject(Rejection::WindowFull, dry_run);
            return None;
        }
        let Some(key) = self.pending.peek_max().map(|item| item.key.clone()) else {
            self.reject(Rejection::Empty, dry_run);
            return None;
        };
        if !dry_run {
            self.promote(&key);
        }
        Some(key)
    }

    /// Admit a specific pending key, regardless of its rank.
    ///
    /// Same window check as [`pop_pending`](Self::pop_pending). Returns `None`
    /// if the window is full or the key is not pending.
    pub fn pop_pending_key(&mut self, key: &str, dry_run: bool) -> Option<String> {
        if !self.has_capacity() {
            self.reject(Rejection::WindowFull, dry_run);
            return None;
        }
        if !self.pending.contains(key) {
            self.reject(Rejection::NotPending, dry_run);
            return None;
        }
        if !dry_run {
            self.promote(key);
        }
        Some(key.to_string())
    }

    /// Free the slot held by `key`. Idempotent; returns whether the key was
    /// processing.
    pub fn release(&mut self, key: &str) -> bool {
        if !self.processing.remove(key) {
            return false;
        }
        record_state_transition(key, KeyState::Processing, KeyState::NotQueued);
        self.metrics.released();
        info!(
            key,
            processing = self.processing.len(),
            window = self.window,
            "released"
        );
        true
    }

    /// Drop a key from the backlog without admitting it.
    pub fn remove_pending(&mut self, key: &str) -> Option<Item> {
        let item = self.pending.remove(key)?;
        record_state_transition(key, KeyState::Pending, KeyState::NotQueued);
        debug!(key, "removed from backlog");
        Some(item)
    }

    /// Change the ceiling for future admissions. Keys already processing are
    /// never evicted, even when the new window is below their count.
    pub fn set_window(&mut self, window: i64) {
        let window = window.max(0);
        let previous = std::mem::replace(&mut self.window, window);
        info!(
            previous,
            window,
            processing = self.processing.len(),
            "processing window changed"
        );
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    /// Is there a free slot right now?
    pub fn has_capacity(&self) -> bool {
        self.processing_count() < self.window
    }

    /// Would [`pop_pending`](Self::pop_pending) admit something right now?
    pub fn can_admit(&self) -> bool {
        self.has_capacity() && !self.pending.is_empty()
    }

    pub fn in_pending(&self, key: &str) -> bool {
        self.pending.contains(key)
    }

    pub fn in_processing(&self, key: &str) -> bool {
        self.processing.contains(key)
    }

    pub fn in_queue(&self, key: &str) -> bool {
        self.in_pending(key) || self.in_processing(key)
    }

    pub fn state_of(&self, key: &str) -> KeyState {
        if self.processing.contains(key) {
            KeyState::Processing
        } else if self.pending.contains(key) {
            KeyState::Pending
        } else {
            KeyState::NotQueued
        }
    }

    pub fn pending_item(&self, key: &str) -> Option<&Item> {
        self.pending.get(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn processing_len(&self) -> usize {
        self.processing.len()
    }

    /// Backlog keys in the order they would be admitted.
    pub fn pending_keys(&self) -> Vec<String> {
        self.pending
            .iter_ordered()
            .into_iter()
            .map(|item| item.key.clone())
            .collect()
    }

    pub fn processing_keys(&self) -> Vec<String> {
        self.processing.keys()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.pending.len(),
            processing: self.processing.len(),
            window: self.window,
            available: (self.window - self.processing_count()).max(0),
            rejected: self.rejected,
        }
    }

    fn processing_count(&self) -> i64 {
        i64::try_from(self.processing.len()).unwrap_or(i64::MAX)
    }

    fn promote(&mut self, key: &str) {
        let Some(item) = self.pending.remove(key) else {
            return;
        };
        self.processing.insert(item.key);
        record_state_transition(key, KeyState::Pending, KeyState::Processing);
        self.metrics.promoted();
        info!(
            key,
            priority = item.priority,
            processing = self.processing.len(),
            window = self.window,
            "admitted"
        );
    }

    fn reject(&mut self, reason: Rejection, dry_run: bool) {
        if !dry_run {
            self.rejected += 1;
            self.metrics.rejected(reason);
        }
    }
}

impl Default for QueueState {
    /// A state with a zero window: nothing is admitted until it is raised.
    fn default() -> Self {
        Self::new(0)
    }
}

// ---------------------------------------------------------------------------
// EnhancedQueue
// ---------------------------------------------------------------------------

/// Thread-safe admission queue. Share it behind an `Arc`.
#[derive(Debug)]
pub struct EnhancedQueue {
    state: Mutex<QueueState>,
}

impl EnhancedQueue {
    pub fn new(initial_window: i64) -> Self {
        Self {
            state: Mutex::new(QueueState::new(initial_window)),
        }
    }

    /// Take the queue lock for a multi-step transaction.
    ///
    /// Do not call other `EnhancedQueue` methods while the guard is alive;
    /// the mutex is not reentrant.
    pub fn lock(&self) -> QueueGuard<'_> {
        self.state.lock()
    }

    pub fn add(
        &self,
        key: impl Into<String>,
        priority: i64,
        enqueued_at: DateTime<Utc>,
    ) -> AddOutcome {
        self.state.lock().add(key, priority, enqueued_at)
    }

    pub fn in_pending(&self, key: &str) -> bool {
        self.state.lock().in_pending(key)
    }

    pub fn in_processing(&self, key: &str) -> bool {
        self.state.lock().in_processing(key)
    }

    pub fn in_queue(&self, key: &str) -> bool {
        self.state.lock().in_queue(key)
    }

    pub fn state_of(&self, key: &str) -> KeyState {
        self.state.lock().state_of(key)
    }

    /// Admit the highest-ranked pending key if a slot is free.
    pub fn pop_pending(&self) -> Option<String> {
        let span = start_admission_span(None, false);
        let _entered = span.enter();
        let admitted = self.state.lock().pop_pending(false);
        record_admission(&span, admitted.as_deref());
        admitted
    }

    /// Like [`pop_pending`](Self::pop_pending), but a full window or an empty
    /// backlog is not counted as a rejected admission. For polling loops that
    /// call it until it returns `None`.
    pub fn admit_next(&self) -> Option<String> {
        let mut state = self.state.lock();
        if !state.can_admit() {
            return None;
        }
        let span = start_admission_span(None, false);
        let _entered = span.enter();
        let admitted = state.pop_pending(false);
        record_admission(&span, admitted.as_deref());
        admitted
    }

    /// Admit `key` if it is pending and a slot is free.
    pub fn pop_pending_key(&self, key: &str) -> Option<String> {
        let span = start_admission_span(Some(key), false);
        let _entered = span.enter();
        let admitted = self.state.lock().pop_pending_key(key, false);
        record_admission(&span, admitted.as_deref());
        admitted
    }

    /// Free the slot held by `key`. Returns false if it was not processing.
    pub fn release(&self, key: &str) -> bool {
        self.state.lock().release(key)
    }

    /// Cancel a pending key.
    pub fn remove_pending(&self, key: &str) -> Option<Item> {
        self.state.lock().remove_pending(key)
    }

    pub fn set_processing_window(&self, window: i64) {
        self.state.lock().set_window(window);
    }

    pub fn processing_window(&self) -> i64 {
        self.state.lock().window()
    }

    pub fn has_capacity(&self) -> bool {
        self.state.lock().has_capacity()
    }

    pub fn pending_item(&self, key: &str) -> Option<Item> {
        self.state.lock().pending_item(key).cloned()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending_len()
    }

    pub fn processing_len(&self) -> usize {
        self.state.lock().processing_len()
    }

    pub fn pending_keys(&self) -> Vec<String> {
        self.state.lock().pending_keys()
    }

    pub fn processing_keys(&self) -> Vec<String> {
        self.state.lock().processing_keys()
    }

    pub fn stats(&self) -> QueueStats {
        self.state.lock().stats()
    }
}
