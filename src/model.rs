//! Core data model.
//!
//! An item is a named unit of work waiting for an execution slot. It has
//! identity (the key), a priority, and the time it was enqueued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A backlog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Opaque identity (e.g. a pipeline id).
    pub key: String,

    /// Higher = admitted sooner.
    pub priority: i64,

    /// Earlier wins among equal priorities.
    pub enqueued_at: DateTime<Utc>,

    /// Insertion sequence, assigned on first insert and kept across updates.
    /// Last-resort tie-break so ordering is deterministic. Owned by the
    /// backlog, so it is neither settable by callers nor serialized.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl Item {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Does `self` go before `other` in admission order?
    pub fn outranks(&self, other: &Item) -> bool {
        (other.priority, self.enqueued_at, self.seq) < (self.priority, other.enqueued_at, other.seq)
    }
}

// ---------------------------------------------------------------------------
// Key state
// ---------------------------------------------------------------------------

/// Where a key currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// Not known to the queue.
    NotQueued,
    /// Waiting in the backlog for a slot.
    Pending,
    /// Holding a slot.
    Processing,
}

impl KeyState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: KeyState) -> bool {
        use KeyState::*;
        matches!(
            (self, to),
            (NotQueued, Pending)
                | (Pending, Pending)       // priority update
                | (Pending, Processing)
                | (Pending, NotQueued)     // cancelled
                | (Processing, NotQueued) // released
        )
    }
}

impl std::fmt::Display for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KeyState::NotQueued => "not_queued",
            KeyState::Pending => "pending",
            KeyState::Processing => "processing",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What `add` did with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    /// New backlog entry.
    Inserted,
    /// Existing backlog entry re-prioritized in place.
    Updated,
    /// Key already holds a slot; nothing changed.
    Ignored,
}

/// Point-in-time counters for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub window: i64,
    /// Free slots; zero when the window is saturated or was lowered below
    /// the processing count.
    pub available: i64,
    /// Admission attempts that admitted nothing. Dry runs are not counted.
    pub rejected: u64,
}
