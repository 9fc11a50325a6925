//! # admitq
//!
//! In-memory admission control for named work items.
//!
//! Producers [`add`](queue::EnhancedQueue::add) keys with a priority; consumers
//! pop the best one into a bounded set of processing slots and
//! [`release`](queue::EnhancedQueue::release) it when the work finishes. The
//! slot ceiling (the processing window) can be changed at runtime. Nothing is
//! persisted and no work is executed here.
//!
//! ```
//! use admitq::queue::EnhancedQueue;
//! use chrono::Utc;
//!
//! let queue = EnhancedQueue::new(1);
//! queue.add("k1", 1, Utc::now());
//! queue.add("k2", 2, Utc::now());
//!
//! assert_eq!(queue.pop_pending().as_deref(), Some("k2"));
//! assert_eq!(queue.pop_pending(), None); // window full
//!
//! queue.release("k2");
//! assert_eq!(queue.pop_pending().as_deref(), Some("k1"));
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod queue;
pub mod scenario;
pub mod telemetry;

pub use model::{AddOutcome, Item, KeyState, QueueStats};
pub use queue::{EnhancedQueue, QueueGuard, QueueState};
