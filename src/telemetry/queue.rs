//! Admission span helpers.
//!
//! Provides span creation and state-transition recording for keys moving
//! through the queue.

use tracing::Span;

use crate::model::KeyState;

/// Start a span around one admission attempt.
///
/// `queue.key` is empty for `pop_pending`, where the key is not known until
/// the heap has been consulted; `queue.admitted` is filled in afterwards.
pub fn start_admission_span(key: Option<&str>, dry_run: bool) -> Span {
    let span = tracing::debug_span!(
        "queue.admit",
        "queue.key" = tracing::field::Empty,
        "queue.dry_run" = dry_run,
        "queue.admitted" = tracing::field::Empty,
    );
    if let Some(key) = key {
        span.record("queue.key", key);
    }
    span
}

/// Record the admission result on a span from [`start_admission_span`].
pub fn record_admission(span: &Span, admitted: Option<&str>) {
    span.record("queue.admitted", admitted.unwrap_or(""));
}

/// Emit a state transition event for a key.
pub fn record_state_transition(key: &str, from: KeyState, to: KeyState) {
    debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
    tracing::debug!(key, %from, %to, "state_transition");
}
