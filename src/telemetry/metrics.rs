//! Metric instrument factories for admitq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider every instrument is a no-op.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Meter, UpDownCounter};

/// Returns the shared meter for admitq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("admitq")
}

/// Counter: keys added to the backlog.
/// Labels: `outcome` ("inserted" | "updated" | "ignored").
pub fn items_added() -> Counter<u64> {
    meter()
        .u64_counter("admitq.items.added")
        .with_description("Number of add calls by outcome")
        .build()
}

/// Counter: keys promoted from pending to processing.
pub fn promotions() -> Counter<u64> {
    meter()
        .u64_counter("admitq.promotions")
        .with_description("Number of keys admitted to a processing slot")
        .build()
}

/// Counter: admission attempts that returned nothing.
/// Labels: `reason` ("window_full" | "empty" | "not_pending").
pub fn admission_rejected() -> Counter<u64> {
    meter()
        .u64_counter("admitq.admission.rejected")
        .with_description("Number of admission attempts that admitted nothing")
        .build()
}

/// Counter: keys released from processing.
pub fn releases() -> Counter<u64> {
    meter()
        .u64_counter("admitq.releases")
        .with_description("Number of processing slots released")
        .build()
}

/// Up-down counter: processing slots in use.
pub fn slots_in_use() -> UpDownCounter<i64> {
    meter()
        .i64_up_down_counter("admitq.slots.in_use")
        .with_description("Processing slots currently held")
        .build()
}

/// Why an admission attempt admitted nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    WindowFull,
    Empty,
    NotPending,
}

impl Rejection {
    fn as_str(self) -> &'static str {
        match self {
            Rejection::WindowFull => "window_full",
            Rejection::Empty => "empty",
            Rejection::NotPending => "not_pending",
        }
    }
}

/// Instruments held by a queue, built once at construction.
#[derive(Clone)]
pub struct QueueMetrics {
    added: Counter<u64>,
    promotions: Counter<u64>,
    rejected: Counter<u64>,
    releases: Counter<u64>,
    in_use: UpDownCounter<i64>,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self {
            added: items_added(),
            promotions: promotions(),
            rejected: admission_rejected(),
            releases: releases(),
            in_use: slots_in_use(),
        }
    }

    pub fn added(&self, outcome: &'static str) {
        self.added.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn promoted(&self) {
        self.promotions.add(1, &[]);
        self.in_use.add(1, &[]);
    }

    pub fn rejected(&self, reason: Rejection) {
        self.rejected
            .add(1, &[KeyValue::new("reason", reason.as_str())]);
    }

    pub fn released(&self) {
        self.releases.add(1, &[]);
        self.in_use.add(-1, &[]);
    }
}

impl Default for QueueMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueueMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueMetrics").finish_non_exhaustive()
    }
}
