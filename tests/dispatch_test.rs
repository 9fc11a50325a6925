//! Integration tests for the async dispatch loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use admitq::dispatch::{DispatchConfig, Dispatcher};
use admitq::queue::EnhancedQueue;
use chrono::{DateTime, TimeDelta, Utc};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::default() + TimeDelta::seconds(secs)
}

fn fast() -> DispatchConfig {
    DispatchConfig {
        poll_interval: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn drain_runs_everything_in_priority_order_with_window_one() {
    let queue = Arc::new(EnhancedQueue::new(1));
    queue.add("low", 1, at(0));
    queue.add("high", 9, at(1));
    queue.add("mid", 5, at(2));

    let dispatcher = Dispatcher::new(Arc::clone(&queue), fast());
    let admitted = dispatcher
        .drain(|_key| async { tokio::time::sleep(Duration::from_millis(5)).await })
        .await;

    assert_eq!(admitted, ["high", "mid", "low"]);
    assert_eq!(queue.pending_len(), 0);
    assert_eq!(queue.processing_len(), 0);
}

#[tokio::test]
async fn drain_never_runs_more_than_window_at_once() {
    let queue = Arc::new(EnhancedQueue::new(3));
    for i in 0..12 {
        queue.add(format!("k{i}"), 0, at(i));
    }

    let in_flight = Arc::new(AtomicI64::new(0));
    let peak = Arc::new(AtomicI64::new(0));
    let dispatcher = Dispatcher::new(Arc::clone(&queue), fast());
    let admitted = {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        dispatcher
            .drain(move |_key| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await
    };

    assert_eq!(admitted.len(), 12);
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn panicking_executor_still_releases_its_slot() {
    let queue = Arc::new(EnhancedQueue::new(1));
    queue.add("boom", 2, at(0));
    queue.add("after", 1, at(1));

    let dispatcher = Dispatcher::new(Arc::clone(&queue), fast());
    let admitted = dispatcher
        .drain(|key| async move {
            if key == "boom" {
                panic!("executor failure");
            }
        })
        .await;

    assert_eq!(admitted, ["boom", "after"]);
    assert_eq!(queue.processing_len(), 0);
}

#[tokio::test]
async fn run_picks_up_late_additions_until_shutdown() {
    let queue = Arc::new(EnhancedQueue::new(2));
    let dispatcher = Dispatcher::new(Arc::clone(&queue), fast());
    let done = Arc::new(AtomicUsize::new(0));

    let handle = {
        let dispatcher = dispatcher.clone();
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            dispatcher
                .run(move |_key| {
                    let done = Arc::clone(&done);
                    async move {
                        done.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .await
        })
    };

    queue.add("late-1", 0, at(0));
    queue.add("late-2", 0, at(1));
    dispatcher.wake();

    for _ in 0..100 {
        if done.load(Ordering::SeqCst) == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    dispatcher.shutdown();

    let admitted = handle.await.expect("dispatcher task panicked");
    assert_eq!(admitted, ["late-1", "late-2"]);
    assert_eq!(done.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn idle_polling_is_not_counted_as_rejection() {
    let queue = Arc::new(EnhancedQueue::new(1));
    for i in 0..3 {
        queue.add(format!("k{i}"), 0, at(i));
    }

    let dispatcher = Dispatcher::new(Arc::clone(&queue), fast());
    let admitted = dispatcher
        .drain(|_key| async { tokio::time::sleep(Duration::from_millis(15)).await })
        .await;
    assert_eq!(admitted.len(), 3);

    let handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.run(|_key| async {}).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    dispatcher.shutdown();
    assert!(handle.await.expect("dispatcher task panicked").is_empty());

    assert_eq!(queue.stats().rejected, 0);
}
