//! Concurrent producers and consumers against one shared queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use admitq::queue::EnhancedQueue;
use chrono::Utc;

#[test]
fn concurrent_pops_never_exceed_window() {
    const WINDOW: i64 = 4;
    const ITEMS: usize = 400;
    const CONSUMERS: usize = 8;

    let queue = Arc::new(EnhancedQueue::new(WINDOW));
    for i in 0..ITEMS {
        queue.add(format!("item-{i}"), (i % 7) as i64, Utc::now());
    }

    let completed = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let completed = Arc::clone(&completed);
            thread::spawn(move || {
                let mut mine = Vec::new();
                while completed.load(Ordering::SeqCst) < ITEMS {
                    let Some(key) = queue.pop_pending() else {
                        thread::yield_now();
                        continue;
                    };
                    {
                        let state = queue.lock();
                        assert!(state.processing_len() as i64 <= state.window());
                        assert!(!state.in_pending(&key));
                    }
                    mine.push(key.clone());
                    assert!(queue.release(&key));
                    completed.fetch_add(1, Ordering::SeqCst);
                }
                mine
            })
        })
        .collect();

    let mut seen: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().expect("consumer panicked"))
        .collect();
    seen.sort();
    seen.dedup();

    assert_eq!(seen.len(), ITEMS, "every item admitted exactly once");
    assert_eq!(queue.pending_len(), 0);
    assert_eq!(queue.processing_len(), 0);
}

#[test]
fn concurrent_adds_of_same_key_leave_one_entry() {
    let queue = Arc::new(EnhancedQueue::new(1));
    let handles: Vec<_> = (0..8)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for _ in 0..100 {
                    queue.add("shared", p, Utc::now());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("producer panicked");
    }

    assert_eq!(queue.pending_len(), 1);
    assert_eq!(queue.pop_pending().as_deref(), Some("shared"));
    assert_eq!(queue.pop_pending(), None);
}
