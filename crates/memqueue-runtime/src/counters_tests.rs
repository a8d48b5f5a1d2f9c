//! Tests for counters.

use super::*;
use std::sync::Arc;

#[test]
fn test_queue_counter_name_format() {
    assert_eq!(
        queue_counter_name("orders", SENT_MESSAGES),
        "queue.orders.sentmessages"
    );
    assert_eq!(
        queue_counter_name("orders", RECEIVED_MESSAGES),
        "queue.orders.receivedmessages"
    );
    assert_eq!(
        queue_counter_name("orders", DEAD_MESSAGES),
        "queue.orders.deadmessages"
    );
}

#[test]
fn test_cached_counters_accumulate() {
    let counters = CachedCounters::new();
    counters.increment_one("a");
    counters.increment_one("a");
    counters.increment("b", 5);

    assert_eq!(counters.get("a"), 2);
    assert_eq!(counters.get("b"), 5);
    assert_eq!(counters.get("missing"), 0);

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn test_cached_counters_saturate() {
    let counters = CachedCounters::new();
    counters.increment("big", u64::MAX);
    counters.increment_one("big");
    assert_eq!(counters.get("big"), u64::MAX);
}

#[test]
fn test_cached_counters_clear() {
    let counters = CachedCounters::new();
    counters.increment_one("a");
    counters.clear();
    assert_eq!(counters.get("a"), 0);
    assert!(counters.snapshot().is_empty());
}

#[test]
fn test_null_counters_accept_updates() {
    let counters: Arc<dyn Counters> = Arc::new(NullCounters);
    counters.increment_one("anything");
    counters.increment("anything", 10);
}

#[test]
fn test_cached_counters_shared_between_threads() {
    let counters = Arc::new(CachedCounters::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let counters = Arc::clone(&counters);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    counters.increment_one("shared");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counters.get("shared"), 400);
}
