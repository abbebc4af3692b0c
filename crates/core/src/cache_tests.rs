// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::sync::Arc;

#[test]
fn test_first_observation_publishes() {
    let cache = ChangeCache::new();
    assert!(cache.is_empty());
    assert!(cache.should_publish("rooms/1/temp", "21"));
    assert_eq!(cache.get("rooms/1/temp").as_deref(), Some("21"));
}

#[test]
fn test_repeat_value_is_suppressed() {
    let cache = ChangeCache::new();
    assert!(cache.should_publish("rooms/1/temp", "21"));
    assert!(!cache.should_publish("rooms/1/temp", "21"));
    assert!(!cache.should_publish("rooms/1/temp", "21"));
}

#[test]
fn test_changed_value_publishes_again() {
    let cache = ChangeCache::new();
    assert!(cache.should_publish("rooms/1/temp", "21"));
    assert!(!cache.should_publish("rooms/1/temp", "21"));
    assert!(cache.should_publish("rooms/1/temp", "22"));
    assert_eq!(cache.get("rooms/1/temp").as_deref(), Some("22"));
    assert!(cache.should_publish("rooms/1/temp", "21"));
}

#[test]
fn test_forget_reopens_the_gate() {
    let cache = ChangeCache::new();
    assert!(cache.should_publish("rooms/1/temp", "21"));
    cache.forget("rooms/1/temp", "21");
    assert_eq!(cache.get("rooms/1/temp"), None);
    assert!(cache.should_publish("rooms/1/temp", "21"));
}

#[test]
fn test_forget_keeps_a_newer_value() {
    let cache = ChangeCache::new();
    assert!(cache.should_publish("rooms/1/temp", "22"));
    cache.forget("rooms/1/temp", "21");
    assert_eq!(cache.get("rooms/1/temp").as_deref(), Some("22"));
}

#[test]
fn test_paths_are_tracked_independently() {
    let cache = ChangeCache::new();
    assert!(cache.should_publish("rooms/1/temp", "21"));
    assert!(cache.should_publish("rooms/2/temp", "21"));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_cache_tolerates_concurrent_readers() {
    let cache = Arc::new(ChangeCache::new());
    cache.should_publish("a", "1");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.get("a"))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().as_deref(), Some("1"));
    }
}

#[test]
fn test_next_index_after_increments() {
    let tracker = PromotionTracker::new();
    for n in 1..=5u64 {
        assert_eq!(tracker.increment("sensors/temp/value/x"), n);
        assert_eq!(tracker.next_index("sensors/temp/value/x"), n - 1);
    }
}

#[test]
fn test_next_index_never_negative() {
    let tracker = PromotionTracker::new();
    assert_eq!(tracker.next_index("unknown"), 0);
    tracker.set("p", 0);
    assert_eq!(tracker.next_index("p"), 0);
}

#[test]
fn test_set_then_increment_continues_from_hydrated_count() {
    let tracker = PromotionTracker::new();
    assert!(!tracker.contains("p"));
    tracker.set("p", 3);
    assert!(tracker.contains("p"));
    assert_eq!(tracker.increment("p"), 4);
    assert_eq!(tracker.next_index("p"), 3);
}

#[test]
fn test_revert_undoes_increment() {
    let tracker = PromotionTracker::new();
    tracker.set("p", 1);
    tracker.increment("p");
    tracker.revert("p");
    assert_eq!(tracker.get("p"), Some(1));

    tracker.revert("missing");
    assert_eq!(tracker.get("missing"), None);
}
