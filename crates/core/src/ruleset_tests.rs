// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;

fn sample_rules() -> Vec<SyncRule> {
    vec![
        SyncRule::new("devices/lamp1/power", "home/lamp1/set", Direction::BusToStore),
        SyncRule::new("rooms/1/temp", "home/rooms/1/temp", Direction::StoreToBus),
        SyncRule::new("sensors/temp/value", "home/temp", Direction::BusToStore).with_promote(true),
        SyncRule::new("rooms/2/temp", "home/rooms/1/temp", Direction::StoreToBus),
    ]
}

#[test]
fn test_references_are_stored_trimmed() {
    let set = RuleSet::new(vec![SyncRule::new(
        " sensors/temp/value\t",
        "home/temp",
        Direction::BusToStore,
    )]);
    assert_eq!(set.get(0).unwrap().source_reference, "sensors/temp/value");

    let index = set.push(SyncRule::new("  rooms/1/temp", "t", Direction::StoreToBus));
    assert_eq!(set.get(index).unwrap().source_reference, "rooms/1/temp");
    assert!(set
        .find_by_reference("rooms/1/temp", Direction::StoreToBus)
        .is_some());
}

#[test]
fn test_load_trims_references() {
    let temp = TempDir::new().unwrap();
    let file = RuleFile::new(temp.path().join("rules.json"));
    file.save(&[SyncRule::new(" a/b/c ", "t", Direction::BusToStore)])
        .unwrap();

    let set = RuleSet::load(file).unwrap();
    assert_eq!(set.get(0).unwrap().source_reference, "a/b/c");
}

#[test]
fn test_snapshot_direction_filters_and_keeps_indices() {
    let set = RuleSet::new(sample_rules());

    let inbound = set.snapshot_direction(Direction::BusToStore);
    assert_eq!(inbound.len(), 2);
    assert_eq!(inbound[0].0, 0);
    assert_eq!(inbound[1].0, 2);

    let outbound = set.snapshot_direction(Direction::StoreToBus);
    assert_eq!(outbound.len(), 2);
    assert_eq!(outbound[0].1.source_reference, "rooms/1/temp");
}

#[test]
fn test_find_by_topic_respects_direction() {
    let set = RuleSet::new(sample_rules());

    let (index, rule) = set.find_by_topic("home/lamp1/set", Direction::BusToStore).unwrap();
    assert_eq!(index, 0);
    assert_eq!(rule.source_reference, "devices/lamp1/power");

    assert!(set.find_by_topic("home/lamp1/set", Direction::StoreToBus).is_none());
    assert!(set.find_by_topic("home/unknown", Direction::BusToStore).is_none());
}

#[test]
fn test_find_by_reference_returns_first_match() {
    let set = RuleSet::new(sample_rules());
    let (index, rule) = set
        .find_by_reference("rooms/1/temp", Direction::StoreToBus)
        .unwrap();
    assert_eq!(index, 1);
    assert_eq!(rule.topic, "home/rooms/1/temp");
}

#[test]
fn test_topics_are_distinct_and_ordered() {
    let set = RuleSet::new(sample_rules());
    assert_eq!(
        set.topics(Direction::BusToStore),
        vec!["home/lamp1/set".to_string(), "home/temp".to_string()]
    );
    assert_eq!(
        set.topics(Direction::StoreToBus),
        vec!["home/rooms/1/temp".to_string()]
    );
}

#[test]
fn test_clones_share_the_same_list() {
    let set = RuleSet::new(Vec::new());
    let other = set.clone();

    let index = other.push(SyncRule::new("a/b/c", "t", Direction::BusToStore));

    assert_eq!(index, 0);
    assert_eq!(set.len(), 1);
    assert!(!set.is_empty());
}

#[test]
fn test_rewrite_reference_updates_memory_and_file() {
    let dir = TempDir::new().unwrap();
    let file = RuleFile::new(dir.path().join("rules.json"));
    file.save(&sample_rules()).unwrap();

    let set = RuleSet::load(file.clone()).unwrap();
    let list = set
        .rewrite_reference(2, "sensors/temp/value/ab12cd34")
        .unwrap();

    assert_eq!(list[2].source_reference, "sensors/temp/value/ab12cd34");
    assert_eq!(
        set.get(2).unwrap().source_reference,
        "sensors/temp/value/ab12cd34"
    );

    let reloaded = file.load().unwrap();
    assert_eq!(reloaded[2].source_reference, "sensors/temp/value/ab12cd34");
    assert_eq!(reloaded.len(), 4);
}

#[test]
fn test_rewrite_reference_rejects_bad_index() {
    let set = RuleSet::new(sample_rules());
    assert!(matches!(
        set.rewrite_reference(9, "x"),
        Err(Error::RuleNotFound(9))
    ));
}

#[test]
fn test_detached_set_has_no_file() {
    let set = RuleSet::new(sample_rules());
    assert!(set.file().is_none());
}
