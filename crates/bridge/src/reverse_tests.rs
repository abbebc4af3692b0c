// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use rb_core::{FileStore, MemoryStore};
use serde_json::json;
use tempfile::TempDir;
use yare::parameterized;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::supervisor::{BrokerCommand, ConnectionState, SharedConnectionState};

/// A stand-in supervisor: answers every publish and records the accepted ones.
struct Broker {
    handle: BrokerHandle,
    state: Arc<SharedConnectionState>,
    accepting: Arc<AtomicBool>,
    sent: mpsc::UnboundedReceiver<(String, String)>,
}

impl Broker {
    fn connected() -> Self {
        let state = Arc::new(SharedConnectionState::new());
        state.set(ConnectionState::Connected);
        let (tx, mut commands) = mpsc::unbounded_channel();
        let (sent_tx, sent) = mpsc::unbounded_channel();
        let accepting = Arc::new(AtomicBool::new(true));
        let accept = Arc::clone(&accepting);
        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                if let BrokerCommand::Publish {
                    topic,
                    payload,
                    done,
                } = command
                {
                    if accept.load(Ordering::SeqCst) {
                        let _ = sent_tx.send((topic, payload));
                        let _ = done.send(Ok(()));
                    } else {
                        let _ = done.send(Err(Error::NotConnected));
                    }
                }
            }
        });
        Broker {
            handle: BrokerHandle::new(tx, Arc::clone(&state)),
            state,
            accepting,
            sent,
        }
    }

    /// Publishes accepted so far, as (topic, payload).
    fn published(&mut self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        while let Ok(publish) = self.sent.try_recv() {
            out.push(publish);
        }
        out
    }

    async fn next_published(&mut self) -> (String, String) {
        tokio::time::timeout(Duration::from_secs(5), self.sent.recv())
            .await
            .unwrap()
            .unwrap()
    }
}

fn pub_(topic: &str, payload: &str) -> (String, String) {
    (topic.to_string(), payload.to_string())
}

fn temp_rule() -> SyncRule {
    SyncRule::new("rooms/1/temp", "home/rooms/1/temp", Direction::StoreToBus)
}

fn reverse(rules: Vec<SyncRule>, store: Arc<dyn DocumentStore>, broker: &Broker) -> ReverseSync {
    ReverseSync::new(RuleSet::new(rules), store, broker.handle.clone())
}

#[test]
fn test_select_strategy_memory() {
    let store = MemoryStore::new();
    assert_eq!(
        select_strategy(ReverseMode::Auto, &store).unwrap(),
        ReverseStrategy::Push
    );
    assert_eq!(
        select_strategy(ReverseMode::Poll, &store).unwrap(),
        ReverseStrategy::Poll
    );
    assert_eq!(
        select_strategy(ReverseMode::Push, &store).unwrap(),
        ReverseStrategy::Push
    );
}

#[test]
fn test_select_strategy_file() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::open(temp.path().join("store.json")).unwrap();
    assert_eq!(
        select_strategy(ReverseMode::Auto, &store).unwrap(),
        ReverseStrategy::Poll
    );
    let err = select_strategy(ReverseMode::Push, &store).unwrap_err();
    assert!(matches!(err, Error::PushUnsupported("file")));
}

#[tokio::test]
async fn test_poll_scenario() {
    let store = MemoryStore::new();
    store.write("rooms/1/temp", json!("21")).await.unwrap();
    let mut broker = Broker::connected();
    let sync = reverse(vec![temp_rule()], Arc::new(store.clone()), &broker);

    // First poll publishes
    assert_eq!(sync.poll_once().await, 1);
    assert_eq!(broker.published(), vec![pub_("home/rooms/1/temp", "21")]);

    // Unchanged value publishes nothing
    assert_eq!(sync.poll_once().await, 0);
    assert!(broker.published().is_empty());

    // Changed value publishes again
    store.write("rooms/1/temp", json!("22")).await.unwrap();
    assert_eq!(sync.poll_once().await, 1);
    assert_eq!(broker.published(), vec![pub_("home/rooms/1/temp", "22")]);
    assert_eq!(sync.cache().get("rooms/1/temp").as_deref(), Some("22"));
}

#[tokio::test]
async fn test_poll_skips_missing_and_empty_values() {
    let store = MemoryStore::new();
    store.write("a/b/empty", json!("")).await.unwrap();
    store.write("a/b/null", Value::Null).await.unwrap();
    let mut broker = Broker::connected();
    let rules = vec![
        SyncRule::new("a/b/missing", "t1", Direction::StoreToBus),
        SyncRule::new("a/b/empty", "t2", Direction::StoreToBus),
        SyncRule::new("a/b/null", "t3", Direction::StoreToBus),
    ];
    let sync = reverse(rules, Arc::new(store), &broker);

    assert_eq!(sync.poll_once().await, 0);
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn test_poll_skips_misconfigured_and_bus_to_store_rules() {
    let store = MemoryStore::new();
    store.write("a/b/c", json!("v")).await.unwrap();
    let mut broker = Broker::connected();
    let rules = vec![
        SyncRule::new("a/b/c", "", Direction::StoreToBus),
        SyncRule::new("", "t", Direction::StoreToBus),
        SyncRule::new("a/b/c", "inbound", Direction::BusToStore),
        SyncRule::new("a/b/c", "outbound", Direction::StoreToBus),
    ];
    let sync = reverse(rules, Arc::new(store), &broker);

    assert_eq!(sync.poll_once().await, 1);
    assert_eq!(broker.published(), vec![pub_("outbound", "v")]);
}

#[parameterized(
    string = { json!("on"), "on" },
    number = { json!(21.5), "21.5" },
    boolean = { json!(true), "true" },
    object = { json!({"a": 1}), r#"{"a":1}"# },
)]
fn test_poll_payload_rendering(value: Value, expected: &str) {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(async {
            let store = MemoryStore::new();
            store.write("rooms/1/temp", value).await.unwrap();
            let mut broker = Broker::connected();
            let sync = reverse(vec![temp_rule()], Arc::new(store), &broker);

            sync.poll_once().await;

            assert_eq!(broker.published(), vec![pub_("home/rooms/1/temp", expected)]);
        });
}

#[tokio::test]
async fn test_poll_while_disconnected_publishes_later() {
    let store = MemoryStore::new();
    store.write("rooms/1/temp", json!("21")).await.unwrap();
    let mut broker = Broker::connected();
    broker.state.set(ConnectionState::Reconnecting);
    let sync = reverse(vec![temp_rule()], Arc::new(store), &broker);

    assert_eq!(sync.poll_once().await, 0);
    assert!(sync.cache().is_empty());

    broker.state.set(ConnectionState::Connected);
    assert_eq!(sync.poll_once().await, 1);
    assert_eq!(broker.published(), vec![pub_("home/rooms/1/temp", "21")]);
}

#[tokio::test]
async fn test_poll_refused_publish_is_retried() {
    let store = MemoryStore::new();
    store.write("rooms/1/temp", json!("21")).await.unwrap();
    let mut broker = Broker::connected();
    let sync = reverse(vec![temp_rule()], Arc::new(store), &broker);

    // Connection dropped between the state check and the send
    broker.accepting.store(false, Ordering::SeqCst);
    assert_eq!(sync.poll_once().await, 0);
    assert_eq!(sync.cache().get("rooms/1/temp"), None);

    broker.accepting.store(true, Ordering::SeqCst);
    assert_eq!(sync.poll_once().await, 1);
    assert_eq!(broker.published(), vec![pub_("home/rooms/1/temp", "21")]);
}

#[tokio::test]
async fn test_poll_with_supervisor_gone_caches_nothing() {
    let store = MemoryStore::new();
    store.write("rooms/1/temp", json!("21")).await.unwrap();
    let state = Arc::new(SharedConnectionState::new());
    state.set(ConnectionState::Connected);
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let sync = ReverseSync::new(
        RuleSet::new(vec![temp_rule()]),
        Arc::new(store),
        BrokerHandle::new(tx, state),
    );

    assert_eq!(sync.poll_once().await, 0);
    assert_eq!(sync.cache().get("rooms/1/temp"), None);
}

#[tokio::test]
async fn test_handle_event_refused_publish_is_retried() {
    let mut broker = Broker::connected();
    let sync = reverse(vec![temp_rule()], Arc::new(MemoryStore::new()), &broker);
    let event = ChangeEvent {
        path: "rooms/1/temp".into(),
        value: json!("18"),
    };

    broker.accepting.store(false, Ordering::SeqCst);
    assert!(!sync.handle_event(&event).await);

    broker.accepting.store(true, Ordering::SeqCst);
    assert!(sync.handle_event(&event).await);
    assert_eq!(broker.published(), vec![pub_("home/rooms/1/temp", "18")]);
}

#[tokio::test]
async fn test_poll_reads_file_store_edits() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.json");
    let store = FileStore::open(&path).unwrap();
    let mut broker = Broker::connected();
    let sync = reverse(vec![temp_rule()], Arc::new(store), &broker);

    assert_eq!(sync.poll_once().await, 0);

    // Another process edits the file
    let other = FileStore::open(&path).unwrap();
    other.write("rooms/1/temp", json!("19")).await.unwrap();

    assert_eq!(sync.poll_once().await, 1);
    assert_eq!(broker.published(), vec![pub_("home/rooms/1/temp", "19")]);
}

#[tokio::test]
async fn test_handle_event_routes_by_reference() {
    let mut broker = Broker::connected();
    let rules = vec![
        temp_rule(),
        SyncRule::new("rooms/2/temp", "home/rooms/2/temp", Direction::StoreToBus),
    ];
    let sync = reverse(rules, Arc::new(MemoryStore::new()), &broker);

    let event = ChangeEvent {
        path: "rooms/2/temp".into(),
        value: json!("18"),
    };
    assert!(sync.handle_event(&event).await);
    // Redelivery is gated by the cache
    assert!(!sync.handle_event(&event).await);

    assert!(!sync
        .handle_event(&ChangeEvent {
            path: "rooms/3/temp".into(),
            value: json!("1"),
        })
        .await);
    assert_eq!(broker.published(), vec![pub_("home/rooms/2/temp", "18")]);
}

#[tokio::test]
async fn test_push_listeners_are_idempotent() {
    let store = MemoryStore::new();
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut listeners = PushListeners::new(Arc::new(store.clone()), tx);

    assert!(listeners.listen("a/b/c").unwrap());
    assert!(!listeners.listen("a/b/c").unwrap());
    assert!(listeners.listen("a/b/d").unwrap());
    assert_eq!(listeners.len(), 2);
    assert_eq!(store.listener_count(), 2);

    listeners.clear();
    assert!(listeners.is_empty());
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_push_listen_unsupported() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::open(temp.path().join("store.json")).unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut listeners = PushListeners::new(Arc::new(store), tx);

    assert!(matches!(
        listeners.listen("a/b/c"),
        Err(Error::Core(rb_core::Error::ListenUnsupported("file")))
    ));
}

#[tokio::test]
async fn test_run_push_publishes_current_then_changes() {
    let store = MemoryStore::new();
    store.write("rooms/1/temp", json!("21")).await.unwrap();
    let mut broker = Broker::connected();
    let sync = reverse(vec![temp_rule()], Arc::new(store.clone()), &broker);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync.run(
        ReverseStrategy::Push,
        Duration::from_millis(10),
        cancel.clone(),
    ));

    assert_eq!(broker.next_published().await, pub_("home/rooms/1/temp", "21"));

    // Same value written again: no publish; new value: publish
    store.write("rooms/1/temp", json!("21")).await.unwrap();
    store.write("rooms/1/temp", json!("23")).await.unwrap();
    assert_eq!(broker.next_published().await, pub_("home/rooms/1/temp", "23"));

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_run_poller_stops_on_cancel() {
    let store = MemoryStore::new();
    store.write("rooms/1/temp", json!("21")).await.unwrap();
    let mut broker = Broker::connected();
    let sync = reverse(vec![temp_rule()], Arc::new(store), &broker);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync.run(
        ReverseStrategy::Poll,
        Duration::from_millis(10),
        cancel.clone(),
    ));

    assert_eq!(broker.next_published().await, pub_("home/rooms/1/temp", "21"));

    cancel.cancel();
    task.await.unwrap().unwrap();
}
