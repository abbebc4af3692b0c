// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use tempfile::TempDir;

fn open_store() -> (TempDir, FileStore) {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path().join("store.json")).unwrap();
    (dir, store)
}

#[test]
fn test_open_creates_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/store.json");
    let store = FileStore::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(store.path(), path);
}

#[test]
fn test_open_accepts_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    fs::write(&path, "").unwrap();
    assert!(FileStore::open(&path).is_ok());
}

#[test]
fn test_open_rejects_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        FileStore::open(&path),
        Err(crate::Error::Json(_))
    ));
}

#[tokio::test]
async fn test_write_persists_to_disk() {
    let (_dir, store) = open_store();
    store.write("devices/lamp1/power", json!("on")).await.unwrap();

    let reopened = FileStore::open(store.path()).unwrap();
    assert_eq!(
        reopened.read("devices/lamp1/power").await.unwrap(),
        Some(json!("on"))
    );
}

#[tokio::test]
async fn test_external_edits_are_observed() {
    let (_dir, store) = open_store();
    store.write("rooms/1/temp", json!("21")).await.unwrap();

    let mut tree: DocTree =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    tree.write("rooms/1/temp", json!("23")).unwrap();
    fs::write(store.path(), serde_json::to_string(&tree).unwrap()).unwrap();

    assert_eq!(store.read("rooms/1/temp").await.unwrap(), Some(json!("23")));
}

#[tokio::test]
async fn test_promotion_sequence_on_disk() {
    let (_dir, store) = open_store();
    store.write("sensors/temp/value", json!("20")).await.unwrap();
    assert!(!store.is_collection("sensors/temp/value").await.unwrap());

    store
        .write("sensors/temp/value/d1/count", json!(0))
        .await
        .unwrap();
    store
        .update("sensors/temp", vec![("value".into(), FieldUpdate::Delete)])
        .await
        .unwrap();
    store
        .write("sensors/temp/value/d1/value-0", json!("21.5"))
        .await
        .unwrap();

    assert!(store.is_collection("sensors/temp/value/d1").await.unwrap());
    assert_eq!(
        store.entry_count("sensors/temp/value/d1", "value").await.unwrap(),
        1
    );
    assert_eq!(
        store.read("sensors/temp/value").await.unwrap(),
        Some(json!({"d1": {"count": 0, "value-0": "21.5"}}))
    );
}

#[tokio::test]
async fn test_delete_reports_removal() {
    let (_dir, store) = open_store();
    store.write("a/b", json!(1)).await.unwrap();
    assert!(store.delete("a/b").await.unwrap());
    assert!(!store.delete("a/b").await.unwrap());
}

#[tokio::test]
async fn test_listen_is_unsupported() {
    let (_dir, store) = open_store();
    assert!(!store.supports_listen());
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let err = store.listen("a", tx).unwrap_err();
    assert!(matches!(err, crate::Error::ListenUnsupported("file")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_writers_all_land() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::open(temp.path().join("store.json")).unwrap();

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .write(&format!("rooms/{}/temp", i), json!(i))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    for i in 0..8 {
        assert_eq!(
            store.read(&format!("rooms/{}/temp", i)).await.unwrap(),
            Some(json!(i))
        );
    }
}
