// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Document store abstraction.
//!
//! The sync channels only talk to a store through [`DocumentStore`], which
//! allows:
//! - an in-process [`MemoryStore`] with change notifications
//! - a JSON file backend ([`crate::FileStore`]) that must be polled
//! - mock stores in tests

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::path::compact_segments;
use crate::tree::DocTree;

pub use crate::tree::FieldUpdate;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A change observed at a listened path.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The path the listener was registered at.
    pub path: String,
    /// Current value at that path.
    pub value: Value,
}

/// Hierarchical document store consumed by the sync channels.
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs and errors.
    fn kind(&self) -> &'static str;

    /// Reads the value at `path`, `None` when nothing is there.
    fn read<'a>(&'a self, path: &'a str) -> StoreFuture<'a, Option<Value>>;

    /// Upserts the scalar at `path`.
    fn write<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()>;

    /// Partial merge on the children of `path`.
    fn update<'a>(
        &'a self,
        path: &'a str,
        updates: Vec<(String, FieldUpdate)>,
    ) -> StoreFuture<'a, ()>;

    /// Removes the node at `path`. Returns true when something was removed.
    fn delete<'a>(&'a self, path: &'a str) -> StoreFuture<'a, bool>;

    /// True when `path` is collection-like (has children).
    fn is_collection<'a>(&'a self, path: &'a str) -> StoreFuture<'a, bool>;

    /// Number of `<stem>-N` entries under `path`.
    fn entry_count<'a>(&'a self, path: &'a str, stem: &'a str) -> StoreFuture<'a, u64>;

    /// Whether [`DocumentStore::listen`] is available.
    fn supports_listen(&self) -> bool {
        false
    }

    /// Registers a change listener at `path`. Events are sent to `events`
    /// until the returned [`Subscription`] is cancelled or dropped.
    fn listen(&self, path: &str, events: mpsc::UnboundedSender<ChangeEvent>) -> Result<Subscription> {
        let _ = (path, events);
        Err(Error::ListenUnsupported(self.kind()))
    }
}

/// Handle for a registered listener. Dropping it unregisters the listener.
pub struct Subscription {
    path: String,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(path: impl Into<String>, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Subscription {
            path: path.into(),
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Unregisters the listener now.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Renders a store value as a broker payload: strings verbatim, anything
/// else as compact JSON.
pub fn value_to_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True when `changed` is `listened` or lies below it.
fn is_at_or_below(changed: &str, listened: &str) -> bool {
    let changed = compact_segments(changed);
    let listened = compact_segments(listened);
    changed.len() >= listened.len() && changed[..listened.len()] == listened[..]
}

struct Listener {
    id: u64,
    path: String,
    events: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct MemoryInner {
    tree: Mutex<DocTree>,
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl MemoryInner {
    fn tree(&self) -> MutexGuard<'_, DocTree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-process store backed by a [`DocTree`].
///
/// Cheap to clone; clones share the same tree and listeners.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `tree`.
    pub fn with_tree(tree: DocTree) -> Self {
        let store = Self::default();
        *store.inner.tree() = tree;
        store
    }

    /// Copy of the current tree.
    pub fn snapshot(&self) -> DocTree {
        self.inner.tree().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    /// Sends the current value of every listened path affected by a change
    /// at `changed`.
    fn notify(&self, changed: &str) {
        let mut listeners = self.inner.listeners();
        listeners.retain(|l| !l.events.is_closed());
        if listeners.is_empty() {
            return;
        }
        let tree = self.inner.tree();
        for listener in listeners.iter() {
            if !is_at_or_below(changed, &listener.path) {
                continue;
            }
            if let Some(value) = tree.read(&listener.path) {
                let _ = listener.events.send(ChangeEvent {
                    path: listener.path.clone(),
                    value,
                });
            }
        }
    }

    fn unregister(inner: &Weak<MemoryInner>, id: u64) {
        if let Some(inner) = inner.upgrade() {
            inner.listeners().retain(|l| l.id != id);
        }
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl DocumentStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn read<'a>(&'a self, path: &'a str) -> StoreFuture<'a, Option<Value>> {
        Box::pin(async move { Ok(self.inner.tree().read(path)) })
    }

    fn write<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.inner.tree().write(path, value)?;
            self.notify(path);
            Ok(())
        })
    }

    fn update<'a>(
        &'a self,
        path: &'a str,
        updates: Vec<(String, FieldUpdate)>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.inner.tree().update(path, &updates);
            for (name, _) in &updates {
                self.notify(&format!("{}/{}", path.trim_end_matches('/'), name));
            }
            Ok(())
        })
    }

    fn delete<'a>(&'a self, path: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let removed = self.inner.tree().delete(path);
            if removed {
                self.notify(path);
            }
            Ok(removed)
        })
    }

    fn is_collection<'a>(&'a self, path: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.inner.tree().is_collection(path)) })
    }

    fn entry_count<'a>(&'a self, path: &'a str, stem: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move { Ok(self.inner.tree().entry_count(path, stem)) })
    }

    fn supports_listen(&self) -> bool {
        true
    }

    fn listen(&self, path: &str, events: mpsc::UnboundedSender<ChangeEvent>) -> Result<Subscription> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push(Listener {
            id,
            path: path.to_string(),
            events,
        });
        let weak = Arc::downgrade(&self.inner);
        Ok(Subscription::new(path, move || {
            MemoryStore::unregister(&weak, id)
        }))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
