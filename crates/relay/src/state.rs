// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Relay state shared by all connections.
//!
//! Holds the broadcast channel every published message goes through and
//! the optional credentials clients must present in `hello`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// A message published by some client.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
}

/// Username/password pair required by the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Shared relay state.
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    /// Fanout channel; each connection filters by its own topics.
    broadcast_tx: broadcast::Sender<Published>,
    credentials: Option<Credentials>,
    /// Connections that completed `hello`.
    clients: AtomicUsize,
}

impl RelayState {
    pub fn new(credentials: Option<Credentials>) -> Self {
        // Create broadcast channel with reasonable buffer
        let (broadcast_tx, _) = broadcast::channel(1024);
        RelayState {
            inner: Arc::new(RelayStateInner {
                broadcast_tx,
                credentials,
                clients: AtomicUsize::new(0),
            }),
        }
    }

    /// Checks `hello` credentials. Always accepts when none are configured.
    pub fn authorize(&self, username: Option<&str>, password: Option<&str>) -> bool {
        match &self.inner.credentials {
            None => true,
            Some(c) => {
                username == Some(c.username.as_str()) && password == Some(c.password.as_str())
            }
        }
    }

    /// Broadcasts a message. Returns the number of connections it reached.
    pub fn publish(&self, topic: &str, payload: &str) -> usize {
        self.inner
            .broadcast_tx
            .send(Published {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })
            .unwrap_or(0)
    }

    /// Subscribe to broadcast messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.inner.broadcast_tx.subscribe()
    }

    pub fn client_joined(&self) {
        self.inner.clients.fetch_add(1, Ordering::SeqCst);
    }

    pub fn client_left(&self) {
        self.inner.clients.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
