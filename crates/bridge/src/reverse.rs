// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Store to broker direction.
//!
//! Two strategies feed the same publish-if-changed gate ([`ChangeCache`]):
//! - polling: every interval, read each store-to-broker rule's reference
//! - push: one store listener per rule reference
//!
//! Exactly one of them runs. While the broker is disconnected nothing is
//! published or cached, so values seen then are published once it is back.
//! A publish the supervisor could not deliver is dropped from the cache for
//! the same reason.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rb_core::{
    value_to_payload, ChangeCache, ChangeEvent, Direction, DocumentStore, RuleSet, Subscription,
    SyncRule,
};

use crate::config::ReverseMode;
use crate::error::{Error, Result};
use crate::supervisor::BrokerHandle;

/// The strategy the reverse channel runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverseStrategy {
    Poll,
    Push,
}

/// Picks the strategy for `mode` given what `store` supports.
///
/// # Errors
///
/// Returns [`Error::PushUnsupported`] when push is requested explicitly
/// from a store without change notifications.
pub fn select_strategy(mode: ReverseMode, store: &dyn DocumentStore) -> Result<ReverseStrategy> {
    match mode {
        ReverseMode::Auto if store.supports_listen() => Ok(ReverseStrategy::Push),
        ReverseMode::Auto | ReverseMode::Poll => Ok(ReverseStrategy::Poll),
        ReverseMode::Push if store.supports_listen() => Ok(ReverseStrategy::Push),
        ReverseMode::Push => Err(Error::PushUnsupported(store.kind())),
    }
}

/// Store listeners keyed by path. Registering a path twice is a no-op.
pub struct PushListeners {
    store: Arc<dyn DocumentStore>,
    events: mpsc::UnboundedSender<ChangeEvent>,
    subscriptions: HashMap<String, Subscription>,
}

impl PushListeners {
    pub fn new(store: Arc<dyn DocumentStore>, events: mpsc::UnboundedSender<ChangeEvent>) -> Self {
        PushListeners {
            store,
            events,
            subscriptions: HashMap::new(),
        }
    }

    /// Starts listening at `path`. Returns false if already listening.
    pub fn listen(&mut self, path: &str) -> Result<bool> {
        if self.subscriptions.contains_key(path) {
            return Ok(false);
        }
        let subscription = self.store.listen(path, self.events.clone())?;
        self.subscriptions.insert(path.to_string(), subscription);
        debug!("listening at {}", path);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Cancels every listener.
    pub fn clear(&mut self) {
        for (_, subscription) in self.subscriptions.drain() {
            subscription.cancel();
        }
    }
}

/// Publishes store values to the broker.
pub struct ReverseSync {
    rules: RuleSet,
    store: Arc<dyn DocumentStore>,
    cache: Arc<ChangeCache>,
    broker: BrokerHandle,
}

impl ReverseSync {
    pub fn new(rules: RuleSet, store: Arc<dyn DocumentStore>, broker: BrokerHandle) -> Self {
        ReverseSync {
            rules,
            store,
            cache: Arc::new(ChangeCache::new()),
            broker,
        }
    }

    /// Last published value per path, shared for diagnostics.
    pub fn cache(&self) -> Arc<ChangeCache> {
        Arc::clone(&self.cache)
    }

    /// One polling tick. Returns how many values were published.
    pub async fn poll_once(&self) -> usize {
        if !self.broker.is_connected() {
            debug!("broker not connected, skipping poll");
            return 0;
        }

        let mut published = 0;
        for (_, rule) in self.rules.snapshot_direction(Direction::StoreToBus) {
            if !usable(&rule) {
                continue;
            }
            match self.store.read(&rule.source_reference).await {
                Ok(Some(value)) => {
                    if self.publish_if_changed(&rule, &value).await {
                        published += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("failed to read {}: {}", rule.source_reference, e),
            }
        }
        published
    }

    /// Routes a change notification. Returns true if it was published.
    pub async fn handle_event(&self, event: &ChangeEvent) -> bool {
        if !self.broker.is_connected() {
            debug!("broker not connected, skipping change at {}", event.path);
            return false;
        }
        let Some((_, rule)) = self
            .rules
            .find_by_reference(&event.path, Direction::StoreToBus)
        else {
            debug!("no rule for change at {}", event.path);
            return false;
        };
        usable(&rule) && self.publish_if_changed(&rule, &event.value).await
    }

    async fn publish_if_changed(&self, rule: &SyncRule, value: &Value) -> bool {
        if value.is_null() {
            return false;
        }
        let payload = value_to_payload(value);
        if payload.is_empty() || !self.cache.should_publish(&rule.source_reference, &payload) {
            return false;
        }
        match self.broker.publish(&rule.topic, &payload).await {
            Ok(()) => {
                debug!("published {} -> {}: {}", rule.source_reference, rule.topic, payload);
                true
            }
            Err(e) => {
                warn!("failed to publish to {}: {}", rule.topic, e);
                self.cache.forget(&rule.source_reference, &payload);
                false
            }
        }
    }

    /// Registers a listener for every store-to-broker rule.
    pub fn listen_all(&self, listeners: &mut PushListeners) -> Result<()> {
        for (_, rule) in self.rules.snapshot_direction(Direction::StoreToBus) {
            if usable(&rule) {
                listeners.listen(&rule.source_reference)?;
            }
        }
        Ok(())
    }

    /// Polls every `interval` until `cancel` fires. The first poll runs
    /// immediately.
    pub async fn run_poller(self, interval: Duration, cancel: CancellationToken) {
        info!("reverse sync polling every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
        info!("reverse sync stopped");
    }

    /// Listens for store changes until `cancel` fires.
    ///
    /// Current values are published once the broker connects (and again
    /// after every reconnect); `check_interval` is how often the connection
    /// is looked at.
    pub async fn run_push(self, check_interval: Duration, cancel: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut listeners = PushListeners::new(Arc::clone(&self.store), tx);
        self.listen_all(&mut listeners)?;
        info!("reverse sync listening at {} path(s)", listeners.len());

        let mut ticker = tokio::time::interval(check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut was_connected = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => {
                        self.handle_event(&event).await;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    let connected = self.broker.is_connected();
                    if connected && !was_connected {
                        self.poll_once().await;
                    }
                    was_connected = connected;
                }
            }
        }

        listeners.clear();
        info!("reverse sync stopped");
        Ok(())
    }

    /// Runs the chosen strategy until `cancel` fires.
    pub async fn run(
        self,
        strategy: ReverseStrategy,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Result<()> {
        match strategy {
            ReverseStrategy::Poll => {
                self.run_poller(interval, cancel).await;
                Ok(())
            }
            ReverseStrategy::Push => self.run_push(interval, cancel).await,
        }
    }
}

/// Logs and rejects rules that cannot be published.
fn usable(rule: &SyncRule) -> bool {
    if rule.topic.trim().is_empty() {
        error!(
            "{}",
            rb_core::Error::EmptyTopic {
                reference: rule.source_reference.clone(),
            }
        );
        return false;
    }
    if rule.source_reference.trim().is_empty() {
        error!(
            "{}",
            rb_core::Error::EmptyReference {
                topic: rule.topic.clone(),
            }
        );
        return false;
    }
    true
}

#[cfg(test)]
#[path = "reverse_tests.rs"]
mod tests;
