// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Broker to store direction.
//!
//! Inbound messages are applied one at a time, in arrival order. A message
//! whose topic has no broker-to-store rule is ignored; a matching rule with
//! an empty reference is a configuration error and the message is dropped.
//! Backend failures drop the message too; there is no retry queue.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rb_core::{
    stamp_payload, ClockSource, Direction, DocumentStore, PromotionTracker, RuleSet, StorePath,
};

use crate::error::Result;
use crate::promotion::{Promoter, COUNT_FIELD};
use crate::supervisor::InboundMessage;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    /// No broker-to-store rule for the topic.
    Ignored,
    /// The matching rule is misconfigured.
    Dropped,
    /// The payload overwrote the scalar at `path`.
    Written { path: String, value: String },
    /// The payload was appended as entry `path`; `count` entries exist now.
    Appended {
        path: String,
        value: String,
        count: u64,
    },
}

/// Applies inbound broker messages to the store.
pub struct ForwardSync {
    rules: RuleSet,
    store: Arc<dyn DocumentStore>,
    tracker: Arc<PromotionTracker>,
    promoter: Promoter,
    clock: Arc<dyn ClockSource>,
}

impl ForwardSync {
    pub fn new(
        rules: RuleSet,
        store: Arc<dyn DocumentStore>,
        promoter: Promoter,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        ForwardSync {
            rules,
            store,
            tracker: Arc::new(PromotionTracker::new()),
            promoter,
            clock,
        }
    }

    /// Entry counts per promoted reference, shared for diagnostics.
    pub fn tracker(&self) -> Arc<PromotionTracker> {
        Arc::clone(&self.tracker)
    }

    /// Applies one message.
    ///
    /// # Errors
    ///
    /// Returns store, promotion and rules-file errors; the message is lost.
    pub async fn handle(&self, message: &InboundMessage) -> Result<ForwardOutcome> {
        let Some((index, rule)) = self
            .rules
            .find_by_topic(&message.topic, Direction::BusToStore)
        else {
            debug!("no rule for topic {}, ignoring", message.topic);
            return Ok(ForwardOutcome::Ignored);
        };

        let reference = rule.source_reference.trim();
        if StorePath::parse(reference).last_segment().is_none() {
            let err = rb_core::Error::EmptyReference {
                topic: message.topic.clone(),
            };
            error!("{}", err);
            return Ok(ForwardOutcome::Dropped);
        }

        let payload = if rule.timestamp {
            stamp_payload(&message.payload, self.clock.now_secs())
        } else {
            message.payload.clone()
        };

        if !rule.promote {
            self.store
                .write(reference, Value::String(payload.clone()))
                .await?;
            debug!("wrote {} = {}", reference, payload);
            return Ok(ForwardOutcome::Written {
                path: reference.to_string(),
                value: payload,
            });
        }

        if self.store.is_collection(reference).await? {
            if !self.tracker.contains(reference) {
                let count = self.hydrate_count(reference).await?;
                self.tracker.set(reference, count);
            }
            self.tracker.increment(reference);
            return self.write_entry(reference, payload).await;
        }

        let promoted = self.promoter.promote(index, reference).await?;
        self.tracker.set(&promoted, 1);
        self.write_entry(&promoted, payload).await
    }

    /// Count of entries already stored under a promoted reference: its
    /// `count` field, else the number of `<stem>-N` entries.
    async fn hydrate_count(&self, reference: &str) -> Result<u64> {
        let count_path = format!("{}/{}", reference, COUNT_FIELD);
        let stored = self.store.read(&count_path).await?.and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        if let Some(count) = stored {
            return Ok(count);
        }
        let stem = entry_stem(reference)?;
        Ok(self.store.entry_count(reference, &stem).await?)
    }

    /// Writes the entry for the tracker's current count, then the count.
    async fn write_entry(&self, reference: &str, payload: String) -> Result<ForwardOutcome> {
        let stem = entry_stem(reference)?;
        let count = self.tracker.get(reference).unwrap_or(0);
        let index = self.tracker.next_index(reference);
        let entry = format!("{}/{}-{}", reference, stem, index);

        if let Err(e) = self.store.write(&entry, Value::String(payload.clone())).await {
            self.tracker.revert(reference);
            return Err(e.into());
        }
        let count_path = format!("{}/{}", reference, COUNT_FIELD);
        self.store.write(&count_path, Value::from(count)).await?;

        debug!("appended {} = {} (count {})", entry, payload, count);
        Ok(ForwardOutcome::Appended {
            path: entry,
            value: payload,
            count,
        })
    }

    /// Applies messages until `cancel` fires or the inbound channel closes.
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>, cancel: CancellationToken) {
        info!("forward sync started");
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            if let Err(e) = self.handle(&message).await {
                warn!("dropping message on {}: {}", message.topic, e);
            }
        }
        info!("forward sync stopped");
    }
}

fn entry_stem(reference: &str) -> Result<String> {
    StorePath::parse(reference)
        .entry_stem()
        .map(str::to_string)
        .ok_or_else(|| {
            rb_core::Error::EmptyReference {
                topic: String::new(),
            }
            .into()
        })
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
