// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring of the running daemon.
//!
//! [`Bridge::open`] does everything that may fail at startup: rules, store
//! and reverse strategy. [`Bridge::run`] then starts the tasks
//!
//! - supervisor: owns the broker connection
//! - forward: applies inbound messages to the store
//! - reverse: polls or listens to the store and publishes changes
//!
//! and waits for the shutdown guard.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use rb_core::{
    Direction, DocumentStore, FileStore, MemoryStore, MonotonicClock, RuleFile, RuleSet,
};

use crate::config::{Config, StoreKind};
use crate::error::Result;
use crate::forward::ForwardSync;
use crate::id::generate_client_id;
use crate::promotion::Promoter;
use crate::reverse::{select_strategy, ReverseStrategy, ReverseSync};
use crate::shutdown::ShutdownGuard;
use crate::supervisor::{
    BrokerHandle, ReconnectSupervisor, SharedConnectionState, SupervisorConfig,
};
use crate::transport::BrokerTransport;

/// Inbound messages buffered between the supervisor and the forward task.
const INBOUND_BUFFER: usize = 256;

/// A configured bridge, ready to run.
pub struct Bridge {
    config: Config,
    rules: RuleSet,
    store: Arc<dyn DocumentStore>,
    strategy: ReverseStrategy,
    client_id: String,
}

impl Bridge {
    /// Loads rules and opens the store named by `config`.
    ///
    /// # Errors
    ///
    /// Unreadable rules, an unusable store, or push mode on a store that
    /// cannot push.
    pub fn open(config: Config) -> Result<Self> {
        let rules = RuleSet::load(RuleFile::new(&config.sync.rules))?;
        let store: Arc<dyn DocumentStore> = match config.store.kind {
            StoreKind::File => Arc::new(FileStore::open(&config.store.path)?),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };
        Self::with_parts(config, rules, store)
    }

    /// Builds a bridge from already opened parts.
    pub fn with_parts(
        config: Config,
        rules: RuleSet,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        let strategy = select_strategy(config.sync.reverse_mode, store.as_ref())?;

        for rule in rules.snapshot() {
            if let Err(e) = rule.validate() {
                warn!("{}", e);
            }
        }
        info!(
            "loaded {} rule(s): {} inbound, {} outbound",
            rules.len(),
            rules.snapshot_direction(Direction::BusToStore).len(),
            rules.snapshot_direction(Direction::StoreToBus).len()
        );
        info!("store: {}, reverse sync: {:?}", store.kind(), strategy);

        let client_id = if config.broker.client_id.is_empty() {
            generate_client_id(&Utc::now())
        } else {
            config.broker.client_id.clone()
        };

        Ok(Bridge {
            config,
            rules,
            store,
            strategy,
            client_id,
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    pub fn strategy(&self) -> ReverseStrategy {
        self.strategy
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Runs until `guard` is triggered.
    ///
    /// # Errors
    ///
    /// Fails if an interrupted promotion cannot be completed, or if the
    /// reverse channel cannot register its store listeners.
    pub async fn run<T>(self, transport: T, guard: ShutdownGuard) -> Result<()>
    where
        T: BrokerTransport + 'static,
    {
        let cancel = guard.token();
        let promoter = Promoter::new(Arc::clone(&self.store), self.rules.clone());
        if let Some(promoted) = promoter.recover_pending().await? {
            info!("recovered interrupted promotion to {}", promoted);
        }

        let shared = Arc::new(SharedConnectionState::new());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let broker = BrokerHandle::new(commands_tx, Arc::clone(&shared));
        for topic in self.rules.topics(Direction::BusToStore) {
            broker.subscribe(&topic)?;
        }

        let supervisor = ReconnectSupervisor::new(
            transport,
            SupervisorConfig {
                url: self.config.broker.url.clone(),
                client_id: self.client_id.clone(),
                username: self.config.broker.username.clone(),
                password: self.config.broker.password.clone(),
                reconnect_delay: self.config.broker.reconnect_delay(),
            },
            shared,
        );
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let supervisor_task = tokio::spawn(supervisor.run(commands_rx, inbound_tx, cancel.clone()));

        let forward = ForwardSync::new(
            self.rules.clone(),
            Arc::clone(&self.store),
            promoter,
            Arc::new(MonotonicClock::system()),
        );
        let forward_task = tokio::spawn(forward.run(inbound_rx, cancel.clone()));

        let reverse = ReverseSync::new(self.rules.clone(), Arc::clone(&self.store), broker);
        let mut reverse_task = tokio::spawn(reverse.run(
            self.strategy,
            self.config.sync.poll_interval(),
            cancel.clone(),
        ));

        info!("rulebridge running as {}", self.client_id);

        let early = tokio::select! {
            _ = cancel.cancelled() => None,
            result = &mut reverse_task => Some(result),
        };
        let reverse_result = match early {
            Some(result) => {
                // Reverse sync gave up before shutdown; take the rest down too
                guard.trigger();
                result
            }
            None => reverse_task.await,
        };

        if let Err(e) = supervisor_task.await {
            error!("supervisor task failed: {}", e);
        }
        if let Err(e) = forward_task.await {
            error!("forward task failed: {}", e);
        }
        info!("rulebridge stopped");

        match reverse_result {
            Ok(result) => result,
            Err(e) => {
                error!("reverse task failed: {}", e);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
