// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Broker connection lifecycle.
//!
//! [`ReconnectSupervisor`] owns the broker transport and drives the state
//! machine `Disconnected -> Connecting -> Connected`, falling into
//! `Reconnecting` when an established connection drops. A deliberate
//! [`ReconnectSupervisor::disconnect`] clears the reconnect flag before
//! tearing down, so no reconnect can race a shutdown.
//!
//! The supervisor runs in a single task ([`ReconnectSupervisor::run`]);
//! other tasks talk to it through a cloneable [`BrokerHandle`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rb_core::protocol::{ClientFrame, RelayFrame};

use crate::error::{Error, Result};
use crate::transport::{BrokerTransport, TransportResult};

/// Connection state values for atomic state field.
pub const STATE_DISCONNECTED: u8 = 0;
pub const STATE_CONNECTING: u8 = 1;
pub const STATE_CONNECTED: u8 = 2;
pub const STATE_RECONNECTING: u8 = 3;

/// Broker connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => STATE_DISCONNECTED,
            ConnectionState::Connecting => STATE_CONNECTING,
            ConnectionState::Connected => STATE_CONNECTED,
            ConnectionState::Reconnecting => STATE_RECONNECTING,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            STATE_CONNECTING => ConnectionState::Connecting,
            STATE_CONNECTED => ConnectionState::Connected,
            STATE_RECONNECTING => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Connection state visible to the supervisor task and every handle.
///
/// Uses atomic fields for lock-free reads.
#[derive(Debug)]
pub struct SharedConnectionState {
    state: AtomicU8,
    /// Reconnect attempt count (for status reporting).
    attempt: AtomicU32,
}

impl SharedConnectionState {
    /// Create a new shared state initialized to disconnected.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_DISCONNECTED),
            attempt: AtomicU32::new(0),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// Get a human-readable status string.
    pub fn status_string(&self) -> String {
        match self.get() {
            ConnectionState::Disconnected => "disconnected".to_string(),
            ConnectionState::Connecting => "connecting".to_string(),
            ConnectionState::Connected => "connected".to_string(),
            ConnectionState::Reconnecting => {
                let attempt = self.attempt();
                if attempt > 0 {
                    format!("reconnecting (attempt {})", attempt)
                } else {
                    "reconnecting".to_string()
                }
            }
        }
    }
}

impl Default for SharedConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// A message received from the broker on a subscribed topic.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

/// Requests served by the supervisor task.
#[derive(Debug)]
pub enum BrokerCommand {
    Subscribe(String),
    Unsubscribe(String),
    /// `done` receives the outcome once the frame is sent or dropped.
    Publish {
        topic: String,
        payload: String,
        done: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable handle to a running supervisor.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    commands: mpsc::UnboundedSender<BrokerCommand>,
    state: Arc<SharedConnectionState>,
}

impl BrokerHandle {
    pub fn new(
        commands: mpsc::UnboundedSender<BrokerCommand>,
        state: Arc<SharedConnectionState>,
    ) -> Self {
        BrokerHandle { commands, state }
    }

    /// A handle wired to a bare receiver, for driving code without a broker.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BrokerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, Arc::new(SharedConnectionState::new())), rx)
    }

    fn send(&self, command: BrokerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::SupervisorStopped)
    }

    pub fn subscribe(&self, topic: &str) -> Result<()> {
        self.send(BrokerCommand::Subscribe(topic.to_string()))
    }

    pub fn unsubscribe(&self, topic: &str) -> Result<()> {
        self.send(BrokerCommand::Unsubscribe(topic.to_string()))
    }

    /// Publishes through the supervisor and waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] when the supervisor dropped the
    /// message, a transport error when sending failed, or
    /// [`Error::SupervisorStopped`] when the supervisor is gone.
    pub async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let (done, outcome) = oneshot::channel();
        self.send(BrokerCommand::Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
            done,
        })?;
        outcome.await.map_err(|_| Error::SupervisorStopped)?
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}

/// Configuration for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub url: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl SupervisorConfig {
    fn hello(&self) -> ClientFrame {
        ClientFrame::hello(self.client_id.clone(), &self.username, &self.password)
    }
}

/// What woke the run loop.
enum Wake {
    Shutdown,
    Command(BrokerCommand),
    Frame(TransportResult<Option<RelayFrame>>),
}

/// Owns the broker transport and its reconnect policy.
pub struct ReconnectSupervisor<T: BrokerTransport> {
    transport: T,
    config: SupervisorConfig,
    shared: Arc<SharedConnectionState>,
    /// Set by a successful connect, cleared by a deliberate disconnect.
    reconnect: bool,
    topics: BTreeSet<String>,
}

impl<T: BrokerTransport> ReconnectSupervisor<T> {
    pub fn new(transport: T, config: SupervisorConfig, shared: Arc<SharedConnectionState>) -> Self {
        ReconnectSupervisor {
            transport,
            config,
            shared,
            reconnect: false,
            topics: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.get()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected() && self.transport.is_connected()
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect
    }

    /// Tracked topics, in sorted order.
    pub fn topics(&self) -> Vec<String> {
        self.topics.iter().cloned().collect()
    }

    /// Connects once.
    ///
    /// On failure the state returns to `Disconnected`; the caller may retry.
    pub async fn connect(&mut self) -> Result<()> {
        self.shared.set(ConnectionState::Connecting);
        let hello = self.config.hello();
        match self.transport.connect(&self.config.url, hello).await {
            Ok(()) => {
                self.shared.set(ConnectionState::Connected);
                self.shared.set_attempt(0);
                self.reconnect = true;
                info!("connected to broker at {}", self.config.url);
                Ok(())
            }
            Err(e) => {
                self.shared.set(ConnectionState::Disconnected);
                warn!("failed to connect to broker at {}: {}", self.config.url, e);
                Err(e.into())
            }
        }
    }

    /// Deliberate teardown. Clears the reconnect flag first.
    pub async fn disconnect(&mut self) {
        self.reconnect = false;
        if let Err(e) = self.transport.disconnect().await {
            warn!("error while disconnecting from broker: {}", e);
        }
        self.shared.set(ConnectionState::Disconnected);
        info!("disconnected from broker");
    }

    /// Tracks `topic` and subscribes to it if connected. Repeats are no-ops.
    pub async fn subscribe(&mut self, topic: &str) {
        if !self.topics.insert(topic.to_string()) {
            return;
        }
        if self.is_connected() {
            self.send(ClientFrame::subscribe(topic)).await;
        }
        debug!("subscribed to {}", topic);
    }

    /// Stops tracking `topic` and unsubscribes if connected.
    pub async fn unsubscribe(&mut self, topic: &str) {
        if !self.topics.remove(topic) {
            return;
        }
        if self.is_connected() {
            self.send(ClientFrame::unsubscribe(topic)).await;
        }
        debug!("unsubscribed from {}", topic);
    }

    pub async fn unsubscribe_all(&mut self) {
        for topic in self.topics() {
            self.unsubscribe(&topic).await;
        }
    }

    /// Publishes when connected; otherwise the message is logged and dropped.
    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        if !self.is_connected() {
            warn!("not connected, dropping publish to {}", topic);
            return Err(Error::NotConnected);
        }
        self.transport
            .send(ClientFrame::publish(topic, payload))
            .await?;
        debug!("published to {}: {}", topic, payload);
        Ok(())
    }

    async fn send(&mut self, frame: ClientFrame) {
        if let Err(e) = self.transport.send(frame).await {
            warn!("failed to send to broker: {}", e);
        }
    }

    /// Handles a lost connection.
    ///
    /// With the reconnect flag set, retries forever with the fixed delay
    /// until connected (then re-subscribes every tracked topic) or
    /// cancelled. Returns true once reconnected.
    pub async fn handle_connection_lost(&mut self, cancel: &CancellationToken) -> bool {
        if !self.reconnect {
            self.shared.set(ConnectionState::Disconnected);
            return false;
        }

        self.shared.set(ConnectionState::Reconnecting);
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            self.shared.set_attempt(attempt);
            debug!("broker {}", self.shared.status_string());

            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.config.reconnect_delay) => false,
            };
            if cancelled {
                self.shared.set(ConnectionState::Disconnected);
                return false;
            }

            let hello = self.config.hello();
            let result = tokio::select! {
                _ = cancel.cancelled() => None,
                result = self.transport.connect(&self.config.url, hello) => Some(result),
            };
            match result {
                None => {
                    self.shared.set(ConnectionState::Disconnected);
                    return false;
                }
                Some(Ok(())) => {
                    self.shared.set(ConnectionState::Connected);
                    self.shared.set_attempt(0);
                    info!("reconnected to broker after {} attempt(s)", attempt);
                    self.resubscribe().await;
                    return true;
                }
                Some(Err(e)) => {
                    warn!("reconnect attempt {} failed: {}", attempt, e);
                }
            }
        }
    }

    async fn resubscribe(&mut self) {
        for topic in self.topics() {
            self.send(ClientFrame::subscribe(topic)).await;
        }
    }

    /// Runs the supervisor until `cancel` fires.
    ///
    /// Connects first (retrying with the fixed delay if the first attempt
    /// fails), then serves commands and forwards inbound messages to
    /// `inbound`. On cancellation every tracked topic is unsubscribed and
    /// the connection closed.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<BrokerCommand>,
        inbound: mpsc::Sender<InboundMessage>,
        cancel: CancellationToken,
    ) {
        if !self.is_connected() && self.connect().await.is_err() {
            self.reconnect = true;
            self.handle_connection_lost(&cancel).await;
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }
            // A failed send drops the transport without a close frame.
            if self.shared.is_connected() && !self.transport.is_connected() {
                warn!("broker connection dropped");
                self.handle_connection_lost(&cancel).await;
                continue;
            }
            let connected = self.is_connected();
            let wake = tokio::select! {
                _ = cancel.cancelled() => Wake::Shutdown,
                command = commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::Shutdown,
                },
                frame = self.transport.recv(), if connected => Wake::Frame(frame),
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Command(BrokerCommand::Subscribe(topic)) => self.subscribe(&topic).await,
                Wake::Command(BrokerCommand::Unsubscribe(topic)) => {
                    self.unsubscribe(&topic).await
                }
                Wake::Command(BrokerCommand::Publish {
                    topic,
                    payload,
                    done,
                }) => {
                    let outcome = self.publish(&topic, &payload).await;
                    // The publisher may have stopped waiting
                    let _ = done.send(outcome);
                }
                Wake::Frame(Ok(Some(RelayFrame::Message { topic, payload }))) => {
                    if inbound
                        .send(InboundMessage { topic, payload })
                        .await
                        .is_err()
                    {
                        debug!("forward channel closed, dropping inbound message");
                    }
                }
                Wake::Frame(Ok(Some(RelayFrame::Error { message }))) => {
                    warn!("broker error: {}", message);
                }
                Wake::Frame(Ok(Some(frame))) => {
                    debug!("ignoring broker frame: {:?}", frame);
                }
                Wake::Frame(Ok(None)) => {
                    warn!("broker connection closed");
                    self.handle_connection_lost(&cancel).await;
                }
                Wake::Frame(Err(e)) => {
                    warn!("broker connection lost: {}", e);
                    self.handle_connection_lost(&cancel).await;
                }
            }
        }

        self.unsubscribe_all().await;
        self.disconnect().await;
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
