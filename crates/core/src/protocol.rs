// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol frames between a broker client and the relay.
//!
//! The protocol is simple:
//! - Client introduces itself with `hello`, then subscribes and publishes
//! - Relay fans published messages out to subscribers of the exact topic

use serde::{Deserialize, Serialize};

/// Frames sent from client to relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every connection.
    Hello {
        client_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },

    /// Start receiving messages published to `topic`.
    Subscribe { topic: String },

    /// Stop receiving messages published to `topic`.
    Unsubscribe { topic: String },

    /// Publish `payload` to every subscriber of `topic`.
    Publish { topic: String, payload: String },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Frames sent from relay to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    /// Accepts a `hello`.
    Welcome,

    /// A message published to a subscribed topic.
    Message { topic: String, payload: String },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error message.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientFrame {
    /// Creates a Hello frame. Empty credentials are omitted.
    pub fn hello(client_id: impl Into<String>, username: &str, password: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        ClientFrame::Hello {
            client_id: client_id.into(),
            username: non_empty(username),
            password: non_empty(password),
        }
    }

    pub fn subscribe(topic: impl Into<String>) -> Self {
        ClientFrame::Subscribe {
            topic: topic.into(),
        }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        ClientFrame::Unsubscribe {
            topic: topic.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        ClientFrame::Publish {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn ping(id: u64) -> Self {
        ClientFrame::Ping { id }
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the frame from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl RelayFrame {
    pub fn message(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        RelayFrame::Message {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn pong(id: u64) -> Self {
        RelayFrame::Pong { id }
    }

    pub fn error(message: impl Into<String>) -> Self {
        RelayFrame::Error {
            message: message.into(),
        }
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the frame from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
