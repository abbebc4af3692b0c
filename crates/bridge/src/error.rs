// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::transport::TransportError;

/// All possible errors that can occur in the bridge daemon.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid broker url '{0}'\n  hint: the url must start with ws:// or wss://")]
    InvalidBrokerUrl(String),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("push mode needs a store with change notifications, but the {0} store has none\n  hint: set sync.reverse_mode to \"auto\" or \"poll\"")]
    PushUnsupported(&'static str),

    #[error("not connected to the broker")]
    NotConnected,

    #[error("broker supervisor has stopped")]
    SupervisorStopped,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Core(#[from] rb_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
