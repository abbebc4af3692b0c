// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rulebridge: rule-driven sync between a pub/sub broker and a document store
//!
//! Inbound broker messages are written to the store ([`forward`]), store
//! values are published to the broker ([`reverse`]), and a supervisor keeps
//! the broker connection alive ([`supervisor`]). Which topic maps to which
//! store reference is decided by the rules in `rb_core::RuleSet`.

pub mod bridge;
pub mod config;
pub mod env;
pub mod error;
pub mod forward;
pub mod id;
pub mod promotion;
pub mod reverse;
pub mod shutdown;
pub mod supervisor;
pub mod transport;

pub use bridge::Bridge;
pub use config::Config;
pub use error::{Error, Result};
pub use shutdown::ShutdownGuard;
pub use transport::WebSocketTransport;
