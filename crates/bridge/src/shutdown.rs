// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot shutdown.
//!
//! Any number of signals or callers may ask for shutdown; only the first
//! request starts it. Every task watches the guard's token and winds down
//! when it is cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cloneable shutdown trigger.
#[derive(Debug, Clone, Default)]
pub struct ShutdownGuard {
    triggered: Arc<AtomicBool>,
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts shutdown. Returns true only for the first caller.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Token cancelled when shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Waits for SIGINT or SIGTERM (Ctrl+C elsewhere), then triggers.
    ///
    /// Returns early if shutdown was triggered some other way.
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        #[cfg(unix)]
        let terminate = terminate.recv();

        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            result = ctrl_c => {
                result?;
                info!("received SIGINT, shutting down");
            }
            _ = terminate => {
                info!("received SIGTERM, shutting down");
            }
            _ = self.token.cancelled() => return Ok(()),
        }
        self.trigger();
        Ok(())
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
