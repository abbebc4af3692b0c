// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rb-relay: WebSocket publish/subscribe relay for rulebridge.
//!
//! Clients introduce themselves with `hello`, subscribe to exact topics,
//! and publish messages that the relay fans out to every subscriber.

mod server;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use state::{Credentials, RelayState};

/// rb-relay: publish/subscribe relay
#[derive(Parser, Debug)]
#[command(name = "rb-relay")]
#[command(about = "WebSocket publish/subscribe relay for rulebridge")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Username clients must present (requires --password)
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// Password clients must present (requires --username)
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting rb-relay");
    info!("  Bind address: {}", args.bind);

    let credentials = match (args.username, args.password) {
        (Some(username), Some(password)) => {
            info!("  Authentication: enabled");
            Some(Credentials { username, password })
        }
        _ => None,
    };

    let state = RelayState::new(credentials);
    server::run(args.bind, state).await?;

    Ok(())
}
