// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rulebridged - The rulebridge daemon.
//!
//! Connects to a broker relay and a document store and keeps them in sync
//! according to the rules file named in the config.
//!
//! Usage:
//!   rulebridged --config <path> [--log-file <path>] [-v]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rulebridge::config::CONFIG_FILE_NAME;
use rulebridge::{env, Bridge, Config, ShutdownGuard, WebSocketTransport};

/// rulebridged: broker/store sync daemon
#[derive(Parser, Debug)]
#[command(name = "rulebridged", version)]
#[command(about = "Rule-driven sync between a pub/sub broker and a document store")]
struct Args {
    /// Config file, created with defaults if missing [env: RULEBRIDGE_CONFIG]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr [env: RULEBRIDGE_LOG_FILE]
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_file = args.log_file.or_else(env::log_file);
    setup_logging(log_file.as_deref(), args.verbose);

    let config_path = args
        .config
        .or_else(env::config_path)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    tracing::info!("rulebridged starting, config={}", config_path.display());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(&config_path)) {
        Ok(()) => {
            tracing::info!("rulebridged stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(config_path: &Path) -> rulebridge::Result<()> {
    let config = Config::load_or_create(config_path)?;
    let bridge = Bridge::open(config)?;

    let guard = ShutdownGuard::new();
    let signals = guard.clone();
    tokio::spawn(async move {
        if let Err(e) = signals.wait_for_signal().await {
            tracing::error!("failed to listen for signals: {}", e);
            signals.trigger();
        }
    });

    bridge.run(WebSocketTransport::new(), guard).await
}

fn setup_logging(log_path: Option<&Path>, verbose: bool) {
    let level = if verbose && !env::rust_log_set() {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Try to open log file, fall back to stderr
    let file = log_path.and_then(|path| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    if let Some(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
