// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! Configuration is stored in `config.toml` and has three sections:
//! - `[broker]`: relay URL, optional credentials, client id, reconnect delay
//! - `[store]`: which document store backend to use and where it lives
//! - `[sync]`: the rules file, poll interval and reverse delivery mode
//!
//! A missing file is written out with defaults. Relative paths resolve
//! against the directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default config file name, used when neither `--config` nor the
/// environment names one.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Daemon configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Relay URL, `ws://...` or `wss://...`.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Client identifier sent in `hello`. Generated when empty.
    #[serde(default)]
    pub client_id: String,
    /// Fixed delay between reconnect attempts in seconds (default: 5).
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_url() -> String {
    "ws://127.0.0.1:7890".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            url: default_url(),
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl BrokerConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// The document store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// JSON file on disk, polled.
    #[default]
    File,
    /// In-process tree with change notifications. Not persisted.
    Memory,
}

/// Document store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// Tree file for the `file` backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("store.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            kind: StoreKind::default(),
            path: default_store_path(),
        }
    }
}

/// How store changes reach the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReverseMode {
    /// Push when the store supports change notifications, else poll.
    #[default]
    Auto,
    Poll,
    Push,
}

/// Sync engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// JSON rules file.
    #[serde(default = "default_rules_path")]
    pub rules: PathBuf,
    /// Reverse poll interval in milliseconds (default: 3000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub reverse_mode: ReverseMode,
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("rules.json")
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            rules: default_rules_path(),
            poll_interval_ms: default_poll_interval_ms(),
            reverse_mode: ReverseMode::default(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed TOML or unknown enum values.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Loads configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Loads configuration from `path`, writing the defaults there first if
    /// the file does not exist. Paths are resolved and values validated.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            Config::default().save(path)?;
            tracing::info!("wrote default config to {}", path.display());
        }

        let mut config = Self::load(path)?;
        config.validate()?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        Ok(config)
    }

    /// Saves configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Makes relative store and rules paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.store.path = resolve(base, &self.store.path);
        self.sync.rules = resolve(base, &self.sync.rules);
    }

    /// Checks values that parse fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBrokerUrl`] or [`Error::ZeroInterval`].
    pub fn validate(&self) -> Result<()> {
        let url = &self.broker.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(Error::InvalidBrokerUrl(url.clone()));
        }
        if self.broker.reconnect_delay_secs == 0 {
            return Err(Error::ZeroInterval("broker.reconnect_delay_secs"));
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(Error::ZeroInterval("sync.poll_interval_ms"));
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
