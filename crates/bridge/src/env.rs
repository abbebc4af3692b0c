// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `RULEBRIDGE_CONFIG` if set and non-empty.
pub fn config_path() -> Option<PathBuf> {
    non_empty(vars::RULEBRIDGE_CONFIG).map(PathBuf::from)
}

/// Returns the value of `RULEBRIDGE_LOG_FILE` if set and non-empty.
pub fn log_file() -> Option<PathBuf> {
    non_empty(vars::RULEBRIDGE_LOG_FILE).map(PathBuf::from)
}

/// Returns `true` if `RUST_LOG` is set, in which case it overrides `-v`.
pub fn rust_log_set() -> bool {
    std::env::var(vars::RUST_LOG).is_ok()
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
