// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for rb-core operations.

use thiserror::Error;

/// All possible errors that can occur in rb-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("rule has an empty source reference (topic '{topic}')\n  hint: set sourceReference in the rules file")]
    EmptyReference { topic: String },

    #[error("rule has an empty topic (reference '{reference}')\n  hint: set topic in the rules file")]
    EmptyTopic { reference: String },

    #[error("rule index out of range: {0}")]
    RuleNotFound(usize),

    #[error("cannot address the store root with a value write")]
    RootWrite,

    #[error("listening is not supported by the {0} store")]
    ListenUnsupported(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for rb-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
