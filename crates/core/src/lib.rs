// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rb-core: Shared library for the rulebridge broker/store bridge
//!
//! This crate provides the path model, routing rules, de-duplication caches,
//! document store seam, and broker wire protocol used by both the
//! `rulebridged` daemon and the `rb-relay` server.

pub mod cache;
pub mod clock;
pub mod error;
pub mod file_store;
pub mod path;
pub mod protocol;
pub mod rule;
pub mod ruleset;
pub mod store;
pub mod tree;

pub use cache::{ChangeCache, PromotionTracker};
pub use clock::{stamp_payload, ClockSource, FixedClock, MonotonicClock, SystemClock};
pub use error::{Error, Result};
pub use file_store::FileStore;
pub use path::StorePath;
pub use rule::{Direction, RuleFile, SyncRule};
pub use ruleset::RuleSet;
pub use store::{
    value_to_payload, ChangeEvent, DocumentStore, FieldUpdate, MemoryStore, StoreFuture,
    Subscription,
};
pub use tree::DocTree;
