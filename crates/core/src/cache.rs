// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory memos kept by the sync channels.
//!
//! - [`ChangeCache`]: last value seen per watched path; the only gate that
//!   keeps the reverse direction from re-publishing unchanged data.
//! - [`PromotionTracker`]: number of entries written under each promoted
//!   reference, used to pick the next entry index.
//!
//! Both are keyed maps behind a mutex so diagnostics may read them while the
//! owning channel writes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Last observed value per path.
#[derive(Debug, Default)]
pub struct ChangeCache {
    values: Mutex<HashMap<String, String>>,
}

impl ChangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records `value` and returns true when it differs from the last value
    /// recorded for `path` (or nothing was recorded yet). Returns false with
    /// no side effect otherwise.
    pub fn should_publish(&self, path: &str, value: &str) -> bool {
        let mut values = self.lock();
        match values.get(path) {
            Some(previous) if previous == value => false,
            _ => {
                values.insert(path.to_string(), value.to_string());
                true
            }
        }
    }

    /// Drops what was recorded for `path` if it is still `value`, so the
    /// next [`ChangeCache::should_publish`] for it returns true.
    pub fn forget(&self, path: &str, value: &str) {
        let mut values = self.lock();
        if values.get(path).is_some_and(|recorded| recorded == value) {
            values.remove(path);
        }
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.lock().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Entry counts per promoted reference.
#[derive(Debug, Default)]
pub struct PromotionTracker {
    counts: Mutex<HashMap<String, u64>>,
}

impl PromotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<u64> {
        self.lock().get(path).copied()
    }

    /// Sets the count, creating the entry if needed.
    pub fn set(&self, path: &str, count: u64) {
        self.lock().insert(path.to_string(), count);
    }

    /// Adds one entry and returns the new count.
    pub fn increment(&self, path: &str) -> u64 {
        let mut counts = self.lock();
        let count = counts.entry(path.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Undoes one [`PromotionTracker::increment`] after a failed write.
    pub fn revert(&self, path: &str) {
        if let Some(count) = self.lock().get_mut(path) {
            *count = count.saturating_sub(1);
        }
    }

    /// Zero-based index for the entry matching the current count:
    /// `max(0, count - 1)`.
    pub fn next_index(&self, path: &str) -> u64 {
        self.get(path).unwrap_or(0).saturating_sub(1)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
