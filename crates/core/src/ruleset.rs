// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared registry of active rules.
//!
//! One reference-counted [`RuleSet`] is built at startup and cloned into
//! every sync channel. Readers take copies ([`RuleSet::snapshot`]) so no
//! lock is ever held across an await; a promotion rewrite takes the write
//! lock for the in-memory change and the persisted rewrite together.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::rule::{Direction, RuleFile, SyncRule};

/// Shared, lock-protected list of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    inner: Arc<RuleSetInner>,
}

#[derive(Debug, Default)]
struct RuleSetInner {
    rules: RwLock<Vec<SyncRule>>,
    /// Where rewritten rules are persisted, if anywhere.
    file: Option<RuleFile>,
}

impl RuleSet {
    /// Creates an in-memory rule set. References are stored trimmed.
    pub fn new(rules: Vec<SyncRule>) -> Self {
        RuleSet {
            inner: Arc::new(RuleSetInner {
                rules: RwLock::new(normalize(rules)),
                file: None,
            }),
        }
    }

    /// Loads rules from a file and keeps the file for later rewrites.
    pub fn load(file: RuleFile) -> Result<Self> {
        let rules = file.load()?;
        Ok(RuleSet {
            inner: Arc::new(RuleSetInner {
                rules: RwLock::new(normalize(rules)),
                file: Some(file),
            }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<SyncRule>> {
        self.inner.rules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<SyncRule>> {
        self.inner.rules.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the whole list, in load order.
    pub fn snapshot(&self) -> Vec<SyncRule> {
        self.read().clone()
    }

    /// Copy of the rules flowing in one direction, with their indices.
    pub fn snapshot_direction(&self, direction: Direction) -> Vec<(usize, SyncRule)> {
        self.read()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.direction == direction)
            .map(|(i, r)| (i, r.clone()))
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<SyncRule> {
        self.read().get(index).cloned()
    }

    /// First rule in `direction` whose topic equals `topic`.
    pub fn find_by_topic(&self, topic: &str, direction: Direction) -> Option<(usize, SyncRule)> {
        self.read()
            .iter()
            .enumerate()
            .find(|(_, r)| r.direction == direction && r.topic == topic)
            .map(|(i, r)| (i, r.clone()))
    }

    /// First rule in `direction` whose source reference equals `reference`.
    pub fn find_by_reference(
        &self,
        reference: &str,
        direction: Direction,
    ) -> Option<(usize, SyncRule)> {
        self.read()
            .iter()
            .enumerate()
            .find(|(_, r)| r.direction == direction && r.source_reference == reference)
            .map(|(i, r)| (i, r.clone()))
    }

    /// Distinct non-empty topics of the rules in `direction`, in list order.
    pub fn topics(&self, direction: Direction) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for rule in self.read().iter().filter(|r| r.direction == direction) {
            if !rule.topic.is_empty() && !topics.contains(&rule.topic) {
                topics.push(rule.topic.clone());
            }
        }
        topics
    }

    /// Appends a rule and returns its index.
    pub fn push(&self, rule: SyncRule) -> usize {
        let mut rules = self.write();
        rules.push(rule.normalized());
        rules.len() - 1
    }

    /// Replaces one rule's source reference and persists the full list.
    ///
    /// Returns the list as it was persisted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleNotFound`] for a bad index; persistence errors
    /// leave the in-memory rewrite in place.
    pub fn rewrite_reference(&self, index: usize, reference: &str) -> Result<Vec<SyncRule>> {
        let mut rules = self.write();
        let rule = rules.get_mut(index).ok_or(Error::RuleNotFound(index))?;
        rule.source_reference = reference.to_string();

        let list = rules.clone();
        if let Some(file) = &self.inner.file {
            file.save(&list)?;
        }
        Ok(list)
    }

    pub fn file(&self) -> Option<&RuleFile> {
        self.inner.file.as_ref()
    }
}

fn normalize(rules: Vec<SyncRule>) -> Vec<SyncRule> {
    rules.into_iter().map(SyncRule::normalized).collect()
}

#[cfg(test)]
#[path = "ruleset_tests.rs"]
mod tests;
