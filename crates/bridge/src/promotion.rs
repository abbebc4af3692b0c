// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scalar-to-collection promotion.
//!
//! Promoting the scalar at reference `r` turns it into a sub-collection with
//! one generated document `r/<id>`, whose entries the forward channel then
//! appends as `<stem>-<index>` next to a running `count`. The steps touch
//! the store, the rule list and the rules file, so they run behind an intent
//! marker persisted next to the rules file:
//!
//! 1. save the [`PendingPromotion`] marker
//! 2. create `r/<id>` with `count = 0`
//! 3. delete the original scalar from its parent
//! 4. rewrite the rule to `r/<id>` and persist the rules file
//! 5. clear the marker
//!
//! Every step after the marker is safe to repeat, so a marker found at
//! startup is completed by running steps 2-5 again.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use rb_core::{DocumentStore, FieldUpdate, RuleSet, StorePath};

use crate::error::Result;
use crate::id::{candidate, generate_id};

/// Name of the running entry count inside a promoted document.
pub const COUNT_FIELD: &str = "count";

/// A promotion that was started and not yet confirmed complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPromotion {
    pub rule_index: usize,
    /// The rule's reference before promotion.
    pub source_reference: String,
    pub document_id: String,
    /// The scalar being replaced, kept for the recovery log.
    #[serde(default)]
    pub previous_value: Option<Value>,
}

impl PendingPromotion {
    /// The reference the rule points at once promoted: `<r>/<id>`.
    pub fn promoted_reference(&self) -> String {
        promoted_reference(&self.source_reference, &self.document_id)
    }
}

/// Where a reference lands after promotion into document `id`.
pub fn promoted_reference(reference: &str, id: &str) -> String {
    StorePath::parse(reference).shift(false).child(id)
}

/// The intent marker file, `<rules file>.pending`.
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        MarkerFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The marker kept next to `rules`.
    pub fn for_rules(rules: &Path) -> Self {
        let mut name = OsString::from(rules.as_os_str());
        name.push(".pending");
        MarkerFile::new(PathBuf::from(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The pending promotion, if a marker exists.
    pub fn load(&self) -> Result<Option<PendingPromotion>> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(
                serde_json::from_str(&json).map_err(rb_core::Error::from)?,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, pending: &PendingPromotion) -> Result<()> {
        let json = serde_json::to_string_pretty(pending).map_err(rb_core::Error::from)?;
        let mut file = fs::File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Runs promotions against one store and rule set.
#[derive(Clone)]
pub struct Promoter {
    store: Arc<dyn DocumentStore>,
    rules: RuleSet,
    /// Absent when the rules live only in memory.
    marker: Option<MarkerFile>,
}

impl Promoter {
    /// A promoter whose marker sits next to the rule set's file, if any.
    pub fn new(store: Arc<dyn DocumentStore>, rules: RuleSet) -> Self {
        let marker = rules.file().map(|f| MarkerFile::for_rules(f.path()));
        Promoter {
            store,
            rules,
            marker,
        }
    }

    pub fn marker(&self) -> Option<&MarkerFile> {
        self.marker.as_ref()
    }

    /// Promotes the scalar at `reference`, the reference of rule
    /// `rule_index`. Returns the rule's new reference.
    pub async fn promote(&self, rule_index: usize, reference: &str) -> Result<String> {
        let previous_value = self.store.read(reference).await?;
        let document_id = self.unique_document_id(reference).await?;

        let pending = PendingPromotion {
            rule_index,
            source_reference: reference.to_string(),
            document_id,
            previous_value,
        };
        if let Some(marker) = &self.marker {
            marker.save(&pending)?;
        }

        let promoted = self.complete(&pending).await?;
        info!("promoted {} to {}", reference, promoted);
        Ok(promoted)
    }

    /// Completes a promotion left behind by a previous run.
    ///
    /// Returns the promoted reference when a marker was found.
    pub async fn recover_pending(&self) -> Result<Option<String>> {
        let Some(marker) = &self.marker else {
            return Ok(None);
        };
        let Some(pending) = marker.load()? else {
            return Ok(None);
        };

        warn!(
            "completing interrupted promotion of {} (previous value {})",
            pending.source_reference,
            pending
                .previous_value
                .as_ref()
                .map_or_else(|| "none".to_string(), |v| v.to_string())
        );
        let promoted = self.complete(&pending).await?;
        Ok(Some(promoted))
    }

    /// Steps 2-5. Each one checks before acting, so reruns are harmless.
    async fn complete(&self, pending: &PendingPromotion) -> Result<String> {
        let promoted = pending.promoted_reference();

        // Create the document
        if self.store.read(&promoted).await?.is_none() {
            let count_path = format!("{}/{}", promoted, COUNT_FIELD);
            self.store.write(&count_path, Value::from(0u64)).await?;
        }

        // Drop the scalar
        if let Some((parent, name)) = StorePath::parse(&pending.source_reference).parent_and_name()
        {
            self.store
                .update(&parent, vec![(name, FieldUpdate::Delete)])
                .await?;
        }

        // Point the rule at the document
        let source = pending.source_reference.trim();
        match self.rules.get(pending.rule_index) {
            Some(rule) if rule.source_reference.trim() == source => {
                self.rules
                    .rewrite_reference(pending.rule_index, &promoted)?;
            }
            Some(rule) if rule.source_reference.trim() == promoted => {}
            Some(rule) => warn!(
                "rule {} now points at {}, not rewriting it to {}",
                pending.rule_index, rule.source_reference, promoted
            ),
            None => warn!("rule {} no longer exists", pending.rule_index),
        }

        if let Some(marker) = &self.marker {
            marker.clear()?;
        }
        Ok(promoted)
    }

    /// A document id with nothing stored under it yet.
    async fn unique_document_id(&self, reference: &str) -> Result<String> {
        let base_id = generate_id(reference, &Utc::now());
        let mut attempt = 0u32;
        loop {
            let id = candidate(&base_id, attempt);
            if self
                .store
                .read(&promoted_reference(reference, &id))
                .await?
                .is_none()
            {
                return Ok(id);
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

#[cfg(test)]
#[path = "promotion_tests.rs"]
mod tests;
