// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Routing rules and their persisted form.
//!
//! Rules are stored as a JSON array:
//!
//! ```json
//! [
//!   { "sourceReference": "devices/lamp1/power", "topic": "home/lamp1/set",
//!     "direction": true, "promote": false, "timestamp": false }
//! ]
//! ```
//!
//! `direction: true` routes broker → store, `false` routes store → broker.
//! Older files using `FirebaseReference` / `MQTT_topic` / `Direction` load too.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which way data flows for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Inbound broker messages are written to the store.
    BusToStore,
    /// Store values are published to the broker.
    #[default]
    StoreToBus,
}

impl Direction {
    /// The persisted boolean flag (true = broker → store).
    pub fn as_flag(self) -> bool {
        matches!(self, Direction::BusToStore)
    }

    pub fn from_flag(flag: bool) -> Self {
        if flag {
            Direction::BusToStore
        } else {
            Direction::StoreToBus
        }
    }
}

/// One point-to-point routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRule {
    /// Store address; rewritten in place when the rule's field is promoted.
    #[serde(alias = "FirebaseReference", default)]
    pub source_reference: String,
    /// Broker topic.
    #[serde(alias = "MQTT_topic", default)]
    pub topic: String,
    #[serde(alias = "Direction", default, with = "direction_flag")]
    pub direction: Direction,
    /// Append values as indexed entries of a sub-collection instead of
    /// overwriting a scalar.
    #[serde(default)]
    pub promote: bool,
    /// Stamp `|<unix seconds>` onto inbound payloads.
    #[serde(default)]
    pub timestamp: bool,
}

impl SyncRule {
    /// Creates a plain rule with promotion and timestamping disabled.
    pub fn new(
        source_reference: impl Into<String>,
        topic: impl Into<String>,
        direction: Direction,
    ) -> Self {
        SyncRule {
            source_reference: source_reference.into(),
            topic: topic.into(),
            direction,
            promote: false,
            timestamp: false,
        }
    }

    pub fn with_promote(mut self, promote: bool) -> Self {
        self.promote = promote;
        self
    }

    pub fn with_timestamp(mut self, timestamp: bool) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Strips surrounding whitespace from the source reference.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.source_reference.trim();
        if trimmed.len() != self.source_reference.len() {
            self.source_reference = trimmed.to_string();
        }
        self
    }

    /// Checks the rule for configuration errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyReference`] or [`Error::EmptyTopic`].
    pub fn validate(&self) -> Result<()> {
        if self.source_reference.trim().is_empty() {
            return Err(Error::EmptyReference {
                topic: self.topic.clone(),
            });
        }
        if self.topic.trim().is_empty() {
            return Err(Error::EmptyTopic {
                reference: self.source_reference.clone(),
            });
        }
        Ok(())
    }
}

mod direction_flag {
    use super::Direction;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(direction: &Direction, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bool(direction.as_flag())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Direction, D::Error> {
        Ok(Direction::from_flag(bool::deserialize(d)?))
    }
}

/// The JSON file rules are loaded from and persisted back to.
#[derive(Debug, Clone)]
pub struct RuleFile {
    path: PathBuf,
}

impl RuleFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        RuleFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the rule list.
    ///
    /// A missing file is created holding an empty list; an empty file
    /// yields no rules.
    pub fn load(&self) -> Result<Vec<SyncRule>> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&self.path, "[]\n")?;
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&self.path)?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&json)?)
    }

    /// Rewrites the whole list. Written to a sibling temp file first and
    /// renamed over the original.
    pub fn save(&self, rules: &[SyncRule]) -> Result<()> {
        let json = serde_json::to_string_pretty(rules)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
