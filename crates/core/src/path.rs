// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical store addresses.
//!
//! A [`StorePath`] decomposes a slash-separated address into a collection
//! path, a document and a field:
//!
//! | segments | collection_path        | document       | field      |
//! |----------|------------------------|----------------|------------|
//! | 0 or 1   | empty                  | empty          | the segment|
//! | 2        | first                  | second         | empty      |
//! | ≥3       | all but the last two   | second-to-last | last       |
//!
//! Two segmentations exist and are deliberately kept apart:
//! [`literal_segments`] keeps internal empty segments (used when parsing),
//! [`compact_segments`] drops them (used by [`StorePath::shift`] and
//! [`StorePath::is_odd`]). They disagree on addresses with doubled slashes.

use std::fmt;

/// Splits an address after trimming outer slashes, keeping empty segments.
pub fn literal_segments(raw: &str) -> Vec<&str> {
    raw.trim_matches('/').split('/').collect()
}

/// Splits an address and drops every empty segment.
pub fn compact_segments(raw: &str) -> Vec<&str> {
    raw.split('/').filter(|s| !s.is_empty()).collect()
}

/// A parsed store address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorePath {
    source: String,
    collection_path: String,
    document: String,
    field: String,
}

impl StorePath {
    /// Parses an address. Never fails; facets are assigned best-effort.
    pub fn parse(raw: &str) -> Self {
        let parts = literal_segments(raw);
        let n = parts.len();

        let (collection_path, document, field) = if n >= 3 {
            (
                parts[..n - 2].join("/"),
                parts[n - 2].to_string(),
                parts[n - 1].to_string(),
            )
        } else if n == 2 {
            (parts[0].to_string(), parts[1].to_string(), String::new())
        } else {
            (
                String::new(),
                String::new(),
                parts.first().map(|s| s.to_string()).unwrap_or_default(),
            )
        };

        StorePath {
            source: raw.to_string(),
            collection_path,
            document,
            field,
        }
    }

    /// The address this path was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn collection_path(&self) -> &str {
        &self.collection_path
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns `collection_path/document`, omitting the field.
    pub fn path_with_document(&self) -> String {
        join_non_empty(&[&self.collection_path, &self.document])
    }

    /// Moves the path one level down: the document joins the collection
    /// path, the field becomes the document, the field is cleared.
    ///
    /// Without `confirm` the path is first re-parsed from its own string
    /// form, so chaining unconfirmed shifts behaves the same every time.
    /// Paths with two or fewer (non-empty) segments are returned unchanged.
    pub fn shift(&self, confirm: bool) -> StorePath {
        if compact_segments(&self.source).len() <= 2 {
            return self.clone();
        }

        if !confirm {
            return StorePath::parse(&self.to_string()).shift(true);
        }

        let mut shifted = self.clone();
        let previous_document = std::mem::take(&mut shifted.document);
        shifted.document = std::mem::take(&mut shifted.field);

        if !previous_document.is_empty() {
            if shifted.collection_path.is_empty() {
                shifted.collection_path = previous_document;
            } else {
                shifted.collection_path.push('/');
                shifted.collection_path.push_str(&previous_document);
            }
        }

        shifted
    }

    /// True when the number of non-empty segments in the source is odd.
    pub fn is_odd(&self) -> bool {
        compact_segments(&self.source).len() % 2 != 0
    }

    /// Last non-empty segment of the source, if any.
    pub fn last_segment(&self) -> Option<&str> {
        compact_segments(&self.source).last().copied()
    }

    /// Name used for indexed entries under a promoted reference: the
    /// second-to-last segment (the sub-collection), or the only one.
    pub fn entry_stem(&self) -> Option<&str> {
        let parts = compact_segments(&self.source);
        match parts.len() {
            0 => None,
            1 => Some(parts[0]),
            n => Some(parts[n - 2]),
        }
    }

    /// Splits the address into its parent address and final segment.
    pub fn parent_and_name(&self) -> Option<(String, String)> {
        let parts = compact_segments(&self.source);
        let (name, parent) = parts.split_last()?;
        Some((parent.join("/"), name.to_string()))
    }

    /// Appends a child segment to the normalized address.
    pub fn child(&self, name: &str) -> String {
        join_non_empty(&[&self.to_string(), name])
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_non_empty(&[
            &self.collection_path,
            &self.document,
            &self.field,
        ]))
    }
}

impl From<&str> for StorePath {
    fn from(raw: &str) -> Self {
        StorePath::parse(raw)
    }
}

fn join_non_empty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
