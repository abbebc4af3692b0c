// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical document tree.
//!
//! Every node may hold a scalar value and named children at the same time,
//! which mirrors document stores where a field and a sub-collection of the
//! same name live side by side. A node with at least one child is
//! collection-like; the promotion flow depends on this.
//!
//! Serialized form:
//!
//! ```json
//! { "children": { "sensors": { "children": { "temp": {
//!     "children": { "value": { "value": "21.5" } } } } } } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::path::compact_segments;

/// One node of the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Node>,
}

impl Node {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    /// The node's scalar, or its children rendered as a JSON object.
    pub fn to_value(&self) -> Option<Value> {
        if let Some(value) = &self.value {
            return Some(value.clone());
        }
        if self.children.is_empty() {
            return None;
        }
        let object = self
            .children
            .iter()
            .filter_map(|(name, child)| child.to_value().map(|v| (name.clone(), v)))
            .collect::<serde_json::Map<_, _>>();
        Some(Value::Object(object))
    }
}

/// A partial change to one child of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Set the child's scalar.
    Set(Value),
    /// Clear the child's scalar; the child is removed if nothing is left.
    Delete,
}

/// The whole tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocTree {
    root: Node,
}

impl DocTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, path: &str) -> Option<&Node> {
        let mut node = &self.root;
        for segment in compact_segments(path) {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    fn node_mut_or_create(&mut self, path: &str) -> &mut Node {
        let mut node = &mut self.root;
        for segment in compact_segments(path) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node
    }

    /// Value at `path`: the scalar if set, else the subtree as an object.
    pub fn read(&self, path: &str) -> Option<Value> {
        self.node(path).and_then(Node::to_value)
    }

    /// Upserts the scalar at `path`, creating intermediate nodes.
    pub fn write(&mut self, path: &str, value: Value) -> Result<()> {
        if compact_segments(path).is_empty() {
            return Err(Error::RootWrite);
        }
        self.node_mut_or_create(path).value = Some(value);
        Ok(())
    }

    /// Applies field updates to the children of `path`.
    pub fn update(&mut self, path: &str, updates: &[(String, FieldUpdate)]) {
        let node = self.node_mut_or_create(path);
        for (name, update) in updates {
            match update {
                FieldUpdate::Set(value) => {
                    node.children.entry(name.clone()).or_default().value = Some(value.clone());
                }
                FieldUpdate::Delete => {
                    if let Some(child) = node.children.get_mut(name) {
                        child.value = None;
                        if child.is_empty() {
                            node.children.remove(name);
                        }
                    }
                }
            }
        }
        self.prune(path);
    }

    /// Removes the node at `path` with everything below it.
    ///
    /// Returns true if a node was removed. Deleting the root empties the tree.
    pub fn delete(&mut self, path: &str) -> bool {
        let segments = compact_segments(path);
        let Some((name, parents)) = segments.split_last() else {
            let existed = !self.root.is_empty();
            self.root = Node::default();
            return existed;
        };

        let mut node = &mut self.root;
        for segment in parents {
            match node.children.get_mut(*segment) {
                Some(child) => node = child,
                None => return false,
            }
        }
        let removed = node.children.remove(*name).is_some();
        if removed {
            self.prune(&parents.join("/"));
        }
        removed
    }

    /// True when the node at `path` has children.
    pub fn is_collection(&self, path: &str) -> bool {
        self.node(path).is_some_and(|n| !n.children.is_empty())
    }

    /// Number of children of `path` named `<stem>-<digits>`.
    pub fn entry_count(&self, path: &str, stem: &str) -> u64 {
        let prefix = format!("{stem}-");
        self.node(path).map_or(0, |node| {
            node.children
                .keys()
                .filter(|k| {
                    k.strip_prefix(&prefix)
                        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                })
                .count() as u64
        })
    }

    /// Drops empty nodes along `path`, deepest first.
    fn prune(&mut self, path: &str) {
        let segments = compact_segments(path);
        for depth in (1..=segments.len()).rev() {
            let (name, parents) = match segments[..depth].split_last() {
                Some(split) => split,
                None => return,
            };
            let mut node = &mut self.root;
            for segment in parents {
                match node.children.get_mut(*segment) {
                    Some(child) => node = child,
                    None => return,
                }
            }
            if node.children.get(*name).is_some_and(Node::is_empty) {
                node.children.remove(*name);
            } else {
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
