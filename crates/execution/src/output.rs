//! The Standardized Node Output — the invariant shape every node-type
//! plug-in's return value is normalized into (spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single unit of data flowing between nodes.
///
/// Mirrors the `{json, binary?}` item shape the node-invocation contract
/// (§4.4.1) passes around: structured JSON plus optional attached binary
/// entries (e.g. a file uploaded through the webhook router, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The item's structured data.
    pub json: serde_json::Value,
    /// Attached binary data, keyed by property name (e.g. `binary_property`
    /// from webhook options).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<HashMap<String, BinaryData>>,
}

impl Item {
    /// Build an item carrying only JSON data.
    #[must_use]
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            json: value,
            binary: None,
        }
    }

    /// Returns `true` if this item carries the `_httpResponse` sentinel
    /// flag used by the webhook router's `last-node` response mode (§4.1).
    #[must_use]
    pub fn is_http_response(&self) -> bool {
        self.json
            .get("_httpResponse")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// A base64-encoded binary attachment (spec §6 file-upload shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryData {
    /// Base64-encoded content.
    pub data: String,
    /// MIME type, e.g. `"image/png"`.
    pub mime_type: String,
    /// Original file name, if known.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Size of the decoded content in bytes.
    pub file_size: u64,
}

/// Descriptive metadata attached to every [`NodeOutput`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputMetadata {
    /// The producing node's declared type.
    pub node_type: String,
    /// Total item count across `main` (and, if present, every branch).
    pub output_count: usize,
    /// Whether `branches` is present and non-empty.
    pub has_multiple_branches: bool,
}

/// The Standardized Node Output: every node-type plug-in's result is
/// normalized into this shape before the engine routes it downstream.
///
/// For branching nodes (if/switch/loop) `branches` carries per-port data
/// and `main` is the concatenation of all branches, kept for nodes that
/// only look at `main`. For non-branching nodes `branches` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// The concatenated output, used by non-branch-aware consumers.
    pub main: Vec<Item>,
    /// Per-port output, present only for branching nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<HashMap<String, Vec<Item>>>,
    /// Descriptive metadata.
    pub metadata: OutputMetadata,
}

impl NodeOutput {
    /// Build a plain, non-branching output from a list of items.
    #[must_use]
    pub fn plain(node_type: impl Into<String>, items: Vec<Item>) -> Self {
        let output_count = items.len();
        Self {
            main: items,
            branches: None,
            metadata: OutputMetadata {
                node_type: node_type.into(),
                output_count,
                has_multiple_branches: false,
            },
        }
    }

    /// Build a branching output. `main` is computed as the concatenation of
    /// every branch, in the given iteration order.
    #[must_use]
    pub fn branching(
        node_type: impl Into<String>,
        branches: HashMap<String, Vec<Item>>,
    ) -> Self {
        let main: Vec<Item> = branches.values().flat_map(|items| items.clone()).collect();
        let output_count = main.len();
        Self {
            main,
            branches: Some(branches),
            metadata: OutputMetadata {
                node_type: node_type.into(),
                output_count,
                has_multiple_branches: true,
            },
        }
    }

    /// The items in a named branch, if this output carries branches and the
    /// named branch is present.
    #[must_use]
    pub fn branch(&self, name: &str) -> Option<&[Item]> {
        self.branches.as_ref()?.get(name).map(Vec::as_slice)
    }

    /// Whether the named branch/port carries any data at all — the branch
    /// gating test of §4.4.2. For non-branching outputs, any port name
    /// falls back to `main`'s non-emptiness.
    #[must_use]
    pub fn port_non_empty(&self, port: &str) -> bool {
        match &self.branches {
            Some(branches) => branches.get(port).is_some_and(|items| !items.is_empty()),
            None => !self.main.is_empty(),
        }
    }

    /// Find the first item across `main` carrying the `_httpResponse`
    /// sentinel flag (§4.1 last-node response mode).
    #[must_use]
    pub fn http_response_item(&self) -> Option<&Item> {
        self.main.iter().find(|item| item.is_http_response())
    }
}

/// The assembled input to a node invocation (spec §4.4.1): one sublist per
/// incoming connection, in a stable connection order. A node with no
/// incoming connections (a trigger node) receives an empty `main`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    /// One entry per incoming connection, each holding that connection's
    /// contributed items.
    pub main: Vec<Vec<Item>>,
}

impl NodeInput {
    /// An input with no incoming connections.
    #[must_use]
    pub fn empty() -> Self {
        Self { main: Vec::new() }
    }

    /// Flatten every incoming connection's items into a single list, in
    /// connection order. Most node types only care about the combined set.
    #[must_use]
    pub fn flattened(&self) -> Vec<Item> {
        self.main.iter().flat_map(|sub| sub.iter().cloned()).collect()
    }
}
