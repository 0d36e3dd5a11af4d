//! Workflow node definitions.

use nebula_core::NodeId;
use serde::{Deserialize, Serialize};

/// Per-node settings recognized by the engine.
///
/// Unknown keys are preserved via `extra` so a workflow round-trips
/// losslessly even when a node carries settings only a node-type plug-in
/// understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSettings {
    /// If true, a `{success:false, data}` result is treated as success
    /// and the emitted `data` is routed downstream (§4.4.3).
    #[serde(default)]
    pub continue_on_fail: bool,
    /// Hint for compact rendering in the editor; not interpreted by the engine.
    #[serde(default)]
    pub compact: bool,
    /// Credential references consumed by the node-type plug-in (opaque ids).
    #[serde(default)]
    pub credentials: std::collections::HashMap<String, String>,
    /// Unrecognized settings, preserved for round-trip fidelity.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within the owning workflow.
    pub id: NodeId,
    /// The node-type tag (e.g. `"http-request"`, `"if"`, `"loop"`); resolved
    /// by the [`crate::Workflow`]'s consumer against a node-type registry.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Human-readable name, shown in the editor and in logs.
    pub name: String,
    /// Opaque parameters consumed by the node-type plug-in. The engine never
    /// inspects this value.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// If true, the node is excluded from the graph at validation time.
    #[serde(default)]
    pub disabled: bool,
    /// Per-node settings.
    #[serde(default)]
    pub settings: NodeSettings,
}

impl Node {
    /// Build a minimal node with empty parameters and default settings.
    #[must_use]
    pub fn new(id: NodeId, node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            name: name.into(),
            parameters: serde_json::Value::Null,
            disabled: false,
            settings: NodeSettings::default(),
        }
    }

    /// Returns `true` if this node's declared type is the loop-node type
    /// driven by the engine's inner iteration loop (§4.4.4).
    #[must_use]
    pub fn is_loop_node(&self) -> bool {
        self.node_type == "loop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_has_default_settings() {
        let node = Node::new(NodeId::v4(), "http-request", "Fetch");
        assert!(!node.disabled);
        assert!(!node.settings.continue_on_fail);
    }

    #[test]
    fn loop_node_detected_by_type() {
        let node = Node::new(NodeId::v4(), "loop", "Iterate");
        assert!(node.is_loop_node());
        let not_loop = Node::new(NodeId::v4(), "http-request", "Fetch");
        assert!(!not_loop.is_loop_node());
    }

    #[test]
    fn node_type_serializes_as_type_field() {
        let node = Node::new(NodeId::v4(), "if", "Branch");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "if");
    }

    #[test]
    fn settings_round_trip_unknown_keys() {
        let json = serde_json::json!({
            "continue_on_fail": true,
            "some_future_flag": "keep-me"
        });
        let settings: NodeSettings = serde_json::from_value(json).unwrap();
        assert!(settings.continue_on_fail);
        assert_eq!(
            settings.extra.get("some_future_flag").unwrap(),
            "keep-me"
        );

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["some_future_flag"], "keep-me");
    }

    #[test]
    fn serde_roundtrip_node() {
        let mut node = Node::new(NodeId::v4(), "loop", "Iterate");
        node.parameters = serde_json::json!({"batchSize": 10});
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
