//! Directed edges between workflow nodes.

use nebula_core::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The default port name used when a connection does not name one explicitly.
pub const DEFAULT_PORT: &str = "main";

/// A directed edge from one node's output port to another node's input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique identifier for this connection.
    pub id: Uuid,
    /// The node this connection originates from.
    pub source_node_id: NodeId,
    /// The output port on the source node (defaults to `"main"`).
    #[serde(default = "default_port")]
    pub source_output: String,
    /// The node this connection terminates at.
    pub target_node_id: NodeId,
    /// The input port on the target node (defaults to `"main"`).
    #[serde(default = "default_port")]
    pub target_input: String,
}

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

impl Connection {
    /// Build a plain `main -> main` connection between two nodes.
    #[must_use]
    pub fn new(source_node_id: NodeId, target_node_id: NodeId) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_node_id,
            source_output: DEFAULT_PORT.to_string(),
            target_node_id,
            target_input: DEFAULT_PORT.to_string(),
        }
    }

    /// Build a connection from a named output port to a named input port.
    #[must_use]
    pub fn with_ports(
        source_node_id: NodeId,
        source_output: impl Into<String>,
        target_node_id: NodeId,
        target_input: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_node_id,
            source_output: source_output.into(),
            target_node_id,
            target_input: target_input.into(),
        }
    }

    /// Returns `true` if this connection's source and target are the same node.
    #[must_use]
    pub fn is_self_connection(&self) -> bool {
        self.source_node_id == self.target_node_id
    }
}
