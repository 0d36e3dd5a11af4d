//! The workflow aggregate: nodes, connections, triggers, and settings.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use nebula_core::{NodeId, UserId, WorkflowId};
use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::error::WorkflowError;
use crate::graph::validate_connections;
use crate::node::Node;
use crate::settings::WorkflowSettings;
use crate::trigger::TriggerDefinition;

/// A workflow definition: the persisted, versionless unit a trigger fires
/// into the Flow Execution Engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier.
    pub id: WorkflowId,
    /// Owning user.
    pub owner_id: UserId,
    /// Whether this workflow's triggers are currently registered/firing.
    pub active: bool,
    /// Nodes, in authoring order.
    pub nodes: Vec<Node>,
    /// Directed edges between nodes.
    pub connections: Vec<Connection>,
    /// Declared entry points.
    pub triggers: Vec<TriggerDefinition>,
    /// Recognized and passthrough settings.
    #[serde(default)]
    pub settings: WorkflowSettings,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Build a new, empty, inactive workflow.
    #[must_use]
    pub fn new(id: WorkflowId, owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            active: false,
            nodes: Vec::new(),
            connections: Vec::new(),
            triggers: Vec::new(),
            settings: WorkflowSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// The set of all node ids declared by this workflow.
    #[must_use]
    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Validate structural invariants (spec §3): no duplicate node ids,
    /// no dangling/self connections, the graph is acyclic, and every
    /// trigger references a real node.
    ///
    /// # Errors
    /// Returns the first [`WorkflowError`] encountered.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(WorkflowError::DuplicateNodeId(node.id));
            }
        }

        let known = self.node_ids();
        validate_connections(&known, &self.connections)?;

        for trigger in &self.triggers {
            if !known.contains(&trigger.node_id()) {
                return Err(WorkflowError::UnknownTriggerNode(trigger.node_id()));
            }
        }

        Ok(())
    }

    /// Active triggers declared by this workflow.
    pub fn active_triggers(&self) -> impl Iterator<Item = &TriggerDefinition> {
        self.triggers.iter().filter(|t| t.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn sample_workflow() -> Workflow {
        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let a = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let b = Node::new(NodeId::v4(), "http-request", "Fetch");
        wf.connections.push(Connection::new(a.id, b.id));
        wf.nodes.push(a);
        wf.nodes.push(b);
        wf
    }

    #[test]
    fn new_workflow_is_inactive_and_empty() {
        let wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        assert!(!wf.active);
        assert!(wf.nodes.is_empty());
    }

    #[test]
    fn validate_accepts_well_formed_workflow() {
        let wf = sample_workflow();
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_node_ids() {
        let mut wf = sample_workflow();
        let dup_id = wf.nodes[0].id;
        wf.nodes.push(Node::new(dup_id, "noop", "Duplicate"));
        assert_eq!(
            wf.validate().unwrap_err(),
            WorkflowError::DuplicateNodeId(dup_id)
        );
    }

    #[test]
    fn validate_rejects_unknown_trigger_node() {
        let mut wf = sample_workflow();
        wf.triggers.push(TriggerDefinition::Manual {
            id: nebula_core::TriggerId::v4(),
            node_id: NodeId::v4(),
            active: true,
        });
        assert!(matches!(
            wf.validate().unwrap_err(),
            WorkflowError::UnknownTriggerNode(_)
        ));
    }

    #[test]
    fn active_triggers_filters_inactive() {
        let mut wf = sample_workflow();
        let start = wf.nodes[0].id;
        wf.triggers.push(TriggerDefinition::Manual {
            id: nebula_core::TriggerId::v4(),
            node_id: start,
            active: true,
        });
        wf.triggers.push(TriggerDefinition::Manual {
            id: nebula_core::TriggerId::v4(),
            node_id: start,
            active: false,
        });
        assert_eq!(wf.active_triggers().count(), 1);
    }

    #[test]
    fn serde_roundtrip_preserves_node_and_connection_sets() {
        let wf = sample_workflow();
        let json = serde_json::to_string(&wf).unwrap();
        let back: Workflow = serde_json::from_str(&json).unwrap();

        let mut original_nodes = wf.node_ids().into_iter().collect::<Vec<_>>();
        let mut reloaded_nodes = back.node_ids().into_iter().collect::<Vec<_>>();
        original_nodes.sort();
        reloaded_nodes.sort();
        assert_eq!(original_nodes, reloaded_nodes);
        assert_eq!(back.connections.len(), wf.connections.len());
        assert_eq!(back.triggers.len(), wf.triggers.len());
    }
}
