//! Execution lifecycle events (spec §4.6).
//!
//! These events are emitted by the Flow Execution Engine as executions
//! progress. They are projections, **not** the source of truth — the
//! Schedule Persistence Layer's execution state is authoritative.

use std::time::Duration;

use nebula_core::{ExecutionId, NodeId, TriggerId, WorkflowId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExecutionEvent {
    /// An execution has started.
    ExecutionStarted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The workflow identifier.
        workflow_id: WorkflowId,
        /// The node the triggering event entered through.
        trigger_node_id: NodeId,
    },
    /// A node within an execution has started.
    NodeStarted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
    },
    /// A node within an execution has completed.
    NodeCompleted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
        /// How long the node took.
        duration: Duration,
        /// Ids of the outgoing connections that received non-empty data
        /// and will therefore be activated (spec §4.4.2 branch gating).
        active_connection_ids: Vec<Uuid>,
    },
    /// A node within an execution has failed.
    NodeFailed {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
        /// Error description.
        error: String,
    },
    /// An execution has completed with no node failures.
    ExecutionCompleted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// Total execution duration.
        duration: Duration,
    },
    /// An execution ended with at least one node failure it could not
    /// recover from (or ran zero nodes to completion).
    ExecutionFailed {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// Error description.
        error: String,
    },
    /// An execution was cancelled before reaching a terminal state.
    ExecutionCancelled {
        /// The execution identifier.
        execution_id: ExecutionId,
    },
    /// A webhook trigger was fired in test mode (spec §6), bypassing
    /// normal execution bookkeeping.
    WebhookTestTriggered {
        /// The trigger identifier.
        trigger_id: TriggerId,
        /// The workflow identifier the trigger belongs to.
        workflow_id: WorkflowId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tag_is_kebab_case() {
        let event = ExecutionEvent::ExecutionStarted {
            execution_id: ExecutionId::v4(),
            workflow_id: WorkflowId::v4(),
            trigger_node_id: NodeId::v4(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "execution-started");
    }

    #[test]
    fn execution_event_serialization_roundtrip() {
        let events = vec![
            ExecutionEvent::ExecutionStarted {
                execution_id: ExecutionId::v4(),
                workflow_id: WorkflowId::v4(),
                trigger_node_id: NodeId::v4(),
            },
            ExecutionEvent::NodeCompleted {
                execution_id: ExecutionId::v4(),
                node_id: NodeId::v4(),
                duration: Duration::from_millis(1500),
                active_connection_ids: vec![Uuid::new_v4()],
            },
            ExecutionEvent::ExecutionFailed {
                execution_id: ExecutionId::v4(),
                error: "timeout".into(),
            },
            ExecutionEvent::ExecutionCancelled {
                execution_id: ExecutionId::v4(),
            },
            ExecutionEvent::WebhookTestTriggered {
                trigger_id: TriggerId::v4(),
                workflow_id: WorkflowId::v4(),
            },
        ];

        for event in events {
            let json = serde_json::to_string(&event).expect("serialize");
            let roundtrip: ExecutionEvent = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(event, roundtrip);
        }
    }
}
