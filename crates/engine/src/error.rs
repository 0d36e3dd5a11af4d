//! Engine-level error taxonomy (spec §7).
//!
//! Distinct from [`nebula_execution::ExecutionError`], which only validates
//! state transitions: these variants cover planning and scheduling failures
//! the Flow Execution Engine itself can hit.

use nebula_core::NodeId;
use nebula_execution::ExecutionError;
use nebula_workflow::WorkflowError;
use thiserror::Error;

use crate::executor::NodeExecutorError;

/// Errors the Flow Execution Engine can produce.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested starting node is not part of the workflow.
    #[error("start node not found: {0}")]
    StartNodeNotFound(NodeId),

    /// The per-trigger execution scope contains a cycle.
    #[error("workflow scope contains a cycle")]
    WorkflowCycle,

    /// A workflow-structure violation other than a cycle.
    #[error("workflow planning error: {0}")]
    Planning(WorkflowError),

    /// A node's dependencies never all reached a terminal state within the
    /// per-node requeue attempt budget.
    #[error("node {0} dependencies could not be satisfied")]
    DependencyUnsatisfiable(NodeId),

    /// A loop node produced neither `loop` nor `done` items on an invocation.
    #[error("loop node {0} produced no loop or done items")]
    LoopStuck(NodeId),

    /// A loop node exceeded the configured iteration cap.
    #[error("loop node {0} exceeded its iteration limit")]
    LoopIterationLimit(NodeId),

    /// A node executor returned a hard (non-domain) failure.
    #[error("node {node_id} failed: {source}")]
    NodeFailure {
        /// The node that failed.
        node_id: NodeId,
        /// The underlying executor error.
        source: NodeExecutorError,
    },

    /// An execution-state transition was invalid; indicates an engine bug.
    #[error("execution state error: {0}")]
    State(#[from] ExecutionError),
}

pub(crate) fn map_workflow_error(error: WorkflowError) -> EngineError {
    match error {
        WorkflowError::Cycle => EngineError::WorkflowCycle,
        other => EngineError::Planning(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_cycle_maps_from_workflow_error() {
        assert!(matches!(
            map_workflow_error(WorkflowError::Cycle),
            EngineError::WorkflowCycle
        ));
    }

    #[test]
    fn other_workflow_errors_map_to_planning() {
        let id = NodeId::v4();
        assert!(matches!(
            map_workflow_error(WorkflowError::StartNodeNotFound(id)),
            EngineError::Planning(WorkflowError::StartNodeNotFound(_))
        ));
    }

    #[test]
    fn display_messages() {
        let id = NodeId::v4();
        assert!(
            EngineError::DependencyUnsatisfiable(id)
                .to_string()
                .contains("dependencies could not be satisfied")
        );
        assert!(
            EngineError::LoopStuck(id)
                .to_string()
                .contains("no loop or done items")
        );
    }
}
