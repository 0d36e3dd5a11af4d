//! State machine transition validation for execution and node states.

use nebula_workflow::NodeState;

use crate::error::ExecutionError;
use crate::status::ExecutionStatus;

/// Returns `true` if the execution-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_execution(from: ExecutionStatus, to: ExecutionStatus) -> bool {
    matches!(
        (from, to),
        (ExecutionStatus::Created, ExecutionStatus::Running)
            | (ExecutionStatus::Running, ExecutionStatus::Paused)
            | (ExecutionStatus::Running, ExecutionStatus::Cancelling)
            | (ExecutionStatus::Running, ExecutionStatus::Completed)
            | (ExecutionStatus::Running, ExecutionStatus::Partial)
            | (ExecutionStatus::Running, ExecutionStatus::Failed)
            | (ExecutionStatus::Running, ExecutionStatus::TimedOut)
            | (ExecutionStatus::Paused, ExecutionStatus::Running)
            | (ExecutionStatus::Paused, ExecutionStatus::Cancelling)
            | (ExecutionStatus::Cancelling, ExecutionStatus::Cancelled)
            | (ExecutionStatus::Cancelling, ExecutionStatus::Partial)
            | (ExecutionStatus::Cancelling, ExecutionStatus::Failed)
    )
}

/// Validate an execution-level transition, returning an error if invalid.
pub fn validate_execution_transition(
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> Result<(), ExecutionError> {
    if can_transition_execution(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::invalid_execution_transition(from, to))
    }
}

/// Returns `true` if the node-level transition from `from` to `to` is valid.
///
/// There is no per-node retry state: the node vocabulary is the 7-state set
/// the Flow Execution Engine drives a node through in a single attempt
/// (spec §3). Schedule-level retry with backoff is a concern of the
/// trigger/schedule layer, not of a single node's lifecycle.
#[must_use]
pub fn can_transition_node(from: NodeState, to: NodeState) -> bool {
    matches!(
        (from, to),
        (NodeState::Idle, NodeState::Queued)
            | (NodeState::Idle, NodeState::Skipped)
            | (NodeState::Idle, NodeState::Cancelled)
            | (NodeState::Queued, NodeState::Running)
            | (NodeState::Queued, NodeState::Skipped)
            | (NodeState::Queued, NodeState::Cancelled)
            | (NodeState::Running, NodeState::Completed)
            | (NodeState::Running, NodeState::Failed)
            | (NodeState::Running, NodeState::Cancelled)
    )
}

/// Validate a node-level transition, returning an error if invalid.
pub fn validate_node_transition(from: NodeState, to: NodeState) -> Result<(), ExecutionError> {
    if can_transition_node(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_execution_transitions() {
        assert!(can_transition_execution(
            ExecutionStatus::Created,
            ExecutionStatus::Running
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::Completed
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::Partial
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::Failed
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::Paused
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Paused,
            ExecutionStatus::Running
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::Cancelling
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Cancelling,
            ExecutionStatus::Cancelled
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Cancelling,
            ExecutionStatus::Partial
        ));
        assert!(can_transition_execution(
            ExecutionStatus::Running,
            ExecutionStatus::TimedOut
        ));
    }

    #[test]
    fn invalid_execution_transitions() {
        assert!(!can_transition_execution(
            ExecutionStatus::Created,
            ExecutionStatus::Completed
        ));
        assert!(!can_transition_execution(
            ExecutionStatus::Completed,
            ExecutionStatus::Running
        ));
        assert!(!can_transition_execution(
            ExecutionStatus::Cancelled,
            ExecutionStatus::Running
        ));
        assert!(!can_transition_execution(
            ExecutionStatus::Created,
            ExecutionStatus::Created
        ));
    }

    #[test]
    fn validate_execution_transition_ok() {
        assert!(
            validate_execution_transition(ExecutionStatus::Created, ExecutionStatus::Running)
                .is_ok()
        );
    }

    #[test]
    fn validate_execution_transition_err() {
        let err =
            validate_execution_transition(ExecutionStatus::Completed, ExecutionStatus::Running)
                .unwrap_err();
        assert!(err.to_string().contains("invalid transition"));
    }

    #[test]
    fn valid_node_transitions() {
        assert!(can_transition_node(NodeState::Idle, NodeState::Queued));
        assert!(can_transition_node(NodeState::Queued, NodeState::Running));
        assert!(can_transition_node(
            NodeState::Running,
            NodeState::Completed
        ));
        assert!(can_transition_node(NodeState::Running, NodeState::Failed));
        assert!(can_transition_node(NodeState::Idle, NodeState::Cancelled));
        assert!(can_transition_node(NodeState::Idle, NodeState::Skipped));
        assert!(can_transition_node(NodeState::Queued, NodeState::Skipped));
    }

    #[test]
    fn invalid_node_transitions() {
        assert!(!can_transition_node(NodeState::Idle, NodeState::Running));
        assert!(!can_transition_node(
            NodeState::Completed,
            NodeState::Running
        ));
        assert!(!can_transition_node(NodeState::Skipped, NodeState::Running));
        assert!(!can_transition_node(
            NodeState::Cancelled,
            NodeState::Running
        ));
        assert!(!can_transition_node(NodeState::Failed, NodeState::Running));
    }

    #[test]
    fn validate_node_transition_err_message() {
        let err = validate_node_transition(NodeState::Completed, NodeState::Running).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));
    }
}
