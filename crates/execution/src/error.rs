//! Execution error types.

use nebula_core::NodeId;
use thiserror::Error;

use crate::status::ExecutionStatus;

/// Errors that can occur while tracking execution/node state transitions.
///
/// Engine-level failures (cycle detection, dependency deadlock, loop limits)
/// belong to `nebula_engine`'s own error type; this crate only concerns
/// itself with the validity of state transitions it tracks.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A state transition is not valid for the current status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// A referenced node does not exist in the execution state.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// Create an invalid-transition error from execution statuses.
    pub fn invalid_execution_transition(from: ExecutionStatus, to: ExecutionStatus) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
