//! Workflow validation errors.

use nebula_core::NodeId;
use thiserror::Error;

/// Errors raised while validating a [`crate::Workflow`]'s structure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// Two nodes share the same identifier.
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    /// A connection references a node that does not exist in the workflow.
    #[error("connection references unknown node: {0}")]
    DanglingConnection(NodeId),

    /// A connection's source and target are the same node.
    #[error("self-connection rejected for node: {0}")]
    SelfConnection(NodeId),

    /// The connection graph contains a cycle.
    #[error("workflow graph contains a cycle")]
    Cycle,

    /// A trigger references a node that does not exist in the workflow.
    #[error("trigger references unknown node: {0}")]
    UnknownTriggerNode(NodeId),

    /// The requested starting node is not part of the workflow.
    #[error("starting node not found: {0}")]
    StartNodeNotFound(NodeId),
}
