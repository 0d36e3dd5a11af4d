//! The `NodeExecutor` collaborator boundary (spec §6): the Flow Execution
//! Engine never knows how to run a `"http-request"` or `"if"` node itself —
//! it delegates to whatever implementation of this trait was wired in.

use async_trait::async_trait;
use nebula_execution::{NodeInput, NodeOutput};
use thiserror::Error;

use crate::credential::CredentialResolver;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use nebula_core::{ExecutionId, NodeId, WorkflowId};

/// Context handed to a [`NodeExecutor`] for a single node invocation.
#[derive(Clone)]
pub struct NodeExecutionContext {
    /// The owning execution.
    pub execution_id: ExecutionId,
    /// The owning workflow.
    pub workflow_id: WorkflowId,
    /// The node being invoked.
    pub node_id: NodeId,
    /// 1-based invocation count, for loop nodes re-invoked in place; `0` for
    /// nodes only ever invoked once.
    pub iteration: u64,
    /// Cooperative cancellation, shared with the owning execution.
    pub cancellation: CancellationToken,
    /// Credential resolver, if one was configured on the engine.
    pub credentials: Option<Arc<dyn CredentialResolver>>,
}

impl NodeExecutionContext {
    /// Resolve a credential reference through the configured resolver.
    ///
    /// # Errors
    /// Returns [`crate::credential::CredentialError::NoResolverConfigured`]
    /// if no resolver was wired into the engine.
    pub async fn resolve_credential(
        &self,
        credential_id: &str,
    ) -> Result<serde_json::Value, crate::credential::CredentialError> {
        match &self.credentials {
            Some(resolver) => resolver.resolve(credential_id).await,
            None => Err(crate::credential::CredentialError::NoResolverConfigured),
        }
    }
}

/// The outcome of a single node invocation, as returned by a [`NodeExecutor`].
///
/// `success = false` is a *domain*-level failure reported by the node
/// itself (e.g. an HTTP 500) — distinct from `Err(NodeExecutorError)`, which
/// is a plumbing failure (unknown node type, panics caught at the boundary).
/// The engine treats `success = false` as a completed node carrying error
/// data when the node's `continueOnFail` setting is set (spec §4.4.3),
/// otherwise as a failed node.
#[derive(Debug, Clone)]
pub struct NodeExecResult {
    /// Whether the node considers its own invocation successful.
    pub success: bool,
    /// The Standardized Node Output produced either way.
    pub output: NodeOutput,
    /// Error description, present when `success` is `false`.
    pub error: Option<String>,
}

impl NodeExecResult {
    /// Build a successful result.
    #[must_use]
    pub fn success(output: NodeOutput) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    /// Build a domain-level failure result carrying whatever output data
    /// the node still wants routed downstream under `continueOnFail`.
    #[must_use]
    pub fn failure(output: NodeOutput, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output,
            error: Some(error.into()),
        }
    }
}

/// The declared input/output ports of a node type, for introspection.
///
/// The engine does not enforce these against connections; scope reduction
/// and branch gating work directly off [`nebula_workflow::Connection`]
/// `source_output`/`target_input` strings regardless of what a node type
/// declares here.
#[derive(Debug, Clone, Default)]
pub struct NodePorts {
    /// Declared input port names.
    pub inputs: Vec<String>,
    /// Declared output port names (e.g. `["true", "false"]` for an if-node).
    pub outputs: Vec<String>,
}

/// Plumbing-level failure from a [`NodeExecutor`] — not a domain result.
#[derive(Debug, Error, Clone)]
pub enum NodeExecutorError {
    /// No implementation is registered for the given node type.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
    /// The executor failed in a way that isn't a normal domain failure.
    #[error("node execution failed: {0}")]
    Failed(String),
}

/// Collaborator boundary: runs a single node invocation and reports its
/// declared ports.
///
/// Node-type plug-in registration, parameter schemas, and expression
/// evaluation are out of scope for this engine — they live entirely behind
/// this trait.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Execute one invocation of `node_type` with the given input and
    /// opaque parameters.
    async fn execute(
        &self,
        node_type: &str,
        input: NodeInput,
        parameters: &serde_json::Value,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecResult, NodeExecutorError>;

    /// Declared ports for a node type, if known.
    fn ports(&self, _node_type: &str) -> Option<NodePorts> {
        None
    }
}
