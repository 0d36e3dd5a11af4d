//! Test doubles shared by this crate's own tests and available to
//! downstream crates wiring up integration tests against the engine.

use std::collections::HashMap;

use async_trait::async_trait;
use nebula_execution::{NodeInput, NodeOutput};

use crate::executor::{NodeExecResult, NodeExecutionContext, NodeExecutor, NodeExecutorError};

/// A fixed per-node-type response table, for tests that don't need a node
/// type to actually look at its input.
///
/// Node types not present in the table fail with
/// [`NodeExecutorError::UnknownNodeType`].
#[derive(Default)]
pub struct StaticNodeExecutor {
    responses: HashMap<String, NodeOutput>,
}

impl StaticNodeExecutor {
    /// Build an empty executor; register responses with [`Self::on`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
        }
    }

    /// Register the output a node type should return when invoked.
    #[must_use]
    pub fn on(mut self, node_type: impl Into<String>, output: NodeOutput) -> Self {
        self.responses.insert(node_type.into(), output);
        self
    }
}

#[async_trait]
impl NodeExecutor for StaticNodeExecutor {
    async fn execute(
        &self,
        node_type: &str,
        _input: NodeInput,
        _parameters: &serde_json::Value,
        _ctx: &NodeExecutionContext,
    ) -> Result<NodeExecResult, NodeExecutorError> {
        self.responses
            .get(node_type)
            .cloned()
            .map(NodeExecResult::success)
            .ok_or_else(|| NodeExecutorError::UnknownNodeType(node_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{ExecutionId, NodeId, WorkflowId};
    use nebula_execution::Item;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> NodeExecutionContext {
        NodeExecutionContext {
            execution_id: ExecutionId::v4(),
            workflow_id: WorkflowId::v4(),
            node_id: NodeId::v4(),
            iteration: 0,
            cancellation: CancellationToken::new(),
            credentials: None,
        }
    }

    #[tokio::test]
    async fn registered_node_type_returns_configured_output() {
        let executor = StaticNodeExecutor::new()
            .on("noop", NodeOutput::plain("noop", vec![Item::json(serde_json::json!(1))]));

        let result = executor
            .execute("noop", NodeInput::empty(), &serde_json::Value::Null, &ctx())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output.main[0].json, serde_json::json!(1));
    }

    #[tokio::test]
    async fn unregistered_node_type_is_unknown() {
        let executor = StaticNodeExecutor::new();
        let err = executor
            .execute("mystery", NodeInput::empty(), &serde_json::Value::Null, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeExecutorError::UnknownNodeType(_)));
    }
}
