//! The result of a single [`crate::engine::FlowExecutionEngine::execute`] call.

use std::collections::HashMap;
use std::time::Duration;

use nebula_core::{ExecutionId, NodeId, WorkflowId};
use nebula_execution::{Item, NodeExecutionState, NodeOutput};
use nebula_execution::ExecutionStatus;

/// Everything the caller needs once an execution has reached a terminal
/// status: the final status, every scoped node's terminal state, the
/// outputs produced, and the order nodes actually ran in.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// The execution this outcome describes.
    pub execution_id: ExecutionId,
    /// The workflow that was executed.
    pub workflow_id: WorkflowId,
    /// The final execution status.
    pub status: ExecutionStatus,
    /// Per-node terminal execution state.
    pub node_states: HashMap<NodeId, NodeExecutionState>,
    /// Every node's recorded output, keyed by node id.
    pub outputs: HashMap<NodeId, NodeOutput>,
    /// The nodes actually invoked, in invocation order.
    pub execution_path: Vec<NodeId>,
    /// Total wall-clock duration of the run.
    pub duration: Duration,
    /// A human-readable error description, present for non-successful runs.
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// Locate the first item, in execution-path order, across any node's
    /// `main` output carrying the `_httpResponse` sentinel flag (spec §4.1
    /// `last-node` response mode).
    #[must_use]
    pub fn http_response_item(&self) -> Option<&Item> {
        for node_id in &self.execution_path {
            if let Some(output) = self.outputs.get(node_id) {
                if let Some(item) = output.http_response_item() {
                    return Some(item);
                }
            }
        }
        None
    }

    /// The first item of the last-invoked node's `main` output, the
    /// fallback for `last-node` response mode when no item carries the
    /// `_httpResponse` sentinel.
    #[must_use]
    pub fn last_node_first_item(&self) -> Option<&Item> {
        let last = self.execution_path.last()?;
        self.outputs.get(last)?.main.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_execution::NodeOutput;

    fn outcome_with(outputs: HashMap<NodeId, NodeOutput>, path: Vec<NodeId>) -> ExecutionOutcome {
        ExecutionOutcome {
            execution_id: ExecutionId::v4(),
            workflow_id: WorkflowId::v4(),
            status: ExecutionStatus::Completed,
            node_states: HashMap::new(),
            outputs,
            execution_path: path,
            duration: Duration::from_millis(10),
            error: None,
        }
    }

    #[test]
    fn http_response_item_found_in_path_order() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let mut outputs = HashMap::new();
        outputs.insert(a, NodeOutput::plain("noop", vec![Item::json(serde_json::json!({"ok": true}))]));
        outputs.insert(
            b,
            NodeOutput::plain(
                "respond",
                vec![Item::json(serde_json::json!({"_httpResponse": true, "statusCode": 201}))],
            ),
        );

        let outcome = outcome_with(outputs, vec![a, b]);
        let item = outcome.http_response_item().unwrap();
        assert_eq!(item.json["statusCode"], 201);
    }

    #[test]
    fn last_node_first_item_fallback() {
        let a = NodeId::v4();
        let mut outputs = HashMap::new();
        outputs.insert(a, NodeOutput::plain("noop", vec![Item::json(serde_json::json!(42))]));

        let outcome = outcome_with(outputs, vec![a]);
        assert!(outcome.http_response_item().is_none());
        assert_eq!(outcome.last_node_first_item().unwrap().json, serde_json::json!(42));
    }
}
