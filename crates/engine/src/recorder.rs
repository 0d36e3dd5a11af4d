//! The `ExecutionRecorder` collaborator boundary (spec §4.4.5): the engine
//! reports execution/node lifecycle transitions through this trait, leaving
//! where (and whether) they are durably persisted entirely up to the
//! implementation wired in by the host process.

use async_trait::async_trait;
use nebula_core::{ExecutionId, NodeId, WorkflowId};
use nebula_execution::{NodeInput, NodeOutput};
use nebula_workflow::NodeState;

use dashmap::DashMap;

/// Lifecycle hooks the engine calls as an execution and its nodes progress.
///
/// Implementations are responsible for their own durability story; the
/// engine itself holds no database connection. A failing recorder must not
/// abort the run — implementations should swallow their own errors (e.g.
/// logging and continuing) since recording is diagnostic, not transactional,
/// with respect to the run it describes.
#[async_trait]
pub trait ExecutionRecorder: Send + Sync {
    /// Called once, when an execution begins.
    async fn start_execution(
        &self,
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        trigger_data: &serde_json::Value,
    );

    /// Called once, when an execution reaches a terminal status.
    async fn finish_execution(
        &self,
        execution_id: ExecutionId,
        status: nebula_execution::ExecutionStatus,
        error: Option<&str>,
    );

    /// Called each time a node is about to run.
    async fn start_node(&self, execution_id: ExecutionId, node_id: NodeId, input: &NodeInput);

    /// Called each time a node reaches a terminal state.
    async fn finish_node(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        state: NodeState,
        output: Option<&NodeOutput>,
        error: Option<&str>,
    );
}

/// Discards everything. The default recorder when no persistence backend is
/// wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

#[async_trait]
impl ExecutionRecorder for NullRecorder {
    async fn start_execution(
        &self,
        _execution_id: ExecutionId,
        _workflow_id: WorkflowId,
        _trigger_data: &serde_json::Value,
    ) {
    }

    async fn finish_execution(
        &self,
        _execution_id: ExecutionId,
        _status: nebula_execution::ExecutionStatus,
        _error: Option<&str>,
    ) {
    }

    async fn start_node(&self, _execution_id: ExecutionId, _node_id: NodeId, _input: &NodeInput) {}

    async fn finish_node(
        &self,
        _execution_id: ExecutionId,
        _node_id: NodeId,
        _state: NodeState,
        _output: Option<&NodeOutput>,
        _error: Option<&str>,
    ) {
    }
}

/// A single node's recorded history within an [`InMemoryRecorder`].
#[derive(Debug, Clone)]
pub struct RecordedNode {
    /// Last reported state.
    pub state: NodeState,
    /// Last reported input, if the node started.
    pub input: Option<NodeInput>,
    /// Last reported output, if the node finished with one.
    pub output: Option<NodeOutput>,
    /// Last reported error, if any.
    pub error: Option<String>,
}

/// A single execution's recorded history within an [`InMemoryRecorder`].
#[derive(Debug, Clone)]
pub struct RecordedExecution {
    /// The workflow this execution ran.
    pub workflow_id: WorkflowId,
    /// The payload the execution was triggered with.
    pub trigger_data: serde_json::Value,
    /// Last reported status, `None` until the execution finishes.
    pub status: Option<nebula_execution::ExecutionStatus>,
    /// Last reported error, if the execution failed.
    pub error: Option<String>,
    /// Per-node recorded history.
    pub nodes: DashMap<NodeId, RecordedNode>,
}

/// An in-memory [`ExecutionRecorder`], useful for tests and single-process
/// deployments that don't need durability across restarts.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    executions: DashMap<ExecutionId, RecordedExecution>,
}

impl InMemoryRecorder {
    /// Build an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            executions: DashMap::new(),
        }
    }

    /// Snapshot a recorded execution's status, if it has been seen.
    #[must_use]
    pub fn status_of(&self, execution_id: ExecutionId) -> Option<nebula_execution::ExecutionStatus> {
        self.executions.get(&execution_id)?.status
    }

    /// Snapshot a recorded node's state, if it has been seen.
    #[must_use]
    pub fn node_state_of(&self, execution_id: ExecutionId, node_id: NodeId) -> Option<NodeState> {
        let execution = self.executions.get(&execution_id)?;
        let node = execution.nodes.get(&node_id)?;
        Some(node.state)
    }
}

#[async_trait]
impl ExecutionRecorder for InMemoryRecorder {
    async fn start_execution(
        &self,
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        trigger_data: &serde_json::Value,
    ) {
        self.executions.insert(
            execution_id,
            RecordedExecution {
                workflow_id,
                trigger_data: trigger_data.clone(),
                status: None,
                error: None,
                nodes: DashMap::new(),
            },
        );
    }

    async fn finish_execution(
        &self,
        execution_id: ExecutionId,
        status: nebula_execution::ExecutionStatus,
        error: Option<&str>,
    ) {
        if let Some(mut execution) = self.executions.get_mut(&execution_id) {
            execution.status = Some(status);
            execution.error = error.map(str::to_string);
        }
    }

    async fn start_node(&self, execution_id: ExecutionId, node_id: NodeId, input: &NodeInput) {
        if let Some(execution) = self.executions.get(&execution_id) {
            execution.nodes.insert(
                node_id,
                RecordedNode {
                    state: NodeState::Running,
                    input: Some(input.clone()),
                    output: None,
                    error: None,
                },
            );
        }
    }

    async fn finish_node(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        state: NodeState,
        output: Option<&NodeOutput>,
        error: Option<&str>,
    ) {
        if let Some(execution) = self.executions.get(&execution_id) {
            execution
                .nodes
                .entry(node_id)
                .and_modify(|n| {
                    n.state = state;
                    n.output = output.cloned();
                    n.error = error.map(str::to_string);
                })
                .or_insert(RecordedNode {
                    state,
                    input: None,
                    output: output.cloned(),
                    error: error.map(str::to_string),
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_execution::ExecutionStatus;

    #[tokio::test]
    async fn in_memory_recorder_tracks_execution_lifecycle() {
        let recorder = InMemoryRecorder::new();
        let execution_id = ExecutionId::v4();
        let workflow_id = WorkflowId::v4();
        let node_id = NodeId::v4();

        recorder
            .start_execution(execution_id, workflow_id, &serde_json::json!({}))
            .await;
        assert!(recorder.status_of(execution_id).is_none());

        recorder
            .start_node(execution_id, node_id, &NodeInput::empty())
            .await;
        assert_eq!(
            recorder.node_state_of(execution_id, node_id),
            Some(NodeState::Running)
        );

        let output = NodeOutput::plain("noop", vec![]);
        recorder
            .finish_node(execution_id, node_id, NodeState::Completed, Some(&output), None)
            .await;
        assert_eq!(
            recorder.node_state_of(execution_id, node_id),
            Some(NodeState::Completed)
        );

        recorder
            .finish_execution(execution_id, ExecutionStatus::Completed, None)
            .await;
        assert_eq!(recorder.status_of(execution_id), Some(ExecutionStatus::Completed));
    }

    #[tokio::test]
    async fn null_recorder_does_not_panic() {
        let recorder = NullRecorder;
        let execution_id = ExecutionId::v4();
        recorder
            .start_execution(execution_id, WorkflowId::v4(), &serde_json::json!({}))
            .await;
        recorder
            .finish_execution(execution_id, ExecutionStatus::Completed, None)
            .await;
    }
}
