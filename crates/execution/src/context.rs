//! Runtime execution context (non-serializable).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nebula_core::{ExecutionId, NodeId, UserId, WorkflowId};
use nebula_workflow::Connection;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;

/// Runtime context for an executing workflow (spec §3).
///
/// This type is NOT serializable — it holds runtime resources like
/// a cancellation token and atomic flags. Persisted state is tracked by
/// [`ExecutionState`](crate::state::ExecutionState).
#[derive(Debug)]
pub struct ExecutionContext {
    /// Unique identifier for this execution.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The user on whose behalf this execution runs.
    pub user_id: UserId,
    /// The node the triggering event entered through.
    pub trigger_node_id: NodeId,
    /// The raw payload the trigger fired with.
    pub trigger_data: serde_json::Value,
    /// The connections of the workflow being executed, scoped to this run.
    pub connections: Arc<Vec<Connection>>,
    /// The sequence of node ids that have been invoked, in invocation order.
    pub execution_path: Arc<RwLock<Vec<NodeId>>>,
    /// Token for cooperative cancellation.
    pub cancellation: CancellationToken,
    /// Whether the execution is currently paused.
    pub paused: Arc<AtomicBool>,
    /// Whether state should be persisted to the Schedule Persistence Layer
    /// as the run progresses (per-workflow `saveExecutionProgress` setting).
    pub save_to_database: bool,
    /// When this execution began.
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl ExecutionContext {
    /// Create a new execution context.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        user_id: UserId,
        trigger_node_id: NodeId,
        trigger_data: serde_json::Value,
        connections: Vec<Connection>,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            user_id,
            trigger_node_id,
            trigger_data,
            connections: Arc::new(connections),
            execution_path: Arc::new(RwLock::new(Vec::new())),
            cancellation: CancellationToken::new(),
            paused: Arc::new(AtomicBool::new(false)),
            save_to_database: false,
            started_at: chrono::Utc::now(),
        }
    }

    /// Replace the cancellation token, e.g. to link it to a parent scope.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Enable state persistence as the run progresses.
    #[must_use]
    pub fn with_save_to_database(mut self, save: bool) -> Self {
        self.save_to_database = save;
        self
    }

    /// Record a node as having been invoked.
    pub fn record_invocation(&self, node_id: NodeId) {
        self.execution_path.write().push(node_id);
    }

    /// The nodes invoked so far, in order.
    #[must_use]
    pub fn execution_path(&self) -> Vec<NodeId> {
        self.execution_path.read().clone()
    }

    /// Request cancellation of this execution.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Check if cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<(), ExecutionError> {
        if self.cancellation.is_cancelled() {
            Err(ExecutionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Pause this execution.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resume this execution.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Returns `true` if this execution is currently paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
