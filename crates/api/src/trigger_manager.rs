//! The Trigger Manager (spec §4.3): admission control, bounded priority
//! queueing, and per-scope concurrency caps standing between a fired
//! trigger and the Flow Execution Engine.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use nebula_core::{ExecutionId, NodeId, TriggerId, UserId, WorkflowId};
use nebula_engine::FlowExecutionEngine;
use nebula_execution::{ExecutionContext, ExecutionStatus};
use nebula_workflow::Workflow;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use nebula_webhook::{CachedExecutionResult, DispatchAck, TriggerDispatcher, TriggerExecutionRequest, WebhookError};

use crate::config::TriggerManagerConfig;
use crate::error::ApiError;
use crate::result_cache::ResultCache;

/// Collaborator boundary: fetches the `Workflow` definition a trigger
/// belongs to. Supplied by whatever owns persisted workflows; the Trigger
/// Manager never stores workflow definitions itself.
pub trait WorkflowSource: Send + Sync {
    /// Look up a workflow by id.
    fn get(&self, workflow_id: WorkflowId) -> Option<Arc<Workflow>>;
}

/// An in-memory [`WorkflowSource`], sufficient for a single-node deployment
/// or for tests; a durable deployment backs this with the same store that
/// persists workflow definitions.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: DashMap<WorkflowId, Arc<Workflow>>,
}

impl InMemoryWorkflowStore {
    /// Build an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a workflow definition.
    pub fn put(&self, workflow: Workflow) {
        self.workflows.insert(workflow.id, Arc::new(workflow));
    }

    /// Remove a workflow definition.
    pub fn remove(&self, workflow_id: WorkflowId) {
        self.workflows.remove(&workflow_id);
    }
}

impl WorkflowSource for InMemoryWorkflowStore {
    fn get(&self, workflow_id: WorkflowId) -> Option<Arc<Workflow>> {
        self.workflows.get(&workflow_id).map(|entry| Arc::clone(entry.value()))
    }
}

/// What happens when every applicable concurrency cap is already full
/// (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Hold the request in the priority queue until a slot frees or
    /// `queueTimeout` elapses.
    Queue,
    /// Fail the request immediately.
    Reject,
    /// Cancel the longest-running execution in the same scope to make
    /// room, then admit immediately.
    CancelOldest,
}

struct ActiveExecution {
    workflow_id: WorkflowId,
    user_id: UserId,
    cancellation: CancellationToken,
    started_at: Instant,
}

#[derive(Default)]
struct Counters {
    global: usize,
    per_workflow: HashMap<WorkflowId, usize>,
    per_user: HashMap<UserId, usize>,
}

impl Counters {
    fn fits(&self, workflow_id: WorkflowId, user_id: UserId, config: &TriggerManagerConfig) -> bool {
        self.global < config.max_concurrent_triggers
            && self.per_workflow.get(&workflow_id).copied().unwrap_or(0) < config.max_concurrent_per_workflow
            && self.per_user.get(&user_id).copied().unwrap_or(0) < config.max_concurrent_per_user
    }

    fn acquire(&mut self, workflow_id: WorkflowId, user_id: UserId) {
        self.global += 1;
        *self.per_workflow.entry(workflow_id).or_insert(0) += 1;
        *self.per_user.entry(user_id).or_insert(0) += 1;
    }

    fn release(&mut self, workflow_id: WorkflowId, user_id: UserId) {
        self.global = self.global.saturating_sub(1);
        if let Some(count) = self.per_workflow.get_mut(&workflow_id) {
            *count = count.saturating_sub(1);
        }
        if let Some(count) = self.per_user.get_mut(&user_id) {
            *count = count.saturating_sub(1);
        }
    }
}

struct QueuedRequest {
    request: TriggerExecutionRequest,
    workflow_id: WorkflowId,
    user_id: UserId,
    enqueued_at: Instant,
    responder: oneshot::Sender<Result<ExecutionId, ApiError>>,
}

impl QueuedRequest {
    fn sort_key(&self) -> (u8, Instant) {
        (self.request.priority, self.enqueued_at)
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    /// `BinaryHeap` is a max-heap; the highest-priority, longest-waiting
    /// request must sort greatest. Lower `priority` values are more
    /// important (spec §4.3: `1` is highest), so priority is reversed.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .request
            .priority
            .cmp(&self.request.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}

/// Admission-control snapshot for `GET /internal/trigger-stats`.
#[derive(Debug, Clone, Copy)]
pub struct TriggerManagerStats {
    /// Executions currently running.
    pub active: usize,
    /// Requests waiting in the priority queue.
    pub queued: usize,
}

/// Admits, queues, and executes fired triggers against the Flow Execution
/// Engine, enforcing the concurrency caps and conflict policy of spec §4.3.
///
/// Implements [`TriggerDispatcher`] so `nebula-webhook`'s router can hand
/// resolved requests straight to it.
pub struct TriggerManager {
    engine: Arc<FlowExecutionEngine>,
    workflows: Arc<dyn WorkflowSource>,
    result_cache: ResultCache,
    config: TriggerManagerConfig,
    active: DashMap<ExecutionId, ActiveExecution>,
    counters: Mutex<Counters>,
    queue: Mutex<BinaryHeap<QueuedRequest>>,
    /// Back-reference used to hand an `Arc<Self>` to spawned tasks from
    /// `&self`-only call sites (the `TriggerDispatcher` trait is `&self`).
    self_weak: std::sync::Weak<Self>,
}

impl TriggerManager {
    /// Build a Trigger Manager around an engine and workflow source.
    #[must_use]
    pub fn new(
        engine: Arc<FlowExecutionEngine>,
        workflows: Arc<dyn WorkflowSource>,
        result_cache: ResultCache,
        config: TriggerManagerConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            engine,
            workflows,
            result_cache,
            config,
            active: DashMap::new(),
            counters: Mutex::new(Counters::default()),
            queue: Mutex::new(BinaryHeap::new()),
            self_weak: weak.clone(),
        })
    }

    fn self_arc(&self) -> Arc<Self> {
        self.self_weak
            .upgrade()
            .expect("TriggerManager is always held by an Arc for its own lifetime")
    }

    /// Admit or queue a trigger firing, as a plain `Result` (the
    /// `TriggerDispatcher` impl wraps this for the webhook router).
    ///
    /// # Errors
    /// Returns [`ApiError::NotActive`] if the workflow is unknown or
    /// inactive, [`ApiError::ConcurrencyLimit`] under `reject`, or
    /// [`ApiError::QueueTimeout`] if the queue never freed a slot in time.
    pub async fn admit(&self, request: TriggerExecutionRequest) -> Result<ExecutionId, ApiError> {
        let workflow = self
            .workflows
            .get(request.workflow_id)
            .filter(|workflow| workflow.active)
            .ok_or(ApiError::NotActive(request.workflow_id))?;
        let user_id = workflow.owner_id;

        let workflow_id = request.workflow_id;
        if self.try_admit_immediate(workflow_id, user_id) {
            return Ok(self.spawn_execution(workflow, request, user_id));
        }

        match self.config.conflict_policy {
            ConflictPolicy::Reject => Err(ApiError::ConcurrencyLimit),
            ConflictPolicy::CancelOldest => {
                if self.cancel_oldest(workflow_id) {
                    Ok(self.spawn_execution(workflow, request, user_id))
                } else {
                    Err(ApiError::ConcurrencyLimit)
                }
            }
            ConflictPolicy::Queue => self.enqueue_and_wait(request, workflow_id, user_id).await,
        }
    }

    fn try_admit_immediate(&self, workflow_id: WorkflowId, user_id: UserId) -> bool {
        let mut counters = self.counters.lock();
        if counters.fits(workflow_id, user_id, &self.config) {
            counters.acquire(workflow_id, user_id);
            true
        } else {
            false
        }
    }

    /// Cancel the oldest active execution sharing `workflow_id`'s scope,
    /// freeing its slot immediately for the preempting request.
    fn cancel_oldest(&self, workflow_id: WorkflowId) -> bool {
        let oldest = self
            .active
            .iter()
            .filter(|entry| entry.value().workflow_id == workflow_id)
            .min_by_key(|entry| entry.value().started_at)
            .map(|entry| *entry.key());

        let Some(execution_id) = oldest else {
            return false;
        };
        if let Some((_, victim)) = self.active.remove(&execution_id) {
            victim.cancellation.cancel();
            self.counters.lock().release(victim.workflow_id, victim.user_id);
            true
        } else {
            false
        }
    }

    async fn enqueue_and_wait(
        &self,
        request: TriggerExecutionRequest,
        workflow_id: WorkflowId,
        user_id: UserId,
    ) -> Result<ExecutionId, ApiError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.config.max_queue_size {
                return Err(ApiError::QueueTimeout);
            }
            queue.push(QueuedRequest {
                request,
                workflow_id,
                user_id,
                enqueued_at: Instant::now(),
                responder: tx,
            });
        }
        self.drain_queue();

        match tokio::time::timeout(self.config.queue_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ApiError::QueueTimeout),
            Err(_) => Err(ApiError::QueueTimeout),
        }
    }

    /// Admit as many queued requests, in priority order, as current
    /// capacity allows. Called whenever a slot frees (on completion) and
    /// whenever a new request is queued.
    fn drain_queue(&self) {
        loop {
            let next = {
                let mut queue = self.queue.lock();
                let Some(top) = queue.peek() else { return };
                if !self.counters.lock().fits(top.workflow_id, top.user_id, &self.config) {
                    return;
                }
                queue.pop()
            };
            let Some(queued) = next else { return };

            let Some(workflow) = self.workflows.get(queued.workflow_id).filter(|w| w.active) else {
                let _ = queued.responder.send(Err(ApiError::NotActive(queued.workflow_id)));
                continue;
            };

            self.counters.lock().acquire(queued.workflow_id, queued.user_id);
            let execution_id = self.spawn_execution(workflow, queued.request, queued.user_id);
            let _ = queued.responder.send(Ok(execution_id));
        }
    }

    /// Spawn the engine run as its own task, releasing admission state and
    /// publishing the result once it reaches a terminal status.
    fn spawn_execution(
        &self,
        workflow: Arc<Workflow>,
        request: TriggerExecutionRequest,
        user_id: UserId,
    ) -> ExecutionId {
        let execution_id = ExecutionId::v4();
        let cancellation = CancellationToken::new();
        self.active.insert(
            execution_id,
            ActiveExecution {
                workflow_id: request.workflow_id,
                user_id,
                cancellation: cancellation.clone(),
                started_at: Instant::now(),
            },
        );

        let manager = self.self_arc();
        tokio::spawn(async move {
            manager
                .run_to_completion(workflow, request, execution_id, user_id, cancellation)
                .await;
        });

        execution_id
    }

    async fn run_to_completion(
        self: Arc<Self>,
        workflow: Arc<Workflow>,
        request: TriggerExecutionRequest,
        execution_id: ExecutionId,
        user_id: UserId,
        cancellation: CancellationToken,
    ) {
        let ctx = ExecutionContext::new(
            execution_id,
            request.workflow_id,
            user_id,
            request.node_id,
            request.payload,
            workflow.connections.clone(),
        )
        .with_cancellation(cancellation)
        .with_save_to_database(workflow.settings.save_execution_to_database);

        let outcome = self.engine.execute(&workflow, request.node_id, ctx).await;

        let cached = match &outcome {
            Ok(outcome) => CachedExecutionResult {
                status: status_tag(outcome.status),
                http_response: outcome.http_response_item().and_then(http_response_spec),
                last_node_item: outcome.last_node_first_item().map(|item| item.json.clone()),
            },
            Err(error) => CachedExecutionResult {
                status: "failed".to_string(),
                http_response: None,
                last_node_item: Some(serde_json::json!({"error": error.to_string()})),
            },
        };
        self.result_cache.set(execution_id, cached).await;

        self.active.remove(&execution_id);
        self.counters.lock().release(request.workflow_id, user_id);
        self.drain_queue();
    }

    /// Cancel an in-flight execution.
    ///
    /// # Errors
    /// Returns [`ApiError::UnknownExecution`] if `execution_id` is not
    /// currently active.
    pub fn cancel_trigger(&self, execution_id: ExecutionId) -> Result<(), ApiError> {
        let active = self
            .active
            .get(&execution_id)
            .ok_or(ApiError::UnknownExecution(execution_id))?;
        active.cancellation.cancel();
        Ok(())
    }

    /// Snapshot admission-control state for `GET /internal/trigger-stats`.
    #[must_use]
    pub fn stats(&self) -> TriggerManagerStats {
        TriggerManagerStats {
            active: self.active.len(),
            queued: self.queue.lock().len(),
        }
    }

    /// Dispatch a trigger and synchronously await its terminal result,
    /// for manual "run and show me the output" invocations (spec §4.3).
    ///
    /// # Errors
    /// Propagates admission failures; returns [`ApiError::Timeout`] if the
    /// execution does not complete within `timeout`.
    pub async fn execute_trigger_and_wait(
        &self,
        request: TriggerExecutionRequest,
        timeout: Duration,
    ) -> Result<CachedExecutionResult, ApiError> {
        let execution_id = self.admit(request).await?;
        self.result_cache
            .wait_for_result(execution_id, timeout)
            .await
            .ok_or(ApiError::Timeout)
    }
}

fn status_tag(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Partial => "partial",
        ExecutionStatus::Failed | ExecutionStatus::TimedOut => "failed",
        ExecutionStatus::Cancelled => "cancelled",
        ExecutionStatus::Created | ExecutionStatus::Running | ExecutionStatus::Paused | ExecutionStatus::Cancelling => "running",
    }
    .to_string()
}

fn http_response_spec(item: &nebula_execution::Item) -> Option<nebula_webhook::HttpResponseSpec> {
    let status_code = item
        .json
        .get("statusCode")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(200) as u16;
    let headers = item
        .json
        .get("headers")
        .and_then(|value| serde_json::from_value::<HashMap<String, String>>(value.clone()).ok())
        .unwrap_or_default();
    let cookies = item
        .json
        .get("cookies")
        .and_then(|value| serde_json::from_value::<Vec<String>>(value.clone()).ok())
        .unwrap_or_default();
    let body = item
        .json
        .get("body")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    Some(nebula_webhook::HttpResponseSpec { status_code, headers, body, cookies })
}

#[async_trait]
impl TriggerDispatcher for TriggerManager {
    async fn dispatch(&self, request: TriggerExecutionRequest) -> Result<DispatchAck, WebhookError> {
        let execution_id = self.admit(request).await.map_err(map_admission_error)?;
        Ok(DispatchAck {
            success: true,
            execution_id,
            status: "started".to_string(),
        })
    }

    async fn wait_for_result(
        &self,
        execution_id: ExecutionId,
        timeout: Duration,
    ) -> Option<CachedExecutionResult> {
        self.result_cache.wait_for_result(execution_id, timeout).await
    }
}

fn map_admission_error(error: ApiError) -> WebhookError {
    match error {
        ApiError::NotActive(_) => WebhookError::NotActive,
        ApiError::ConcurrencyLimit | ApiError::QueueTimeout => {
            WebhookError::Rejected(error.to_string())
        }
        other => WebhookError::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_engine::testing::StaticNodeExecutor;
    use nebula_execution::{Item, NodeOutput};
    use nebula_telemetry::service::NoopTelemetry;
    use nebula_workflow::{Connection, Node};
    use nebula_webhook::TriggerVariant;

    fn sample_workflow() -> (Workflow, NodeId) {
        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        wf.active = true;
        let start = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let node_id = start.id;
        wf.nodes.push(start);
        (wf, node_id)
    }

    fn manager_with(config: TriggerManagerConfig) -> (Arc<TriggerManager>, WorkflowId, NodeId) {
        let (wf, node_id) = sample_workflow();
        let workflow_id = wf.id;
        let store = Arc::new(InMemoryWorkflowStore::new());
        store.put(wf);

        let executor = StaticNodeExecutor::new().on(
            "manual-trigger",
            NodeOutput::plain("manual-trigger", vec![Item::json(serde_json::json!({"ok": true}))]),
        );
        let engine = Arc::new(FlowExecutionEngine::new(Arc::new(executor), NoopTelemetry::arc()));
        let manager = TriggerManager::new(engine, store, ResultCache::new(), config);
        (manager, workflow_id, node_id)
    }

    fn sample_request(workflow_id: WorkflowId, node_id: NodeId) -> TriggerExecutionRequest {
        TriggerExecutionRequest {
            trigger_id: TriggerId::v4(),
            workflow_id,
            node_id,
            variant: TriggerVariant::Manual,
            priority: 1,
            payload: serde_json::json!({}),
            response_mode: None,
            test_mode: false,
        }
    }

    #[tokio::test]
    async fn admits_when_workflow_is_active() {
        let (manager, workflow_id, node_id) = manager_with(TriggerManagerConfig::default());
        let execution_id = manager.admit(sample_request(workflow_id, node_id)).await.unwrap();
        assert!(!execution_id.is_nil());
    }

    #[tokio::test]
    async fn rejects_inactive_workflow() {
        let (manager, _workflow_id, node_id) = manager_with(TriggerManagerConfig::default());
        let missing = WorkflowId::v4();
        let err = manager.admit(sample_request(missing, node_id)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotActive(_)));
    }

    #[tokio::test]
    async fn reject_policy_fails_once_global_cap_is_full() {
        let mut config = TriggerManagerConfig::default();
        config.max_concurrent_triggers = 0;
        config.conflict_policy = ConflictPolicy::Reject;
        let (manager, workflow_id, node_id) = manager_with(config);
        let err = manager.admit(sample_request(workflow_id, node_id)).await.unwrap_err();
        assert!(matches!(err, ApiError::ConcurrencyLimit));
    }

    #[tokio::test]
    async fn execute_trigger_and_wait_returns_cached_result() {
        let (manager, workflow_id, node_id) = manager_with(TriggerManagerConfig::default());
        let result = manager
            .execute_trigger_and_wait(sample_request(workflow_id, node_id), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(result.status, "completed");
    }

    #[test]
    fn stats_reports_zero_when_idle() {
        let (manager, _workflow_id, _node_id) = manager_with(TriggerManagerConfig::default());
        let stats = manager.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.queued, 0);
    }
}
