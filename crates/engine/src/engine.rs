//! The Flow Execution Engine (spec §4.4): DAG scope reduction, sequential
//! topological scheduling, branch gating, continue-on-fail, and the loop
//! node protocol.
//!
//! Unlike a level-parallel scheduler that fans nodes of the same depth out
//! onto a `JoinSet`, this engine runs the nodes of a single execution
//! strictly one at a time, in the order the scheduler pops them off its
//! queue. Concurrency comes from running many executions side by side (one
//! tokio task per execution), not from parallelizing inside one.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use nebula_core::NodeId;
use nebula_eventbus::ExecutionEvent;
use nebula_execution::{
    ExecutionContext, ExecutionState, ExecutionStatus, Item, NodeExecutionState, NodeInput,
    NodeOutput,
};
use nebula_telemetry::TelemetryService;
use nebula_workflow::{Connection, DependencyGraph, Node, NodeState, Workflow};

use crate::credential::CredentialResolver;
use crate::error::{map_workflow_error, EngineError};
use crate::executor::{NodeExecResult, NodeExecutionContext, NodeExecutor};
use crate::input::{active_connection_ids, build_input, edge_is_live, EntryInput};
use crate::outcome::ExecutionOutcome;
use crate::recorder::{ExecutionRecorder, NullRecorder};

/// Tunables for the scheduler, all with spec-defined defaults.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// How many times a node may be requeued while waiting on dependencies
    /// that have not all reached a terminal state, before the node is
    /// failed with [`EngineError::DependencyUnsatisfiable`].
    pub max_node_requeue_attempts: usize,
    /// How many times a loop node may be re-invoked before the run fails
    /// with [`EngineError::LoopIterationLimit`].
    pub max_loop_iterations: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_node_requeue_attempts: 10,
            max_loop_iterations: 100_000,
        }
    }
}

/// Drives a single [`Workflow`] through to a terminal [`ExecutionOutcome`].
///
/// One engine instance is shared (via `Arc`) across every concurrent
/// execution; all per-run state lives on the stack of the `execute` call,
/// not on `self`.
pub struct FlowExecutionEngine {
    executor: Arc<dyn NodeExecutor>,
    credentials: Option<Arc<dyn CredentialResolver>>,
    recorder: Arc<dyn ExecutionRecorder>,
    telemetry: Arc<dyn TelemetryService>,
    config: EngineConfig,
}

impl FlowExecutionEngine {
    /// Build an engine around a node executor and telemetry sink, with no
    /// credential resolver and a no-op recorder.
    #[must_use]
    pub fn new(executor: Arc<dyn NodeExecutor>, telemetry: Arc<dyn TelemetryService>) -> Self {
        Self {
            executor,
            credentials: None,
            recorder: Arc::new(NullRecorder),
            telemetry,
            config: EngineConfig::default(),
        }
    }

    /// Attach a credential resolver.
    #[must_use]
    pub fn with_credentials(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.credentials = Some(resolver);
        self
    }

    /// Attach an execution recorder.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn ExecutionRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Override the default scheduler tunables.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run `workflow` starting at `start_node_id` to completion.
    ///
    /// # Errors
    /// Returns an error only for planning failures that prevent any
    /// execution state from being created at all (unknown start node, a
    /// cyclic scope). Node-level and loop-level failures are captured in
    /// the returned [`ExecutionOutcome`] instead of short-circuiting here.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        start_node_id: NodeId,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutcome, EngineError> {
        if workflow.node(start_node_id).is_none() {
            return Err(EngineError::StartNodeNotFound(start_node_id));
        }
        // A loop node's `loop` port connects forward into its own body, which
        // eventually routes back to the loop node -- a genuine cycle in the
        // authored graph. Scheduling never walks that edge (run_loop_node
        // drives the body directly via nested sub-runs), so it is stripped
        // before any DependencyGraph is built.
        let connections: Vec<Connection> = strip_loop_edges(workflow, &ctx.connections);

        // Fail fast, before any state is created, if the scope is cyclic.
        DependencyGraph::build(start_node_id, &connections).map_err(map_workflow_error)?;

        let mut exec_state = ExecutionState::new(ctx.execution_id, ctx.workflow_id, HashMap::new());
        exec_state
            .transition_status(ExecutionStatus::Running)
            .map_err(EngineError::State)?;

        if ctx.save_to_database {
            self.recorder
                .start_execution(ctx.execution_id, ctx.workflow_id, &ctx.trigger_data)
                .await;
        }
        self.telemetry.event_bus().emit(ExecutionEvent::ExecutionStarted {
            execution_id: ctx.execution_id,
            workflow_id: ctx.workflow_id,
            trigger_node_id: start_node_id,
        });
        self.telemetry.metrics().counter("nebula_executions_started_total").inc();

        let started = Instant::now();
        let mut outputs: HashMap<NodeId, NodeOutput> = HashMap::new();

        let run_result = self
            .run_scope(
                workflow,
                &connections,
                start_node_id,
                EntryInput::Trigger(ctx.trigger_data.clone()),
                &ctx,
                &mut exec_state,
                &mut outputs,
            )
            .await;

        let duration = started.elapsed();

        let (final_status, error_message) = if ctx.cancellation.is_cancelled() {
            (ExecutionStatus::Cancelled, None)
        } else {
            match &run_result {
                Err(e) => (ExecutionStatus::Failed, Some(e.to_string())),
                Ok(()) => (exec_state.tally_status(), None),
            }
        };

        if final_status == ExecutionStatus::Cancelled {
            let _ = exec_state.transition_status(ExecutionStatus::Cancelling);
            exec_state
                .transition_status(ExecutionStatus::Cancelled)
                .map_err(EngineError::State)?;
        } else {
            exec_state
                .transition_status(final_status)
                .map_err(EngineError::State)?;
        }

        match final_status {
            ExecutionStatus::Completed => {
                self.telemetry.event_bus().emit(ExecutionEvent::ExecutionCompleted {
                    execution_id: ctx.execution_id,
                    duration,
                });
                self.telemetry.metrics().counter("nebula_executions_completed_total").inc();
            }
            ExecutionStatus::Cancelled => {
                self.telemetry.event_bus().emit(ExecutionEvent::ExecutionCancelled {
                    execution_id: ctx.execution_id,
                });
            }
            _ => {
                let message = error_message
                    .clone()
                    .unwrap_or_else(|| "one or more nodes failed".to_string());
                self.telemetry.event_bus().emit(ExecutionEvent::ExecutionFailed {
                    execution_id: ctx.execution_id,
                    error: message,
                });
                self.telemetry.metrics().counter("nebula_executions_failed_total").inc();
            }
        }
        self.telemetry
            .metrics()
            .histogram("nebula_execution_duration_seconds")
            .observe(duration.as_secs_f64());

        if ctx.save_to_database {
            self.recorder
                .finish_execution(ctx.execution_id, final_status, error_message.as_deref())
                .await;
        }

        Ok(ExecutionOutcome {
            execution_id: ctx.execution_id,
            workflow_id: ctx.workflow_id,
            status: final_status,
            node_states: exec_state.node_states.clone(),
            outputs,
            execution_path: ctx.execution_path(),
            duration,
            error: error_message,
        })
    }

    /// Schedule and run every node reachable from `start` until the queue
    /// drains or cancellation is observed. Used both for the top-level run
    /// and, recursively, for a loop node's nested sub-runs (spec §4.4.4) —
    /// boxed because async fns cannot recurse directly.
    #[allow(clippy::too_many_arguments)]
    fn run_scope<'a>(
        &'a self,
        workflow: &'a Workflow,
        connections: &'a [Connection],
        start: NodeId,
        entry: EntryInput,
        ctx: &'a ExecutionContext,
        exec_state: &'a mut ExecutionState,
        outputs: &'a mut HashMap<NodeId, NodeOutput>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let graph = DependencyGraph::build(start, connections).map_err(map_workflow_error)?;

            let mut pending_deps: HashMap<NodeId, usize> = HashMap::new();
            let mut live_input: HashMap<NodeId, bool> = HashMap::new();
            let mut requeue_attempts: HashMap<NodeId, usize> = HashMap::new();
            let mut queue: VecDeque<NodeId> = VecDeque::new();

            for n in graph.scoped_nodes() {
                pending_deps.insert(n, graph.dependencies(n).len());
                live_input.insert(n, false);
                exec_state.set_node_state(
                    n,
                    NodeExecutionState::new(graph.dependencies(n), graph.dependents(n)),
                );
            }

            exec_state
                .node_states
                .get_mut(&start)
                .expect("start node state just inserted")
                .transition_to(NodeState::Queued)
                .map_err(EngineError::State)?;
            queue.push_back(start);

            while let Some(node_id) = queue.pop_front() {
                if ctx.cancellation.is_cancelled() {
                    break;
                }

                let current_state = exec_state.node_state(node_id).map(|s| s.state);
                if !matches!(current_state, Some(NodeState::Idle) | Some(NodeState::Queued)) {
                    continue;
                }

                let Some(node) = workflow.node(node_id) else {
                    continue;
                };

                if node.disabled {
                    self.mark_skipped(
                        node_id,
                        &graph,
                        connections,
                        exec_state,
                        outputs,
                        &mut pending_deps,
                        &mut live_input,
                        &mut queue,
                    )?;
                    continue;
                }

                let deps = graph.dependencies(node_id);
                let all_terminal = deps
                    .iter()
                    .all(|d| exec_state.node_state(*d).is_some_and(|s| s.state.is_terminal()));
                if !all_terminal {
                    let attempts = requeue_attempts.entry(node_id).or_insert(0);
                    *attempts += 1;
                    if *attempts > self.config.max_node_requeue_attempts {
                        self.mark_failed(
                            node_id,
                            "dependency unsatisfiable after max requeue attempts",
                            &graph,
                            connections,
                            exec_state,
                            outputs,
                            &mut pending_deps,
                            &mut live_input,
                            &mut queue,
                        )?;
                        continue;
                    }
                    queue.push_back(node_id);
                    continue;
                }

                self.ensure_running(exec_state, node_id)?;

                if node.is_loop_node() {
                    let base_input =
                        build_input(node_id, start, &entry, connections, outputs);
                    match self
                        .run_loop_node(workflow, node, &base_input, ctx, exec_state, outputs)
                        .await
                    {
                        Ok(LoopOutcome::Done(output)) => {
                            outputs.insert(node_id, output.clone());
                            self.mark_completed(
                                node_id,
                                output,
                                &graph,
                                connections,
                                exec_state,
                                outputs,
                                &mut pending_deps,
                                &mut live_input,
                                &mut queue,
                            )?;
                        }
                        Ok(LoopOutcome::Cancelled) => {
                            let _ = exec_state
                                .node_states
                                .get_mut(&node_id)
                                .expect("node state exists")
                                .transition_to(NodeState::Cancelled);
                        }
                        Err(e) => return Err(e),
                    }
                    continue;
                }

                ctx.record_invocation(node_id);
                let input = build_input(node_id, start, &entry, connections, outputs);
                if ctx.save_to_database {
                    self.recorder.start_node(ctx.execution_id, node_id, &input).await;
                }
                self.telemetry.event_bus().emit(ExecutionEvent::NodeStarted {
                    execution_id: ctx.execution_id,
                    node_id,
                });

                let node_ctx = NodeExecutionContext {
                    execution_id: ctx.execution_id,
                    workflow_id: ctx.workflow_id,
                    node_id,
                    iteration: 0,
                    cancellation: ctx.cancellation.clone(),
                    credentials: self.credentials.clone(),
                };

                let started_at = Instant::now();
                let result = self
                    .executor
                    .execute(&node.node_type, input, &node.parameters, &node_ctx)
                    .await;
                let duration = started_at.elapsed();

                self.handle_node_result(
                    node,
                    result,
                    duration,
                    &graph,
                    connections,
                    ctx,
                    exec_state,
                    outputs,
                    &mut pending_deps,
                    &mut live_input,
                    &mut queue,
                )
                .await?;
            }

            if ctx.cancellation.is_cancelled() {
                for n in graph.scoped_nodes() {
                    if let Some(ns) = exec_state.node_states.get_mut(&n) {
                        if !ns.state.is_terminal() {
                            let _ = ns.transition_to(NodeState::Cancelled);
                        }
                    }
                }
            }

            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_node_result(
        &self,
        node: &Node,
        result: Result<NodeExecResult, crate::executor::NodeExecutorError>,
        duration: std::time::Duration,
        graph: &DependencyGraph,
        connections: &[Connection],
        ctx: &ExecutionContext,
        exec_state: &mut ExecutionState,
        outputs: &mut HashMap<NodeId, NodeOutput>,
        pending_deps: &mut HashMap<NodeId, usize>,
        live_input: &mut HashMap<NodeId, bool>,
        queue: &mut VecDeque<NodeId>,
    ) -> Result<(), EngineError> {
        let node_id = node.id;
        match result {
            Err(e) => {
                let message = e.to_string();
                if ctx.save_to_database {
                    self.recorder
                        .finish_node(ctx.execution_id, node_id, NodeState::Failed, None, Some(&message))
                        .await;
                }
                self.telemetry.event_bus().emit(ExecutionEvent::NodeFailed {
                    execution_id: ctx.execution_id,
                    node_id,
                    error: message.clone(),
                });
                self.mark_failed(
                    node_id,
                    &message,
                    graph,
                    connections,
                    exec_state,
                    outputs,
                    pending_deps,
                    live_input,
                    queue,
                )
            }
            Ok(r) if r.success => {
                if ctx.save_to_database {
                    self.recorder
                        .finish_node(ctx.execution_id, node_id, NodeState::Completed, Some(&r.output), None)
                        .await;
                }
                self.telemetry.event_bus().emit(ExecutionEvent::NodeCompleted {
                    execution_id: ctx.execution_id,
                    node_id,
                    duration,
                    active_connection_ids: active_connection_ids(node_id, &r.output, connections),
                });
                outputs.insert(node_id, r.output.clone());
                self.mark_completed(
                    node_id,
                    r.output,
                    graph,
                    connections,
                    exec_state,
                    outputs,
                    pending_deps,
                    live_input,
                    queue,
                )
            }
            Ok(r) if node.settings.continue_on_fail => {
                if ctx.save_to_database {
                    self.recorder
                        .finish_node(
                            ctx.execution_id,
                            node_id,
                            NodeState::Completed,
                            Some(&r.output),
                            r.error.as_deref(),
                        )
                        .await;
                }
                self.telemetry.event_bus().emit(ExecutionEvent::NodeCompleted {
                    execution_id: ctx.execution_id,
                    node_id,
                    duration,
                    active_connection_ids: active_connection_ids(node_id, &r.output, connections),
                });
                outputs.insert(node_id, r.output.clone());
                if let Some(ns) = exec_state.node_states.get_mut(&node_id) {
                    ns.error_message.clone_from(&r.error);
                }
                self.mark_completed(
                    node_id,
                    r.output,
                    graph,
                    connections,
                    exec_state,
                    outputs,
                    pending_deps,
                    live_input,
                    queue,
                )
            }
            Ok(r) => {
                let message = r.error.unwrap_or_else(|| "node reported failure".to_string());
                if ctx.save_to_database {
                    self.recorder
                        .finish_node(
                            ctx.execution_id,
                            node_id,
                            NodeState::Failed,
                            Some(&r.output),
                            Some(&message),
                        )
                        .await;
                }
                self.telemetry.event_bus().emit(ExecutionEvent::NodeFailed {
                    execution_id: ctx.execution_id,
                    node_id,
                    error: message.clone(),
                });
                self.mark_failed(
                    node_id,
                    &message,
                    graph,
                    connections,
                    exec_state,
                    outputs,
                    pending_deps,
                    live_input,
                    queue,
                )
            }
        }
    }

    /// Drive the loop node's repeated invocation (spec §4.4.4): each call
    /// that yields `loop` items runs the loop body as a nested sub-run of
    /// the same execution and re-invokes the loop node with the same base
    /// input; a call yielding `done` items ends the loop.
    #[allow(clippy::too_many_arguments)]
    fn run_loop_node<'a>(
        &'a self,
        workflow: &'a Workflow,
        node: &'a Node,
        base_input: &'a NodeInput,
        ctx: &'a ExecutionContext,
        exec_state: &'a mut ExecutionState,
        outputs: &'a mut HashMap<NodeId, NodeOutput>,
    ) -> Pin<Box<dyn Future<Output = Result<LoopOutcome, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let mut iteration: u64 = 0;
            loop {
                if ctx.cancellation.is_cancelled() {
                    return Ok(LoopOutcome::Cancelled);
                }
                iteration += 1;
                if iteration > self.config.max_loop_iterations {
                    return Err(EngineError::LoopIterationLimit(node.id));
                }

                let node_ctx = NodeExecutionContext {
                    execution_id: ctx.execution_id,
                    workflow_id: ctx.workflow_id,
                    node_id: node.id,
                    iteration,
                    cancellation: ctx.cancellation.clone(),
                    credentials: self.credentials.clone(),
                };

                if ctx.save_to_database {
                    self.recorder
                        .start_node(ctx.execution_id, node.id, base_input)
                        .await;
                }
                let result = self
                    .executor
                    .execute(&node.node_type, base_input.clone(), &node.parameters, &node_ctx)
                    .await
                    .map_err(|source| EngineError::NodeFailure { node_id: node.id, source })?;

                if !result.success {
                    let message = result
                        .error
                        .unwrap_or_else(|| "loop node reported failure".to_string());
                    return Err(EngineError::NodeFailure {
                        node_id: node.id,
                        source: crate::executor::NodeExecutorError::Failed(message),
                    });
                }

                let output = result.output;
                let loop_items: Vec<Item> = output.branch("loop").unwrap_or(&[]).to_vec();
                let done_items_empty = output.branch("done").unwrap_or(&[]).is_empty();

                if loop_items.is_empty() && done_items_empty {
                    return Err(EngineError::LoopStuck(node.id));
                }

                if loop_items.is_empty() {
                    if ctx.save_to_database {
                        self.recorder
                            .finish_node(ctx.execution_id, node.id, NodeState::Completed, Some(&output), None)
                            .await;
                    }
                    return Ok(LoopOutcome::Done(output));
                }

                // The body's own scope must never see the loop node again --
                // its `done` port would otherwise pull the post-loop
                // continuation into every iteration, and a workflow where
                // the body's last node wires back to the loop node would
                // look cyclic to `DependencyGraph::build`.
                let body_connections: Vec<Connection> = ctx
                    .connections
                    .iter()
                    .filter(|c| c.source_node_id != node.id && c.target_node_id != node.id)
                    .cloned()
                    .collect();
                let entry_nodes: Vec<NodeId> = ctx
                    .connections
                    .iter()
                    .filter(|c| c.source_node_id == node.id && c.source_output == "loop")
                    .map(|c| c.target_node_id)
                    .collect();

                for entry_node in entry_nodes {
                    self.run_scope(
                        workflow,
                        &body_connections,
                        entry_node,
                        EntryInput::Items(loop_items.clone()),
                        ctx,
                        exec_state,
                        outputs,
                    )
                    .await?;
                }
            }
        })
    }

    fn ensure_running(
        &self,
        exec_state: &mut ExecutionState,
        node_id: NodeId,
    ) -> Result<(), EngineError> {
        let ns = exec_state
            .node_states
            .get_mut(&node_id)
            .expect("node state exists before invocation");
        match ns.state {
            NodeState::Idle => {
                ns.transition_to(NodeState::Queued).map_err(EngineError::State)?;
                ns.transition_to(NodeState::Running).map_err(EngineError::State)?;
            }
            NodeState::Queued => {
                ns.transition_to(NodeState::Running).map_err(EngineError::State)?;
            }
            _ => {}
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn mark_completed(
        &self,
        node_id: NodeId,
        output: NodeOutput,
        graph: &DependencyGraph,
        connections: &[Connection],
        exec_state: &mut ExecutionState,
        outputs: &HashMap<NodeId, NodeOutput>,
        pending_deps: &mut HashMap<NodeId, usize>,
        live_input: &mut HashMap<NodeId, bool>,
        queue: &mut VecDeque<NodeId>,
    ) -> Result<(), EngineError> {
        {
            let ns = exec_state
                .node_states
                .get_mut(&node_id)
                .expect("node state exists");
            ns.transition_to(NodeState::Completed).map_err(EngineError::State)?;
            ns.output_data = Some(output.clone());
        }
        self.propagate(
            node_id,
            true,
            &output,
            graph,
            connections,
            exec_state,
            outputs,
            pending_deps,
            live_input,
            queue,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn mark_failed(
        &self,
        node_id: NodeId,
        message: &str,
        graph: &DependencyGraph,
        connections: &[Connection],
        exec_state: &mut ExecutionState,
        outputs: &HashMap<NodeId, NodeOutput>,
        pending_deps: &mut HashMap<NodeId, usize>,
        live_input: &mut HashMap<NodeId, bool>,
        queue: &mut VecDeque<NodeId>,
    ) -> Result<(), EngineError> {
        self.ensure_running(exec_state, node_id)?;
        {
            let ns = exec_state
                .node_states
                .get_mut(&node_id)
                .expect("node state exists");
            ns.transition_to(NodeState::Failed).map_err(EngineError::State)?;
            ns.error_message = Some(message.to_string());
        }
        let empty = NodeOutput::plain("unknown", Vec::new());
        self.propagate(
            node_id,
            false,
            &empty,
            graph,
            connections,
            exec_state,
            outputs,
            pending_deps,
            live_input,
            queue,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn mark_skipped(
        &self,
        node_id: NodeId,
        graph: &DependencyGraph,
        connections: &[Connection],
        exec_state: &mut ExecutionState,
        outputs: &HashMap<NodeId, NodeOutput>,
        pending_deps: &mut HashMap<NodeId, usize>,
        live_input: &mut HashMap<NodeId, bool>,
        queue: &mut VecDeque<NodeId>,
    ) -> Result<(), EngineError> {
        exec_state
            .node_states
            .get_mut(&node_id)
            .expect("node state exists")
            .transition_to(NodeState::Skipped)
            .map_err(EngineError::State)?;
        let empty = NodeOutput::plain("unknown", Vec::new());
        self.propagate(
            node_id,
            false,
            &empty,
            graph,
            connections,
            exec_state,
            outputs,
            pending_deps,
            live_input,
            queue,
        )
    }

    /// Resolve each dependent's pending-dependency count as `node_id`
    /// reaches a terminal state, enqueueing it once all its dependencies
    /// have (or recursively skipping it if none delivered live data).
    #[allow(clippy::too_many_arguments)]
    fn propagate(
        &self,
        node_id: NodeId,
        completed: bool,
        output: &NodeOutput,
        graph: &DependencyGraph,
        connections: &[Connection],
        exec_state: &mut ExecutionState,
        outputs: &HashMap<NodeId, NodeOutput>,
        pending_deps: &mut HashMap<NodeId, usize>,
        live_input: &mut HashMap<NodeId, bool>,
        queue: &mut VecDeque<NodeId>,
    ) -> Result<(), EngineError> {
        for dependent in graph.dependents(node_id) {
            if exec_state
                .node_state(dependent)
                .is_some_and(|s| s.state.is_terminal())
            {
                continue;
            }

            if completed && edge_is_live(node_id, dependent, output, connections) {
                live_input.insert(dependent, true);
            }

            let remaining = pending_deps.entry(dependent).or_insert(0);
            *remaining = remaining.saturating_sub(1);
            if *remaining > 0 {
                continue;
            }

            if live_input.get(&dependent).copied().unwrap_or(false) {
                exec_state
                    .node_states
                    .get_mut(&dependent)
                    .expect("node state exists")
                    .transition_to(NodeState::Queued)
                    .map_err(EngineError::State)?;
                queue.push_back(dependent);
            } else {
                exec_state
                    .node_states
                    .get_mut(&dependent)
                    .expect("node state exists")
                    .transition_to(NodeState::Skipped)
                    .map_err(EngineError::State)?;
                let empty = NodeOutput::plain("unknown", Vec::new());
                self.propagate(
                    dependent,
                    false,
                    &empty,
                    graph,
                    connections,
                    exec_state,
                    outputs,
                    pending_deps,
                    live_input,
                    queue,
                )?;
            }
        }
        Ok(())
    }
}

enum LoopOutcome {
    Done(NodeOutput),
    Cancelled,
}

/// Drop every connection leaving a loop node's `loop` port.
///
/// Those edges exist in the authored graph so the editor can draw the loop
/// body as a branch of the loop node, but they are not part of the DAG the
/// scheduler walks -- `run_loop_node` drives the body directly, once per
/// iteration, with its own scope. Leaving them in would make
/// `DependencyGraph::build` see the body's eventual connection back to the
/// loop node as a cycle.
fn strip_loop_edges(workflow: &Workflow, connections: &[Connection]) -> Vec<Connection> {
    connections
        .iter()
        .filter(|c| {
            !workflow
                .node(c.source_node_id)
                .is_some_and(|n| n.is_loop_node() && c.source_output == "loop")
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticNodeExecutor;
    use nebula_core::{ExecutionId, UserId, WorkflowId};
    use nebula_execution::Item;
    use nebula_telemetry::service::NoopTelemetry;
    use nebula_workflow::Node;
    use std::collections::HashMap as Map;

    fn engine(executor: StaticNodeExecutor) -> FlowExecutionEngine {
        FlowExecutionEngine::new(Arc::new(executor), NoopTelemetry::arc())
    }

    fn run_ctx(workflow: &Workflow, start: NodeId) -> ExecutionContext {
        ExecutionContext::new(
            ExecutionId::v4(),
            workflow.id,
            UserId::v4(),
            start,
            serde_json::json!({"hello": "world"}),
            workflow.connections.clone(),
        )
    }

    #[tokio::test]
    async fn linear_workflow_completes_in_order() {
        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let start = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let fetch = Node::new(NodeId::v4(), "http-request", "Fetch");
        wf.connections.push(Connection::new(start.id, fetch.id));
        let (start_id, fetch_id) = (start.id, fetch.id);
        wf.nodes.push(start);
        wf.nodes.push(fetch);

        let executor = StaticNodeExecutor::new()
            .on(
                "manual-trigger",
                NodeOutput::plain("manual-trigger", vec![Item::json(serde_json::json!({"step": 1}))]),
            )
            .on(
                "http-request",
                NodeOutput::plain("http-request", vec![Item::json(serde_json::json!({"step": 2}))]),
            );
        let engine = engine(executor);
        let ctx = run_ctx(&wf, start_id);

        let outcome = engine.execute(&wf, start_id, ctx).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.execution_path, vec![start_id, fetch_id]);
        assert_eq!(outcome.outputs[&fetch_id].main[0].json, serde_json::json!({"step": 2}));
    }

    #[tokio::test]
    async fn recorder_is_untouched_when_save_to_database_is_false() {
        use crate::recorder::InMemoryRecorder;

        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let start = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let start_id = start.id;
        wf.nodes.push(start);

        let executor = StaticNodeExecutor::new().on(
            "manual-trigger",
            NodeOutput::plain("manual-trigger", vec![Item::json(serde_json::json!({"step": 1}))]),
        );
        let recorder = Arc::new(InMemoryRecorder::new());
        let engine = engine(executor).with_recorder(Arc::clone(&recorder) as Arc<dyn ExecutionRecorder>);
        let ctx = run_ctx(&wf, start_id);
        let execution_id = ctx.execution_id;

        let outcome = engine.execute(&wf, start_id, ctx).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert!(recorder.status_of(execution_id).is_none());
        assert!(recorder.node_state_of(execution_id, start_id).is_none());
    }

    #[tokio::test]
    async fn recorder_is_populated_when_save_to_database_is_true() {
        use crate::recorder::InMemoryRecorder;

        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let start = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let start_id = start.id;
        wf.nodes.push(start);

        let executor = StaticNodeExecutor::new().on(
            "manual-trigger",
            NodeOutput::plain("manual-trigger", vec![Item::json(serde_json::json!({"step": 1}))]),
        );
        let recorder = Arc::new(InMemoryRecorder::new());
        let engine = engine(executor).with_recorder(Arc::clone(&recorder) as Arc<dyn ExecutionRecorder>);
        let ctx = run_ctx(&wf, start_id).with_save_to_database(true);
        let execution_id = ctx.execution_id;

        let outcome = engine.execute(&wf, start_id, ctx).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(recorder.status_of(execution_id), Some(ExecutionStatus::Completed));
        assert_eq!(recorder.node_state_of(execution_id, start_id), Some(NodeState::Completed));
    }

    #[tokio::test]
    async fn if_node_skips_the_untaken_branch() {
        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let start = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let branch = Node::new(NodeId::v4(), "if", "Check");
        let on_true = Node::new(NodeId::v4(), "noop", "OnTrue");
        let on_false = Node::new(NodeId::v4(), "noop", "OnFalse");
        let (start_id, branch_id, true_id, false_id) = (start.id, branch.id, on_true.id, on_false.id);

        wf.connections.push(Connection::new(start_id, branch_id));
        wf.connections.push(Connection::with_ports(branch_id, "true", true_id, "main"));
        wf.connections.push(Connection::with_ports(branch_id, "false", false_id, "main"));
        wf.nodes.extend([start, branch, on_true, on_false]);

        let mut branches = Map::new();
        branches.insert("true".to_string(), vec![Item::json(serde_json::json!("yes"))]);
        branches.insert("false".to_string(), Vec::new());

        let executor = StaticNodeExecutor::new()
            .on("manual-trigger", NodeOutput::plain("manual-trigger", vec![Item::json(serde_json::json!({}))]))
            .on("if", NodeOutput::branching("if", branches))
            .on("noop", NodeOutput::plain("noop", vec![Item::json(serde_json::json!("ran"))]));
        let engine = engine(executor);
        let ctx = run_ctx(&wf, start_id);

        let outcome = engine.execute(&wf, start_id, ctx).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert!(outcome.outputs.contains_key(&true_id));
        assert!(!outcome.outputs.contains_key(&false_id));
        assert_eq!(
            outcome.node_states[&false_id].state,
            NodeState::Skipped
        );
    }

    #[tokio::test]
    async fn continue_on_fail_node_completes_with_error_recorded() {
        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let start = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let mut flaky = Node::new(NodeId::v4(), "http-request", "Flaky");
        flaky.settings.continue_on_fail = true;
        let (start_id, flaky_id) = (start.id, flaky.id);
        wf.connections.push(Connection::new(start_id, flaky_id));
        wf.nodes.push(start);
        wf.nodes.push(flaky);

        let executor = StaticNodeExecutor::new()
            .on("manual-trigger", NodeOutput::plain("manual-trigger", vec![Item::json(serde_json::json!({}))]));
        // Swap in a custom executor that reports a domain failure for the flaky node.
        struct Flaky(StaticNodeExecutor);
        #[async_trait::async_trait]
        impl NodeExecutor for Flaky {
            async fn execute(
                &self,
                node_type: &str,
                input: NodeInput,
                parameters: &serde_json::Value,
                ctx: &NodeExecutionContext,
            ) -> Result<NodeExecResult, crate::executor::NodeExecutorError> {
                if node_type == "http-request" {
                    return Ok(NodeExecResult::failure(
                        NodeOutput::plain("http-request", vec![Item::json(serde_json::json!({"error": "boom"}))]),
                        "boom",
                    ));
                }
                self.0.execute(node_type, input, parameters, ctx).await
            }
        }

        let engine = FlowExecutionEngine::new(Arc::new(Flaky(executor)), NoopTelemetry::arc());
        let ctx = run_ctx(&wf, start_id);

        let outcome = engine.execute(&wf, start_id, ctx).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.node_states[&flaky_id].state, NodeState::Completed);
        assert_eq!(
            outcome.node_states[&flaky_id].error_message.as_deref(),
            Some("boom")
        );
    }

    #[tokio::test]
    async fn loop_node_drains_body_then_continues_past_done() {
        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let start = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let iterate = Node::new(NodeId::v4(), "loop", "Iterate");
        let body = Node::new(NodeId::v4(), "noop", "Body");
        let after = Node::new(NodeId::v4(), "noop", "After");
        let (start_id, loop_id, body_id, after_id) = (start.id, iterate.id, body.id, after.id);

        wf.connections.push(Connection::new(start_id, loop_id));
        wf.connections.push(Connection::with_ports(loop_id, "loop", body_id, "main"));
        wf.connections.push(Connection::new(body_id, loop_id));
        wf.connections.push(Connection::with_ports(loop_id, "done", after_id, "main"));
        wf.nodes.extend([start, iterate, body, after]);

        struct CountingLoop {
            calls: std::sync::atomic::AtomicUsize,
        }
        #[async_trait::async_trait]
        impl NodeExecutor for CountingLoop {
            async fn execute(
                &self,
                node_type: &str,
                _input: NodeInput,
                _parameters: &serde_json::Value,
                _ctx: &NodeExecutionContext,
            ) -> Result<NodeExecResult, crate::executor::NodeExecutorError> {
                match node_type {
                    "manual-trigger" => Ok(NodeExecResult::success(NodeOutput::plain(
                        "manual-trigger",
                        vec![Item::json(serde_json::json!({}))],
                    ))),
                    "loop" => {
                        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        let mut branches = Map::new();
                        if n < 2 {
                            branches.insert(
                                "loop".to_string(),
                                vec![Item::json(serde_json::json!({"i": n}))],
                            );
                            branches.insert("done".to_string(), Vec::new());
                        } else {
                            branches.insert("loop".to_string(), Vec::new());
                            branches.insert(
                                "done".to_string(),
                                vec![Item::json(serde_json::json!({"finished": true}))],
                            );
                        }
                        Ok(NodeExecResult::success(NodeOutput::branching("loop", branches)))
                    }
                    "noop" => Ok(NodeExecResult::success(NodeOutput::plain(
                        "noop",
                        vec![Item::json(serde_json::json!("ran"))],
                    ))),
                    other => Err(crate::executor::NodeExecutorError::UnknownNodeType(other.to_string())),
                }
            }
        }

        let executor = CountingLoop {
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let engine = FlowExecutionEngine::new(Arc::new(executor), NoopTelemetry::arc());
        let ctx = run_ctx(&wf, start_id);

        let outcome = engine.execute(&wf, start_id, ctx).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.node_states[&loop_id].state, NodeState::Completed);
        assert_eq!(outcome.node_states[&after_id].state, NodeState::Completed);
        // The body ran once per loop iteration (2), not once per invocation of the loop node (3).
        let body_invocations = outcome
            .execution_path
            .iter()
            .filter(|id| **id == body_id)
            .count();
        assert_eq!(body_invocations, 2);
    }

    #[tokio::test]
    async fn cancellation_before_start_marks_execution_cancelled() {
        let mut wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let start = Node::new(NodeId::v4(), "manual-trigger", "Start");
        let start_id = start.id;
        wf.nodes.push(start);

        let executor = StaticNodeExecutor::new()
            .on("manual-trigger", NodeOutput::plain("manual-trigger", vec![Item::json(serde_json::json!({}))]));
        let engine = engine(executor);
        let ctx = run_ctx(&wf, start_id);
        ctx.cancel();

        let outcome = engine.execute(&wf, start_id, ctx).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn unknown_start_node_is_rejected() {
        let wf = Workflow::new(WorkflowId::v4(), UserId::v4());
        let executor = StaticNodeExecutor::new();
        let engine = engine(executor);
        let missing = NodeId::v4();
        let ctx = run_ctx(&wf, missing);

        let err = engine.execute(&wf, missing, ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::StartNodeNotFound(_)));
    }
}
