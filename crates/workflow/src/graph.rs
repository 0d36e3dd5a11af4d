//! Dependency graph construction and per-trigger execution scoping.

use std::collections::{HashMap, HashSet, VecDeque};

use nebula_core::NodeId;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::connection::Connection;
use crate::error::WorkflowError;

/// A dependency graph derived from a workflow's connections, restricted to
/// the set of nodes reachable forward from a single starting node.
///
/// This is the *per-trigger execution scope* (spec §4.4, "scope R"): an
/// unrelated upstream trigger converging on a shared node must not force
/// this run to wait on it, so only nodes reachable from `start` are
/// considered.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<NodeId, ()>,
    index_of: HashMap<NodeId, NodeIndex>,
    start: NodeId,
}

impl DependencyGraph {
    /// Build the scoped dependency graph for a run starting at `start`,
    /// using `all_connections` as the full workflow's connection set.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Cycle`] if the scoped subgraph contains a
    /// cycle.
    pub fn build(
        start: NodeId,
        all_connections: &[Connection],
    ) -> Result<Self, WorkflowError> {
        let reachable = reachable_from(start, all_connections);

        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        for &node_id in &reachable {
            let idx = graph.add_node(node_id);
            index_of.insert(node_id, idx);
        }

        for conn in all_connections {
            if reachable.contains(&conn.source_node_id) && reachable.contains(&conn.target_node_id)
            {
                let source = index_of[&conn.source_node_id];
                let target = index_of[&conn.target_node_id];
                graph.add_edge(source, target, ());
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(WorkflowError::Cycle);
        }

        Ok(Self {
            graph,
            index_of,
            start,
        })
    }

    /// The starting node this scope was built from.
    #[must_use]
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// All node ids within the execution scope (reachable from `start`,
    /// including `start` itself).
    #[must_use]
    pub fn scoped_nodes(&self) -> Vec<NodeId> {
        self.graph.node_weights().copied().collect()
    }

    /// Returns `true` if `node_id` is within the execution scope.
    #[must_use]
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.index_of.contains_key(&node_id)
    }

    /// Upstream node ids of `node_id`, intersected with the execution scope.
    #[must_use]
    pub fn dependencies(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index_of.get(&node_id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .map(|i| self.graph[i])
            .collect()
    }

    /// Downstream node ids of `node_id` within the execution scope.
    #[must_use]
    pub fn dependents(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index_of.get(&node_id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .map(|i| self.graph[i])
            .collect()
    }

    /// Connections outgoing from `node_id` restricted to the given source
    /// output port, within the execution scope. Used to find the loop
    /// node's `loop`/`done` branch targets (§4.4.4).
    #[must_use]
    pub fn dependents_via_port<'a>(
        &self,
        node_id: NodeId,
        port: &str,
        all_connections: &'a [Connection],
    ) -> Vec<NodeId> {
        all_connections
            .iter()
            .filter(|c| {
                c.source_node_id == node_id
                    && c.source_output == port
                    && self.contains(c.target_node_id)
            })
            .map(|c| c.target_node_id)
            .collect()
    }
}

/// BFS over `connections` for every node forward-reachable from `start`,
/// including `start` itself.
fn reachable_from(start: NodeId, connections: &[Connection]) -> HashSet<NodeId> {
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for conn in connections {
        adjacency
            .entry(conn.source_node_id)
            .or_default()
            .push(conn.target_node_id);
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        if let Some(neighbors) = adjacency.get(&current) {
            for &next in neighbors {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }

    visited
}

/// Validate a full workflow's connection set (not scoped to any single
/// trigger): every endpoint must resolve to a known node, self-connections
/// are rejected, and the whole graph must be acyclic.
///
/// # Errors
/// See [`WorkflowError`] variants for the specific violation.
pub fn validate_connections(
    known_nodes: &HashSet<NodeId>,
    connections: &[Connection],
) -> Result<(), WorkflowError> {
    for conn in connections {
        if conn.is_self_connection() {
            return Err(WorkflowError::SelfConnection(conn.source_node_id));
        }
        if !known_nodes.contains(&conn.source_node_id) {
            return Err(WorkflowError::DanglingConnection(conn.source_node_id));
        }
        if !known_nodes.contains(&conn.target_node_id) {
            return Err(WorkflowError::DanglingConnection(conn.target_node_id));
        }
    }

    let mut graph = DiGraph::<NodeId, ()>::new();
    let mut index_of = HashMap::new();
    for &node_id in known_nodes {
        index_of.insert(node_id, graph.add_node(node_id));
    }
    for conn in connections {
        graph.add_edge(
            index_of[&conn.source_node_id],
            index_of[&conn.target_node_id],
            (),
        );
    }

    if is_cyclic_directed(&graph) {
        return Err(WorkflowError::Cycle);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        NodeId::v4()
    }

    #[test]
    fn scope_includes_only_reachable_nodes() {
        let start = node();
        let mid = node();
        let leaf = node();
        let unrelated = node();

        let connections = vec![
            Connection::new(start, mid),
            Connection::new(mid, leaf),
        ];
        // `unrelated` has no edge to/from the scope.
        let _ = unrelated;

        let graph = DependencyGraph::build(start, &connections).unwrap();
        let scoped = graph.scoped_nodes();
        assert_eq!(scoped.len(), 3);
        assert!(graph.contains(start));
        assert!(graph.contains(mid));
        assert!(graph.contains(leaf));
        assert!(!graph.contains(unrelated));
    }

    #[test]
    fn dependencies_and_dependents_computed_within_scope() {
        let start = node();
        let a = node();
        let b = node();
        let connections = vec![Connection::new(start, a), Connection::new(a, b)];

        let graph = DependencyGraph::build(start, &connections).unwrap();
        assert_eq!(graph.dependencies(a), vec![start]);
        assert_eq!(graph.dependents(a), vec![b]);
        assert!(graph.dependencies(start).is_empty());
        assert!(graph.dependents(b).is_empty());
    }

    #[test]
    fn diamond_shape_scope() {
        let start = node();
        let left = node();
        let right = node();
        let join = node();
        let connections = vec![
            Connection::new(start, left),
            Connection::new(start, right),
            Connection::new(left, join),
            Connection::new(right, join),
        ];

        let graph = DependencyGraph::build(start, &connections).unwrap();
        let mut deps = graph.dependencies(join);
        deps.sort();
        let mut expected = vec![left, right];
        expected.sort();
        assert_eq!(deps, expected);
    }

    #[test]
    fn cyclic_scope_rejected() {
        let start = node();
        let a = node();
        let connections = vec![Connection::new(start, a), Connection::new(a, start)];

        let err = DependencyGraph::build(start, &connections).unwrap_err();
        assert_eq!(err, WorkflowError::Cycle);
    }

    #[test]
    fn single_node_no_connections() {
        let start = node();
        let graph = DependencyGraph::build(start, &[]).unwrap();
        assert_eq!(graph.scoped_nodes(), vec![start]);
    }

    #[test]
    fn dependents_via_port_filters_by_source_output() {
        let start = node();
        let loop_target = node();
        let done_target = node();
        let connections = vec![
            Connection::with_ports(start, "loop", loop_target, "main"),
            Connection::with_ports(start, "done", done_target, "main"),
        ];

        let graph = DependencyGraph::build(start, &connections).unwrap();
        assert_eq!(
            graph.dependents_via_port(start, "loop", &connections),
            vec![loop_target]
        );
        assert_eq!(
            graph.dependents_via_port(start, "done", &connections),
            vec![done_target]
        );
    }

    #[test]
    fn validate_connections_rejects_self_connection() {
        let a = node();
        let known: HashSet<NodeId> = [a].into_iter().collect();
        let err = validate_connections(&known, &[Connection::new(a, a)]).unwrap_err();
        assert_eq!(err, WorkflowError::SelfConnection(a));
    }

    #[test]
    fn validate_connections_rejects_dangling_endpoint() {
        let a = node();
        let b = node();
        let known: HashSet<NodeId> = [a].into_iter().collect();
        let err = validate_connections(&known, &[Connection::new(a, b)]).unwrap_err();
        assert_eq!(err, WorkflowError::DanglingConnection(b));
    }

    #[test]
    fn validate_connections_rejects_cycle() {
        let a = node();
        let b = node();
        let known: HashSet<NodeId> = [a, b].into_iter().collect();
        let connections = vec![Connection::new(a, b), Connection::new(b, a)];
        let err = validate_connections(&known, &connections).unwrap_err();
        assert_eq!(err, WorkflowError::Cycle);
    }

    #[test]
    fn validate_connections_accepts_acyclic_graph() {
        let a = node();
        let b = node();
        let known: HashSet<NodeId> = [a, b].into_iter().collect();
        assert!(validate_connections(&known, &[Connection::new(a, b)]).is_ok());
    }
}
