//! Per-connection node input assembly (spec §4.4.1) and branch-gating
//! helpers (spec §4.4.2).

use std::collections::HashMap;

use nebula_core::NodeId;
use nebula_execution::{Item, NodeInput, NodeOutput};
use nebula_workflow::Connection;

/// How the synthetic input for a scope's entry node (the node with no
/// incoming connections within this scope) is produced.
#[derive(Debug, Clone)]
pub(crate) enum EntryInput {
    /// The top-level run: `main[0]` is a single item wrapping the raw
    /// trigger payload.
    Trigger(serde_json::Value),
    /// A nested loop-body sub-run: `main[0]` is the loop node's `loop`
    /// branch items for this iteration.
    Items(Vec<Item>),
}

/// Assemble a node's input: one sublist per incoming connection, each
/// drawn from the matching branch (or `main`, for non-branching producers)
/// of its source's recorded output.
pub(crate) fn build_input(
    node_id: NodeId,
    scope_start: NodeId,
    entry: &EntryInput,
    connections: &[Connection],
    outputs: &HashMap<NodeId, NodeOutput>,
) -> NodeInput {
    let incoming: Vec<&Connection> = connections
        .iter()
        .filter(|c| c.target_node_id == node_id)
        .collect();

    if incoming.is_empty() {
        if node_id == scope_start {
            return match entry {
                EntryInput::Trigger(value) => NodeInput {
                    main: vec![vec![Item::json(value.clone())]],
                },
                EntryInput::Items(items) => NodeInput {
                    main: vec![items.clone()],
                },
            };
        }
        return NodeInput::empty();
    }

    let main = incoming
        .into_iter()
        .map(|c| contribution(c, outputs))
        .collect();
    NodeInput { main }
}

fn contribution(connection: &Connection, outputs: &HashMap<NodeId, NodeOutput>) -> Vec<Item> {
    match outputs.get(&connection.source_node_id) {
        Some(output) => match &output.branches {
            Some(_) => output
                .branch(&connection.source_output)
                .map(<[Item]>::to_vec)
                .unwrap_or_default(),
            None => output.main.clone(),
        },
        None => Vec::new(),
    }
}

/// Returns `true` if any connection from `source` to `target` carries data,
/// per the source's recorded output (spec §4.4.2 branch gating).
pub(crate) fn edge_is_live(
    source: NodeId,
    target: NodeId,
    output: &NodeOutput,
    connections: &[Connection],
) -> bool {
    connections
        .iter()
        .filter(|c| c.source_node_id == source && c.target_node_id == target)
        .any(|c| output.port_non_empty(&c.source_output))
}

/// The ids of every connection from `source` whose port carried data,
/// for the `NodeCompleted` event's `active_connection_ids` (spec §4.6).
pub(crate) fn active_connection_ids(
    source: NodeId,
    output: &NodeOutput,
    connections: &[Connection],
) -> Vec<uuid::Uuid> {
    connections
        .iter()
        .filter(|c| c.source_node_id == source && output.port_non_empty(&c.source_output))
        .map(|c| c.id)
        .collect()
}
