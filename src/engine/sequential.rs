//! Single-threaded evaluation strategies.
//!
//! All three walk the same graph and settle the same set of nodes; they
//! differ in how much scanning they do and in the order independently-ready
//! nodes run. A node is computed at most once per call, and never before
//! every one of its inputs has settled (stored a result or a failure).

use std::collections::HashSet;
use std::sync::Arc;

use crate::graph::{FlowGraph, Node, NodeId};

/// Repeatedly scans the whole roster, computing every node whose inputs
/// have all settled, until a scan computes nothing. Correct but quadratic
/// in the worst case. Returns the number of nodes computed.
pub(crate) fn repeated_pass(graph: &FlowGraph) -> usize {
    let roster = graph.nodes();
    let mut attempted: HashSet<NodeId> = HashSet::new();
    let mut total = 0;

    loop {
        let mut computed = 0;
        for node in &roster {
            if node.has_result() || attempted.contains(&node.id()) {
                continue;
            }
            if node.parents().iter().all(|parent| parent.is_settled()) {
                node.compute();
                attempted.insert(node.id());
                computed += 1;
            }
        }
        tracing::trace!("scan computed {computed} node(s)");
        if computed == 0 {
            break;
        }
        total += computed;
    }
    total
}

/// Depth-first on-demand evaluation: each node first ensures all of its
/// inputs, then computes itself. A node that already holds a result is
/// left alone, which is what makes re-runs after a partial clear cheap.
/// Recursion depth is bounded by the graph depth.
pub(crate) fn recursive(graph: &FlowGraph) -> usize {
    let mut attempted: HashSet<NodeId> = HashSet::new();
    let mut computed = 0;
    for node in graph.nodes() {
        descend(&node, &mut attempted, &mut computed);
    }
    computed
}

fn descend(node: &Arc<dyn Node>, attempted: &mut HashSet<NodeId>, computed: &mut usize) {
    if node.has_result() || !attempted.insert(node.id()) {
        return;
    }
    for parent in node.parents() {
        descend(parent, attempted, computed);
    }
    node.compute();
    *computed += 1;
}

/// Walks levels in ascending order, computing every node in the level that
/// lacks a result. Inputs are always settled first because every input
/// lives at a strictly lower level.
pub(crate) fn by_level(graph: &FlowGraph) -> usize {
    let mut computed = 0;
    for bucket in graph.live_levels() {
        for node in bucket {
            if !node.has_result() {
                node.compute();
                computed += 1;
            }
        }
    }
    computed
}
