//! Evaluation entry points.
//!
//! An [`Evaluator`] borrows a built [`FlowGraph`] and runs passes over it.
//! Full passes come in four interchangeable strategies; selective passes
//! recompute only the nodes downstream of an explicit change set.

mod parallel;
mod sequential;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;

use crate::graph::{affected_from, FlowGraph, Node, NodeId};

/// How a full evaluation pass walks the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Rescan every node until a scan computes nothing. The simplest walk,
    /// quadratic in the worst case.
    RepeatedPass,
    /// Depth-first from each node through its inputs. Cached results act
    /// as the memoization boundary.
    Recursive,
    /// One sweep over the level index in ascending order.
    LevelSequential,
    /// Like `LevelSequential`, but each level is one parallel fork-join
    /// wave with a barrier before the next level.
    LevelParallel,
}

/// Runs evaluation passes over one graph.
pub struct Evaluator<'a> {
    graph: &'a FlowGraph,
}

impl<'a> Evaluator<'a> {
    pub fn new(graph: &'a FlowGraph) -> Self {
        Self { graph }
    }

    /// Run one full pass with the chosen strategy. Every live node ends
    /// the pass settled: holding either a result or a failure. Returns
    /// the number of nodes computed.
    pub fn evaluate_all(&self, strategy: Strategy) -> usize {
        let computed = match strategy {
            Strategy::RepeatedPass => sequential::repeated_pass(self.graph),
            Strategy::Recursive => sequential::recursive(self.graph),
            Strategy::LevelSequential => sequential::by_level(self.graph),
            Strategy::LevelParallel => parallel::level_synchronous(self.graph),
        };
        tracing::debug!(?strategy, computed, "full evaluation pass finished");
        computed
    }

    /// Recompute only what `changed` invalidates.
    ///
    /// Each changed node is expected to be current already: either cleared
    /// (so this walk recomputes it) or freshly re-supplied via
    /// [`set`](crate::graph::Value::set) (so this walk keeps it and
    /// recomputes its consumers). The affected set is `changed` plus
    /// everything reachable over child edges; every affected node other
    /// than the changed ones has its stale state discarded up front, then
    /// the set is recomputed in ascending level order. Nodes outside the
    /// set keep their cached results and counters. Returns the size of
    /// the affected set; an empty change set is a no-op.
    pub fn evaluate_from(&self, changed: &[Arc<dyn Node>]) -> usize {
        self.recompute_affected(changed, false)
    }

    /// Like [`evaluate_from`](Evaluator::evaluate_from), but each level of
    /// the affected set runs as one parallel fork-join wave.
    pub fn evaluate_from_parallel(&self, changed: &[Arc<dyn Node>]) -> usize {
        self.recompute_affected(changed, true)
    }

    fn recompute_affected(&self, changed: &[Arc<dyn Node>], parallel: bool) -> usize {
        if changed.is_empty() {
            return 0;
        }

        let changed_ids: HashSet<NodeId> = changed.iter().map(|node| node.id()).collect();
        let affected = affected_from(changed);
        tracing::debug!("recomputing {} affected node(s)", affected.len());

        // Stale downstream results must go before the walk starts. A
        // leftover result at an already-passed level would otherwise be
        // mistaken for a fresh one and short-circuit the level scan.
        for node in &affected {
            if !changed_ids.contains(&node.id()) {
                node.clear();
            }
        }

        let mut waves: BTreeMap<u32, Vec<&Arc<dyn Node>>> = BTreeMap::new();
        for node in &affected {
            waves.entry(node.level()).or_default().push(node);
        }
        for wave in waves.values() {
            if parallel {
                wave.par_iter()
                    .filter(|node| !node.has_result())
                    .for_each(|node| node.compute());
            } else {
                for node in wave {
                    if !node.has_result() {
                        node.compute();
                    }
                }
            }
        }
        affected.len()
    }
}
