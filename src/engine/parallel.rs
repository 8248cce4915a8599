//! The level-synchronous parallel strategy.
//!
//! One fork-join wave per level: every node in the level that lacks a
//! result is computed by its own rayon task, and the wave joins before the
//! next level starts. The join is the barrier that makes every write of
//! level L visible to every read at level L+1. Nodes inside one level never
//! depend on each other, so their relative order is unspecified.
//!
//! There is no persistent worker pool of our own and no pipelining across
//! levels; rayon's global pool bounds the parallelism.

use std::sync::Arc;

use rayon::prelude::*;

use crate::graph::{FlowGraph, Node};

pub(crate) fn level_synchronous(graph: &FlowGraph) -> usize {
    let mut computed = 0;
    for bucket in graph.live_levels() {
        let wave: Vec<Arc<dyn Node>> = bucket
            .into_iter()
            .filter(|node| !node.has_result())
            .collect();
        if wave.is_empty() {
            continue;
        }
        computed += wave.len();
        wave.par_iter().for_each(|node| node.compute());
    }
    computed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn parallel_walk_matches_the_sequential_result() {
        let mut graph = FlowGraph::new();
        let mid = graph.source(|| 1.0);
        let spread = graph.source(|| 0.1);
        let quote = graph.derive2(&mid, &spread, |m, s| (m - s, m + s));
        let widened = graph.derive2(&quote, &spread, |q, s| (q.0 - s, q.1 + s));

        assert_eq!(level_synchronous(&graph), 4);
        assert_eq!(quote.get().unwrap(), (1.0 - 0.1, 1.0 + 0.1));
        assert_eq!(
            widened.get().unwrap(),
            ((1.0 - 0.1) - 0.1, (1.0 + 0.1) + 0.1)
        );

        // Cached results survive a second wave untouched.
        assert_eq!(level_synchronous(&graph), 0);
        assert_eq!(quote.success_count(), 1);
    }

    #[test]
    fn wide_levels_settle_in_one_pass() {
        let mut graph = FlowGraph::new();
        let base = graph.source(|| 1.0_f64);
        let shifted: Vec<_> = (0..64)
            .map(|i| graph.derive1(&base, move |b| b + i as f64))
            .collect();
        let total = graph.derive_all(&shifted, |xs| xs.iter().sum::<f64>());

        assert_eq!(level_synchronous(&graph), 66);
        let expected: f64 = (0..64).map(|i| 1.0 + i as f64).sum();
        assert_eq!(total.get().unwrap(), expected);
        assert!(shifted.iter().all(|node| node.success_count() == 1));
    }

    #[test]
    fn a_level_joins_before_the_next_level_reads() {
        // Record which thread computed each mid-level node. Whatever the
        // interleaving, the aggregation at the next level must observe
        // every write from the wave below it.
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let mut graph = FlowGraph::new();
        let base = graph.source(|| 2.0_f64);
        let squares: Vec<_> = (0..32)
            .map(|_| {
                let seen = Arc::clone(&seen);
                graph.derive1(&base, move |b| {
                    seen.lock()
                        .expect("thread set lock poisoned")
                        .insert(thread::current().id());
                    b * b
                })
            })
            .collect();
        let sum = graph.derive_all(&squares, |xs| xs.iter().sum::<f64>());

        level_synchronous(&graph);
        assert_eq!(sum.get().unwrap(), 32.0 * 4.0);
        assert!(!seen.lock().expect("thread set lock poisoned").is_empty());
    }
}
