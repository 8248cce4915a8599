//! Graph construction and the structural queries the evaluation strategies
//! rely on: the creation-order roster, the level index, and the
//! affected-set closure over child edges.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::sync::{Arc, Weak};

use smallvec::smallvec;

use crate::error::EvalError;
use crate::graph::node::{Node, NodeId};
use crate::graph::value::{ParentList, Recipe, Value};

/// Builder and index for one dependency graph.
///
/// The graph itself does not own its nodes. Each attached node is held
/// strongly by the caller's handle and by every downstream node that lists
/// it as an input; the graph only keeps weak registrations so it can walk
/// levels without pinning anything alive. A node whose last strong holder
/// is gone silently drops out of every walk.
///
/// Levels are assigned at attach time as one more than the highest input
/// level (0 for a node without inputs), so any ascending-level traversal
/// evaluates inputs strictly before their consumers.
#[derive(Debug, Default)]
pub struct FlowGraph {
    /// All registrations in creation order.
    order: Vec<Weak<dyn Node>>,
    /// Registrations bucketed by level, each bucket in creation order.
    levels: Vec<Vec<Weak<dyn Node>>>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a root whose supplier runs on every (re)computation.
    ///
    /// The cell starts absent. Like any other node it is filled in by an
    /// evaluation pass, not at attach time.
    pub fn source<T, F>(&mut self, supplier: F) -> Value<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.try_source(move || Ok::<_, Infallible>(supplier()))
    }

    /// Fallible flavor of [`source`](FlowGraph::source).
    pub fn try_source<T, E, F>(&mut self, supplier: F) -> Value<T>
    where
        T: Clone + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let id = NodeId::next();
        let recipe: Recipe<T> =
            Box::new(move || supplier().map_err(|e| EvalError::computation(id, e)));
        self.insert(id, ParentList::new(), recipe)
    }

    /// Attach a root that always produces the given value.
    pub fn constant<T>(&mut self, value: T) -> Value<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.source(move || value.clone())
    }

    /// Attach a node computed from one input.
    pub fn derive1<A, T, F>(&mut self, a: &Value<A>, f: F) -> Value<T>
    where
        A: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        self.try_derive1(a, move |x| Ok::<_, Infallible>(f(x)))
    }

    /// Fallible flavor of [`derive1`](FlowGraph::derive1).
    pub fn try_derive1<A, T, E, F>(&mut self, a: &Value<A>, f: F) -> Value<T>
    where
        A: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
    {
        let id = NodeId::next();
        let pa = a.clone();
        let recipe: Recipe<T> = Box::new(move || {
            let x = pull(&pa, id)?;
            f(x).map_err(|e| EvalError::computation(id, e))
        });
        self.insert(id, smallvec![a.handle()], recipe)
    }

    /// Attach a node computed from two inputs.
    pub fn derive2<A, B, T, F>(&mut self, a: &Value<A>, b: &Value<B>, f: F) -> Value<T>
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: Fn(A, B) -> T + Send + Sync + 'static,
    {
        self.try_derive2(a, b, move |x, y| Ok::<_, Infallible>(f(x, y)))
    }

    /// Fallible flavor of [`derive2`](FlowGraph::derive2).
    pub fn try_derive2<A, B, T, E, F>(&mut self, a: &Value<A>, b: &Value<B>, f: F) -> Value<T>
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(A, B) -> Result<T, E> + Send + Sync + 'static,
    {
        let id = NodeId::next();
        let pa = a.clone();
        let pb = b.clone();
        let recipe: Recipe<T> = Box::new(move || {
            let x = pull(&pa, id)?;
            let y = pull(&pb, id)?;
            f(x, y).map_err(|e| EvalError::computation(id, e))
        });
        self.insert(id, smallvec![a.handle(), b.handle()], recipe)
    }

    /// Attach a node computed from three inputs.
    pub fn derive3<A, B, C, T, F>(
        &mut self,
        a: &Value<A>,
        b: &Value<B>,
        c: &Value<C>,
        f: F,
    ) -> Value<T>
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: Fn(A, B, C) -> T + Send + Sync + 'static,
    {
        self.try_derive3(a, b, c, move |x, y, z| Ok::<_, Infallible>(f(x, y, z)))
    }

    /// Fallible flavor of [`derive3`](FlowGraph::derive3).
    pub fn try_derive3<A, B, C, T, E, F>(
        &mut self,
        a: &Value<A>,
        b: &Value<B>,
        c: &Value<C>,
        f: F,
    ) -> Value<T>
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(A, B, C) -> Result<T, E> + Send + Sync + 'static,
    {
        let id = NodeId::next();
        let pa = a.clone();
        let pb = b.clone();
        let pc = c.clone();
        let recipe: Recipe<T> = Box::new(move || {
            let x = pull(&pa, id)?;
            let y = pull(&pb, id)?;
            let z = pull(&pc, id)?;
            f(x, y, z).map_err(|e| EvalError::computation(id, e))
        });
        self.insert(id, smallvec![a.handle(), b.handle(), c.handle()], recipe)
    }

    /// Attach a node computed from a homogeneous list of inputs, for
    /// aggregations like a min or max over sibling results. The input
    /// order is preserved.
    pub fn derive_all<A, T, F>(&mut self, inputs: &[Value<A>], f: F) -> Value<T>
    where
        A: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: Fn(&[A]) -> T + Send + Sync + 'static,
    {
        self.try_derive_all(inputs, move |xs| Ok::<_, Infallible>(f(xs)))
    }

    /// Fallible flavor of [`derive_all`](FlowGraph::derive_all).
    pub fn try_derive_all<A, T, E, F>(&mut self, inputs: &[Value<A>], f: F) -> Value<T>
    where
        A: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(&[A]) -> Result<T, E> + Send + Sync + 'static,
    {
        let id = NodeId::next();
        let sources: Vec<Value<A>> = inputs.to_vec();
        let recipe: Recipe<T> = Box::new(move || {
            let mut gathered = Vec::with_capacity(sources.len());
            for source in &sources {
                gathered.push(pull(source, id)?);
            }
            f(&gathered).map_err(|e| EvalError::computation(id, e))
        });
        let parents: ParentList = inputs.iter().map(|input| input.handle()).collect();
        self.insert(id, parents, recipe)
    }

    /// Register a freshly built cell: assign its level slot, wire the
    /// child edge on every input, and record it in the roster.
    fn insert<T>(&mut self, id: NodeId, parents: ParentList, recipe: Recipe<T>) -> Value<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let level = parents
            .iter()
            .map(|parent| parent.level())
            .max()
            .map_or(0, |deepest| deepest + 1);

        let node = Value::create(id, level, parents, recipe);
        let erased = node.handle();
        for parent in erased.parents() {
            parent.register_child(&erased);
        }

        let slot = level as usize;
        if self.levels.len() <= slot {
            self.levels.resize_with(slot + 1, Vec::new);
        }
        self.levels[slot].push(Arc::downgrade(&erased));
        self.order.push(Arc::downgrade(&erased));
        node
    }

    /// The number of levels currently populated.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// The number of nodes still alive.
    pub fn node_count(&self) -> usize {
        self.order
            .iter()
            .filter(|registration| registration.strong_count() > 0)
            .count()
    }

    /// All live nodes in creation order. Inputs always precede their
    /// consumers because attaching requires the inputs to exist.
    pub fn nodes(&self) -> Vec<Arc<dyn Node>> {
        self.order.iter().filter_map(Weak::upgrade).collect()
    }

    /// Live nodes bucketed by ascending level.
    pub(crate) fn live_levels(&self) -> Vec<Vec<Arc<dyn Node>>> {
        self.levels
            .iter()
            .map(|bucket| bucket.iter().filter_map(Weak::upgrade).collect())
            .collect()
    }
}

/// Read one input for `consumer`, adopting an upstream failure when the
/// input holds a failure or nothing at all.
fn pull<P>(parent: &Value<P>, consumer: NodeId) -> Result<P, EvalError>
where
    P: Clone + Send + Sync + 'static,
{
    parent
        .get()
        .map_err(|cause| EvalError::upstream(consumer, parent.id(), cause))
}

/// Everything that must be recomputed once `changed` is stale: the changed
/// nodes themselves plus every live node reachable over child edges.
/// Breadth-first discovery order, deduplicated.
pub fn affected_from(changed: &[Arc<dyn Node>]) -> Vec<Arc<dyn Node>> {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut affected: Vec<Arc<dyn Node>> = Vec::new();
    let mut queue: VecDeque<Arc<dyn Node>> = changed.iter().cloned().collect();

    while let Some(node) = queue.pop_front() {
        if seen.insert(node.id()) {
            queue.extend(node.children());
            affected.push(node);
        }
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Evaluator, Strategy};

    #[test]
    fn roots_sit_at_level_zero() {
        let mut graph = FlowGraph::new();
        let mid = graph.source(|| 1.0);
        let fixed = graph.constant(0.1);
        assert_eq!(mid.level(), 0);
        assert_eq!(fixed.level(), 0);
        assert_eq!(graph.depth(), 1);
    }

    #[test]
    fn level_is_one_past_the_deepest_input() {
        let mut graph = FlowGraph::new();
        let mid = graph.source(|| 1.0);
        let spread = graph.source(|| 0.1);
        let quote = graph.derive2(&mid, &spread, |m, s| (m - s, m + s));
        let widened = graph.derive2(&quote, &spread, |q, s| (q.0 - s, q.1 + s));
        // One deep input and one root input: the join still lands one past
        // the deepest.
        let span = graph.derive2(&widened, &quote, |a, b| {
            (f64::min(a.0, b.0), f64::max(a.1, b.1))
        });

        assert_eq!(quote.level(), 1);
        assert_eq!(widened.level(), 2);
        assert_eq!(span.level(), 3);
        assert_eq!(graph.depth(), 4);

        for node in graph.nodes() {
            let deepest = node.parents().iter().map(|p| p.level()).max();
            assert_eq!(node.level(), deepest.map_or(0, |d| d + 1));
            for parent in node.parents() {
                assert!(parent.level() < node.level());
            }
        }
    }

    #[test]
    fn edges_are_wired_on_both_sides() {
        let mut graph = FlowGraph::new();
        let mid = graph.source(|| 1.0);
        let spread = graph.source(|| 0.1);
        let quote = graph.derive2(&mid, &spread, |m, s| (m - s, m + s));

        let quote_node = quote.handle();
        let parent_ids: Vec<NodeId> = quote_node.parents().iter().map(|p| p.id()).collect();
        assert_eq!(parent_ids, vec![mid.id(), spread.id()]);

        for root in [mid.handle(), spread.handle()] {
            let child_ids: Vec<NodeId> = root.children().iter().map(|c| c.id()).collect();
            assert_eq!(child_ids, vec![quote.id()]);
        }
    }

    #[test]
    fn dropped_consumers_vanish_from_walks() {
        let mut graph = FlowGraph::new();
        let mid = graph.source(|| 1.0);
        let doubled = graph.derive1(&mid, |m| m * 2.0);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(mid.handle().children().len(), 1);

        drop(doubled);
        assert_eq!(graph.node_count(), 1);
        assert!(mid.handle().children().is_empty());

        // Walks must keep working without the dead consumer.
        Evaluator::new(&graph).evaluate_all(Strategy::LevelSequential);
        assert_eq!(mid.get().unwrap(), 1.0);
        assert_eq!(affected_from(&[mid.handle()]).len(), 1);
    }

    #[test]
    fn inputs_outlive_their_handles_while_a_consumer_remains() {
        let mut graph = FlowGraph::new();
        let mid = graph.source(|| 1.0);
        let doubled = graph.derive1(&mid, |m| m * 2.0);

        drop(mid);
        // The consumer keeps its input alive and computable.
        assert_eq!(graph.node_count(), 2);
        Evaluator::new(&graph).evaluate_all(Strategy::LevelSequential);
        assert_eq!(doubled.get().unwrap(), 2.0);
    }

    #[test]
    fn affected_set_is_the_child_closure() {
        let mut graph = FlowGraph::new();
        let mid = graph.source(|| 1.0);
        let spread = graph.source(|| 0.1);
        let quote = graph.derive2(&mid, &spread, |m, s| (m - s, m + s));
        let widened = graph.derive2(&quote, &spread, |q, s| (q.0 - s, q.1 + s));
        let other = graph.derive1(&mid, |m| m + 1.0);

        let affected = affected_from(&[quote.handle()]);
        let ids: HashSet<NodeId> = affected.iter().map(|n| n.id()).collect();
        assert_eq!(ids, HashSet::from([quote.id(), widened.id()]));
        assert!(!ids.contains(&other.id()));

        // From a root the closure spans its whole downstream cone.
        let affected = affected_from(&[mid.handle()]);
        let ids: HashSet<NodeId> = affected.iter().map(|n| n.id()).collect();
        assert_eq!(
            ids,
            HashSet::from([mid.id(), quote.id(), widened.id(), other.id()])
        );
    }

    #[test]
    fn duplicate_inputs_are_kept_in_argument_order() {
        let mut graph = FlowGraph::new();
        let mid = graph.source(|| 2.0);
        let squared = graph.derive2(&mid, &mid, |a, b| a * b);

        assert_eq!(squared.handle().parents().len(), 2);
        Evaluator::new(&graph).evaluate_all(Strategy::LevelSequential);
        assert_eq!(squared.get().unwrap(), 4.0);

        // The duplicate edge shows up twice among the children, and the
        // affected set still holds the consumer once.
        assert_eq!(mid.handle().children().len(), 2);
        assert_eq!(affected_from(&[mid.handle()]).len(), 2);
    }
}
