//! Defines node identity and the type-erased capability every node of the
//! graph exposes, independent of its payload type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter backing [`NodeId`] allocation. Process-wide, so ids stay unique
/// across graphs and can key maps and sets without qualification.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A unique, stable identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate the next id.
    pub(crate) fn next() -> Self {
        Self(NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The capability shared by every node regardless of its payload type.
///
/// Typed access to a node's result goes through the concrete
/// [`Value<T>`](crate::graph::Value) handle returned at construction time.
/// Evaluation strategies and the affected-set walk only need this erased
/// view, which is why it is object safe and `Send + Sync`.
///
/// Edges are fixed at construction. A node holds its inputs strongly (its
/// `parents` keep their targets alive) and its consumers weakly, so
/// [`children`](Node::children) returns only the consumers that are still
/// alive. A consumer dropped by its last holder simply stops appearing.
pub trait Node: Send + Sync {
    /// This node's identity.
    fn id(&self) -> NodeId;

    /// Distance from the roots: 0 for a node without inputs, otherwise one
    /// more than the highest input level.
    fn level(&self) -> u32;

    /// True iff a successful result is stored. A stored failure does not
    /// count: a failed node looks exactly like an uncomputed one to the
    /// schedulers, and stays eligible for the next pass.
    fn has_result(&self) -> bool;

    /// True iff either a result or a failure is stored.
    fn is_settled(&self) -> bool;

    /// How many times this node's computation has succeeded.
    fn success_count(&self) -> u64;

    /// Discard any stored result or failure. The success counter is
    /// untouched.
    fn clear(&self);

    /// Run the attached function against the current input results and
    /// store the outcome, success or failure, in this node.
    fn compute(&self);

    /// The direct inputs, in argument order.
    fn parents(&self) -> &[Arc<dyn Node>];

    /// The still-live direct consumers, in registration order.
    fn children(&self) -> Vec<Arc<dyn Node>>;

    /// Record `child` as a consumer of this node. Called once per edge
    /// while the child is being constructed.
    #[doc(hidden)]
    fn register_child(&self, child: &Arc<dyn Node>);
}
