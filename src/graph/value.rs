//! The typed value container behind every node: one result slot, a success
//! counter, the attached computation, and the edges to neighboring nodes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use smallvec::SmallVec;

use crate::error::EvalError;
use crate::graph::node::{Node, NodeId};

/// The computation attached to a node. Reads the inputs captured at
/// construction time and produces this node's next result.
pub(crate) type Recipe<T> = Box<dyn Fn() -> Result<T, EvalError> + Send + Sync>;

/// Inputs are almost always arity two or less, so the parent list lives
/// inline.
pub(crate) type ParentList = SmallVec<[Arc<dyn Node>; 2]>;

/// The shared cell state. Jointly owned by every [`Value`] handle cloned
/// from the original and by every downstream cell that lists it as an
/// input; consumers are only observed weakly.
struct Cell<T> {
    id: NodeId,
    level: u32,
    recipe: Recipe<T>,
    slot: RwLock<Option<Result<T, EvalError>>>,
    successes: AtomicU64,
    parents: ParentList,
    children: RwLock<Vec<Weak<dyn Node>>>,
}

/// A typed handle on one node of the graph.
///
/// The underlying cell holds at most one of {nothing, result, failure}. The
/// result is written only by the node's own computation or by an explicit
/// [`set`](Value::set), and is discarded only by [`clear`](Value::clear).
/// Cloning the handle shares the cell; dropping the last handle drops the
/// cell unless a downstream node still consumes it. Reads are safe from any
/// thread; during a parallel pass each cell is written by exactly one task.
pub struct Value<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Value<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn create(id: NodeId, level: u32, parents: ParentList, recipe: Recipe<T>) -> Self {
        Self {
            cell: Arc::new(Cell {
                id,
                level,
                recipe,
                slot: RwLock::new(None),
                successes: AtomicU64::new(0),
                parents,
                children: RwLock::new(Vec::new()),
            }),
        }
    }

    /// This node's identity.
    pub fn id(&self) -> NodeId {
        self.cell.id
    }

    /// This node's level, fixed at construction.
    pub fn level(&self) -> u32 {
        self.cell.level
    }

    /// The stored result.
    ///
    /// Replays the stored failure if the last computation failed, and
    /// reports [`EvalError::NotComputed`] if nothing is stored yet.
    pub fn get(&self) -> Result<T, EvalError> {
        match &*self.cell.slot.read().expect("result slot lock poisoned") {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(EvalError::NotComputed { node: self.cell.id }),
        }
    }

    /// Store a successful result, replacing any previous state, and bump
    /// the success counter.
    pub fn set(&self, value: T) {
        self.cell.store(Ok(value));
    }

    /// Store a failure, replacing any previous state. The success counter
    /// is untouched.
    pub fn set_failure(&self, error: EvalError) {
        self.cell.store(Err(error));
    }

    /// Reset the cell to the uncomputed state. The success counter is
    /// untouched.
    pub fn clear(&self) {
        Node::clear(&*self.cell);
    }

    /// True iff a successful result is stored.
    pub fn has_result(&self) -> bool {
        Node::has_result(&*self.cell)
    }

    /// How many times this cell has received a successful result.
    pub fn success_count(&self) -> u64 {
        Node::success_count(&*self.cell)
    }

    /// This node as the type-erased capability used by the evaluation
    /// strategies and by
    /// [`evaluate_from`](crate::engine::Evaluator::evaluate_from).
    pub fn handle(&self) -> Arc<dyn Node> {
        Arc::clone(&self.cell) as Arc<dyn Node>
    }
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn store(&self, outcome: Result<T, EvalError>) {
        let succeeded = outcome.is_ok();
        *self.slot.write().expect("result slot lock poisoned") = Some(outcome);
        if succeeded {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<T> Node for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn has_result(&self) -> bool {
        matches!(
            &*self.slot.read().expect("result slot lock poisoned"),
            Some(Ok(_))
        )
    }

    fn is_settled(&self) -> bool {
        self.slot.read().expect("result slot lock poisoned").is_some()
    }

    fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        *self.slot.write().expect("result slot lock poisoned") = None;
    }

    fn compute(&self) {
        self.store((self.recipe)());
    }

    fn parents(&self) -> &[Arc<dyn Node>] {
        &self.parents
    }

    fn children(&self) -> Vec<Arc<dyn Node>> {
        self.children
            .read()
            .expect("child list lock poisoned")
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn register_child(&self, child: &Arc<dyn Node>) {
        self.children
            .write()
            .expect("child list lock poisoned")
            .push(Arc::downgrade(child));
    }
}

impl<T> fmt::Debug for Value<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("id", &self.cell.id)
            .field("level", &self.cell.level)
            .field(
                "slot",
                &*self.cell.slot.read().expect("result slot lock poisoned"),
            )
            .field("successes", &self.success_count())
            .finish()
    }
}
