//! Defines the error type surfaced by node reads and stored by failed
//! computations.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::graph::NodeId;

/// A failure associated with a single node of the graph.
///
/// Failures are node-local: an evaluation pass never aborts because one node
/// failed. Instead the failing node stores its `EvalError`, and every read of
/// that node replays the stored value. Downstream nodes that consume a failed
/// or absent input store an [`EvalError::Upstream`] of their own, so the
/// original cause stays reachable through the `source` chain.
///
/// The enum is `Clone` so a stored failure can be handed out on every read
/// without giving up the original.
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    /// A read of a node that holds neither a result nor a failure, e.g.
    /// before any evaluation pass has reached it.
    #[error("node {node:?} has not been computed")]
    NotComputed { node: NodeId },

    /// The node's own function returned an error while all of its inputs
    /// were available. The cause is shared behind an `Arc` to keep the
    /// stored failure cloneable.
    #[error("computation at node {node:?} failed: {reason}")]
    Computation {
        node: NodeId,
        reason: Arc<dyn StdError + Send + Sync>,
    },

    /// The node could not run because a direct input holds a failure or no
    /// result at all.
    #[error("upstream dependency {parent:?} of node {node:?} failed")]
    Upstream {
        node: NodeId,
        parent: NodeId,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    pub(crate) fn computation<E>(node: NodeId, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        EvalError::Computation {
            node,
            reason: Arc::new(cause),
        }
    }

    pub(crate) fn upstream(node: NodeId, parent: NodeId, cause: EvalError) -> Self {
        EvalError::Upstream {
            node,
            parent,
            source: Box::new(cause),
        }
    }

    /// Walks the `Upstream` chain down to the failure that started it.
    pub fn root_cause(&self) -> &EvalError {
        let mut current = self;
        while let EvalError::Upstream { source, .. } = current {
            current = source;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;

    #[derive(Debug, thiserror::Error)]
    #[error("negative spread")]
    struct NegativeSpread;

    #[test]
    fn root_cause_unwraps_upstream_chain() {
        let origin = NodeId::next();
        let middle = NodeId::next();
        let leaf = NodeId::next();

        let cause = EvalError::computation(origin, NegativeSpread);
        let one_up = EvalError::upstream(middle, origin, cause);
        let two_up = EvalError::upstream(leaf, middle, one_up);

        match two_up.root_cause() {
            EvalError::Computation { node, reason } => {
                assert_eq!(*node, origin);
                assert_eq!(reason.to_string(), "negative spread");
            }
            other => panic!("expected the original failure, got {other:?}"),
        }
    }

    #[test]
    fn root_cause_of_plain_failure_is_itself() {
        let node = NodeId::next();
        let error = EvalError::NotComputed { node };
        assert!(matches!(
            error.root_cause(),
            EvalError::NotComputed { node: n } if *n == node
        ));
    }
}
