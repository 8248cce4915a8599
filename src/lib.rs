//! # dagflow
//!
//! An incremental dataflow engine. Applications build a directed acyclic
//! graph of typed, lazily evaluated computation cells, then run evaluation
//! passes over it:
//!
//! - `graph`: node construction, the level index, and the affected-set
//!   closure used for invalidation
//! - `engine`: the evaluation strategies, including a level-synchronous
//!   parallel walk, and selective recomputation
//! - `error`: the failure type stored by nodes and replayed on reads
//!
//! Construction fixes each node's inputs and its level (one past its
//! deepest input), which is what lets every strategy order work safely.
//! Failures never escape a pass; they are stored in the failing node and
//! surface when the node, or anything downstream of it, is read.
//!
//! # Example
//!
//! ```
//! use dagflow::{Evaluator, FlowGraph, Strategy};
//!
//! let mut graph = FlowGraph::new();
//! let mid = graph.source(|| 1.0);
//! let spread = graph.source(|| 0.1);
//! let quote = graph.derive2(&mid, &spread, |m, s| (m - s, m + s));
//!
//! let evaluator = Evaluator::new(&graph);
//! evaluator.evaluate_all(Strategy::LevelParallel);
//! assert_eq!(quote.get().unwrap(), (0.9, 1.1));
//!
//! // Invalidate one node and recompute just its downstream cone.
//! quote.clear();
//! assert_eq!(evaluator.evaluate_from(&[quote.handle()]), 1);
//! assert_eq!(quote.success_count(), 2);
//! ```

pub mod engine;
pub mod error;
pub mod graph;

pub use engine::{Evaluator, Strategy};
pub use error::EvalError;
pub use graph::{FlowGraph, Node, NodeId, Value};
