//! Defines the core data structures of the dependency graph.
pub mod dag;
pub mod node;
pub mod value;

// Re-export key types for convenient access
pub use dag::{affected_from, FlowGraph};
pub use node::{Node, NodeId};
pub use value::Value;
