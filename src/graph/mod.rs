//! The build graph: node model and deterministic ordering.

mod cycle;
pub mod node;
pub mod sort;

pub use node::{CommandNode, ConfigOverride, GraphNode, Node, OutputId, TargetNode};
pub use sort::{CycleError, Sorted, UnresolvedReference, sort};
