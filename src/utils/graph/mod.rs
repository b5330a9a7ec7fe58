//! Generic directed-graph infrastructure.
//!
//! The IR never stores a separate graph object: basic blocks keep their own
//! predecessor/successor lists. Instead, analyses wrap IR structures in thin
//! views implementing [`GraphBase`], [`Successors`], [`Predecessors`], and
//! [`RootedGraph`], and run the algorithms from [`algorithms`] on them.

mod directed;
mod node;
mod traits;

pub mod algorithms;

pub use directed::DirectedGraph;
pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
