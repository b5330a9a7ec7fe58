//! Traits that let IR structures be viewed as directed graphs.
//!
//! The algorithms in [`crate::utils::graph::algorithms`] are written against
//! these traits rather than a concrete graph type. A function's control-flow
//! graph ([`crate::analysis::MirCfg`]), a module call graph, and the test
//! graphs all implement them.

use crate::utils::graph::NodeId;

/// Basic node enumeration.
pub trait GraphBase {
    /// Number of nodes. Node ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Iterates all node ids.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward adjacency.
pub trait Successors: GraphBase {
    /// Iterates the direct successors of `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward adjacency.
pub trait Predecessors: GraphBase {
    /// Iterates the direct predecessors of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a distinguished entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// The entry node every traversal starts from.
    fn entry(&self) -> NodeId;
}
