//! A small owned adjacency-list graph.
//!
//! Used for the module call graph built by the inliner and for hand-built
//! graphs in tests and fuzzing.

use crate::{
    utils::graph::{
        node::NodeId,
        traits::{GraphBase, Predecessors, RootedGraph, Successors},
    },
    Error, Result,
};

/// A directed graph with node payloads `N` and unlabelled edges.
///
/// Parallel edges are allowed and are reported once per insertion.
#[derive(Debug, Clone)]
pub struct DirectedGraph<N> {
    nodes: Vec<N>,
    outgoing: Vec<Vec<NodeId>>,
    incoming: Vec<Vec<NodeId>>,
    entry: NodeId,
}

impl<N> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DirectedGraph<N> {
    /// Creates an empty graph whose entry is node 0.
    #[must_use]
    pub fn new() -> Self {
        DirectedGraph {
            nodes: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            entry: NodeId::new(0),
        }
    }

    /// Adds a node and returns its id. Ids are assigned sequentially.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(data);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    /// Adds the edge `source -> target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if either endpoint does not exist.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<()> {
        for (role, node) in [("source", source), ("target", target)] {
            if node.index() >= self.nodes.len() {
                return Err(Error::GraphError(format!(
                    "{role} node {node} does not exist in graph with {} nodes",
                    self.nodes.len()
                )));
            }
        }
        self.outgoing[source.index()].push(target);
        self.incoming[target.index()].push(source);
        Ok(())
    }

    /// Sets the entry node used by [`RootedGraph::entry`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if `entry` does not exist.
    pub fn set_entry(&mut self, entry: NodeId) -> Result<()> {
        if entry.index() >= self.nodes.len() {
            return Err(Error::GraphError(format!("entry node {entry} does not exist")));
        }
        self.entry = entry;
        Ok(())
    }

    /// Returns the payload of `node`.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&N> {
        self.nodes.get(node.index())
    }

    /// Returns `true` if `source -> target` exists.
    #[must_use]
    pub fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.outgoing
            .get(source.index())
            .is_some_and(|succs| succs.contains(&target))
    }
}

impl<N> GraphBase for DirectedGraph<N> {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::new)
    }
}

impl<N> Successors for DirectedGraph<N> {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.outgoing[node.index()].iter().copied()
    }
}

impl<N> Predecessors for DirectedGraph<N> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.incoming[node.index()].iter().copied()
    }
}

impl<N> RootedGraph for DirectedGraph<N> {
    fn entry(&self) -> NodeId {
        self.entry
    }
}
