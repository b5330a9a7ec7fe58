//! Graph traversals.
//!
//! - [`dfs`] - lazy pre-order depth-first iterator
//! - [`postorder`] - depth-first post-order
//! - [`reverse_postorder`] - the iteration order of forward data-flow problems
//! - [`reachable`] - the set of nodes reachable from a start node
//!
//! All traversals are iterative; deeply nested control flow never recurses.

use crate::utils::{
    graph::{NodeId, Successors},
    BitSet,
};

/// Lazy pre-order depth-first iterator created by [`dfs`].
pub struct DfsIterator<'g, G: Successors> {
    graph: &'g G,
    stack: Vec<NodeId>,
    visited: BitSet,
}

impl<G: Successors> Iterator for DfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;

        // Reverse so successors are visited in their natural order
        let successors: Vec<NodeId> = self.graph.successors(node).collect();
        for &succ in successors.iter().rev() {
            if self.visited.insert(succ.index()) {
                self.stack.push(succ);
            }
        }

        Some(node)
    }
}

/// Depth-first traversal from `start`. An out-of-range start yields nothing.
pub fn dfs<G: Successors>(graph: &G, start: NodeId) -> DfsIterator<'_, G> {
    let mut visited = BitSet::new(graph.node_count());
    let stack = if start.index() < graph.node_count() {
        visited.insert(start.index());
        vec![start]
    } else {
        Vec::new()
    };

    DfsIterator {
        graph,
        stack,
        visited,
    }
}

/// Returns the set of node indices reachable from `start` (including it).
#[must_use]
pub fn reachable<G: Successors>(graph: &G, start: NodeId) -> BitSet {
    let mut set = BitSet::new(graph.node_count());
    for node in dfs(graph, start) {
        set.insert(node.index());
    }
    set
}

/// Returns the nodes reachable from `start` in depth-first post-order.
#[must_use]
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = BitSet::new(node_count);
    let mut result = Vec::with_capacity(node_count);

    // Each frame holds a node and its not yet explored successors
    visited.insert(start.index());
    let mut stack: Vec<(NodeId, Vec<NodeId>)> = vec![(start, successors_rev(graph, start))];

    while let Some((node, pending)) = stack.last_mut() {
        match pending.pop() {
            Some(succ) => {
                if visited.insert(succ.index()) {
                    let next = successors_rev(graph, succ);
                    stack.push((succ, next));
                }
            }
            None => {
                result.push(*node);
                stack.pop();
            }
        }
    }

    result
}

/// Returns the nodes reachable from `start` in reverse post-order.
///
/// Every node appears before its successors except along back edges, so
/// forward data-flow problems converge in few sweeps.
#[must_use]
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut order = postorder(graph, start);
    order.reverse();
    order
}

fn successors_rev<G: Successors>(graph: &G, node: NodeId) -> Vec<NodeId> {
    let mut succs: Vec<NodeId> = graph.successors(node).collect();
    succs.reverse();
    succs
}

#[cfg(test)]
mod tests {
    use crate::utils::graph::{
        algorithms::traversal::{dfs, postorder, reachable, reverse_postorder},
        DirectedGraph, NodeId,
    };

    fn diamond() -> DirectedGraph<&'static str> {
        let mut graph = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");
        let c = graph.add_node("C");
        let d = graph.add_node("D");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.add_edge(b, d).unwrap();
        graph.add_edge(c, d).unwrap();
        graph
    }

    #[test]
    fn test_dfs_diamond() {
        let graph = diamond();
        let order: Vec<usize> = dfs(&graph, NodeId::new(0)).map(NodeId::index).collect();
        assert_eq!(order, vec![0, 1, 3, 2]);
    }

    #[test]
    fn test_postorder_diamond() {
        let graph = diamond();
        let order: Vec<usize> = postorder(&graph, NodeId::new(0))
            .into_iter()
            .map(NodeId::index)
            .collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_reverse_postorder_loop() {
        // 0 -> 1 -> 2 -> 1, 2 -> 3
        let mut graph = DirectedGraph::new();
        let n: Vec<NodeId> = (0..4).map(|i| graph.add_node(i)).collect();
        graph.add_edge(n[0], n[1]).unwrap();
        graph.add_edge(n[1], n[2]).unwrap();
        graph.add_edge(n[2], n[1]).unwrap();
        graph.add_edge(n[2], n[3]).unwrap();

        let order = reverse_postorder(&graph, n[0]);
        assert_eq!(order, vec![n[0], n[1], n[2], n[3]]);
    }

    #[test]
    fn test_reachable_skips_disconnected() {
        let mut graph = diamond();
        let island = graph.add_node("E");
        let set = reachable(&graph, NodeId::new(0));
        assert_eq!(set.count(), 4);
        assert!(!set.contains(island.index()));
    }

    #[test]
    fn test_invalid_start() {
        let graph = diamond();
        assert_eq!(dfs(&graph, NodeId::new(10)).count(), 0);
        assert!(postorder(&graph, NodeId::new(10)).is_empty());
    }
}
