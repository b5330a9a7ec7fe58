//! Dominator analysis.
//!
//! Node `D` dominates node `N` if every path from the entry to `N` passes
//! through `D`. This module computes, for every node reachable from the entry:
//!
//! - the full dominator set, by the classic iterative data-flow formulation
//!   `dom(N) = {N} ∪ ⋂ dom(P)` over the predecessors `P` of `N`, evaluated in
//!   reverse post-order until no set changes;
//! - the immediate dominator, the closest strict dominator;
//! - the dominator tree children, ordered by reverse post-order;
//! - dominance frontiers, via [`compute_dominance_frontiers`].
//!
//! Nodes not reachable from the entry have an empty dominator set and no
//! immediate dominator.
//!
//! # Example
//!
//! ```rust
//! use sysmir::utils::graph::{algorithms::compute_dominators, DirectedGraph};
//!
//! let mut graph = DirectedGraph::new();
//! let entry = graph.add_node("entry");
//! let then_ = graph.add_node("then");
//! let else_ = graph.add_node("else");
//! let join = graph.add_node("join");
//! graph.add_edge(entry, then_)?;
//! graph.add_edge(entry, else_)?;
//! graph.add_edge(then_, join)?;
//! graph.add_edge(else_, join)?;
//!
//! let doms = compute_dominators(&graph);
//! assert_eq!(doms.immediate_dominator(join), Some(entry));
//! assert!(!doms.dominates(then_, join));
//! # Ok::<(), sysmir::Error>(())
//! ```

use std::collections::BTreeSet;

use crate::utils::{
    graph::{algorithms::reverse_postorder, NodeId, Predecessors, RootedGraph},
    BitSet,
};

/// Result of [`compute_dominators`].
#[derive(Debug, Clone)]
pub struct Dominators {
    entry: NodeId,
    sets: Vec<BitSet>,
    idom: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    rpo: Vec<NodeId>,
    iterations: usize,
}

impl Dominators {
    /// The entry node the analysis was rooted at.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the dominator set of `node` (including `node` itself).
    ///
    /// Empty for nodes unreachable from the entry.
    #[must_use]
    pub fn dominator_set(&self, node: NodeId) -> &BitSet {
        &self.sets[node.index()]
    }

    /// Returns the immediate dominator of `node`, or `None` for the entry and
    /// for unreachable nodes.
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns `true` if `a` dominates `b`. Every reachable node dominates
    /// itself.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        self.sets
            .get(b.index())
            .is_some_and(|set| set.contains(a.index()))
    }

    /// Returns `true` if `a` dominates `b` and `a != b`.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Children of `node` in the dominator tree, in reverse post-order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.children[node.index()]
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        !self.sets[node.index()].is_empty()
    }

    /// The reverse post-order used for the fixed point.
    #[must_use]
    pub fn reverse_postorder(&self) -> &[NodeId] {
        &self.rpo
    }

    /// Number of sweeps over the graph until the sets stabilised.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of nodes covered by the analysis.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.sets.len()
    }

    /// Depth of `node` in the dominator tree (the entry has depth 0).
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(parent) = self.immediate_dominator(current) {
            current = parent;
            depth += 1;
        }
        depth
    }
}

/// Computes dominator sets, immediate dominators and the dominator tree.
#[must_use]
pub fn compute_dominators<G>(graph: &G) -> Dominators
where
    G: RootedGraph,
{
    let node_count = graph.node_count();
    let entry = graph.entry();

    if entry.index() >= node_count {
        return Dominators {
            entry,
            sets: vec![BitSet::new(node_count); node_count],
            idom: vec![None; node_count],
            children: vec![Vec::new(); node_count],
            rpo: Vec::new(),
            iterations: 0,
        };
    }

    let rpo = reverse_postorder(graph, entry);
    let mut reachable = BitSet::new(node_count);
    for node in &rpo {
        reachable.insert(node.index());
    }

    // Unreachable predecessors keep the universal set and drop out of
    // every intersection they take part in
    let mut sets = vec![BitSet::full(node_count); node_count];
    sets[entry.index()] = BitSet::new(node_count);
    sets[entry.index()].insert(entry.index());

    let mut iterations = 0;
    let mut changed = true;
    while changed {
        changed = false;
        iterations += 1;

        for &node in rpo.iter().skip(1) {
            let mut next = BitSet::full(node_count);
            for pred in graph.predecessors(node) {
                next.intersect_with(&sets[pred.index()]);
            }
            next.insert(node.index());

            if next != sets[node.index()] {
                sets[node.index()] = next;
                changed = true;
            }
        }
    }

    for (idx, set) in sets.iter_mut().enumerate() {
        if !reachable.contains(idx) {
            set.clear();
        }
    }

    // The closest strict dominator is the one whose own set holds every
    // other strict dominator
    let mut idom = vec![None; node_count];
    for &node in rpo.iter().skip(1) {
        let strict = sets[node.index()].count() - 1;
        idom[node.index()] = sets[node.index()]
            .iter()
            .filter(|&d| d != node.index())
            .find(|&d| sets[d].count() == strict)
            .map(NodeId::new);
    }

    let mut children = vec![Vec::new(); node_count];
    for &node in &rpo {
        if let Some(parent) = idom[node.index()] {
            children[parent.index()].push(node);
        }
    }

    Dominators {
        entry,
        sets,
        idom,
        children,
        rpo,
        iterations,
    }
}

/// Computes the dominance frontier of every node.
///
/// `DF(X)` holds each node `Y` such that `X` dominates a predecessor of `Y`
/// but does not strictly dominate `Y`. Only join nodes (two or more reachable
/// predecessors) can appear in a frontier; for each of them the walk climbs
/// the dominator tree from every predecessor up to the join's immediate
/// dominator.
#[must_use]
pub fn compute_dominance_frontiers<G>(graph: &G, doms: &Dominators) -> Vec<BTreeSet<NodeId>>
where
    G: Predecessors,
{
    let node_count = graph.node_count();
    let mut frontiers = vec![BTreeSet::new(); node_count];

    for node in graph.node_ids() {
        if !doms.is_reachable(node) {
            continue;
        }

        let preds: Vec<NodeId> = graph
            .predecessors(node)
            .filter(|&p| doms.is_reachable(p))
            .collect();
        if preds.len() < 2 {
            continue;
        }

        let idom = doms.immediate_dominator(node);
        for pred in preds {
            let mut runner = Some(pred);
            while let Some(current) = runner {
                if Some(current) == idom {
                    break;
                }
                frontiers[current.index()].insert(node);
                runner = doms.immediate_dominator(current);
            }
        }
    }

    frontiers
}

/// Computes the iterated dominance frontier `DF+(defs)`: the closure of the
/// frontier relation starting from `defs`.
///
/// These are exactly the nodes that need a phi for a variable defined in
/// every node of `defs`.
#[must_use]
pub fn iterated_dominance_frontier(
    frontiers: &[BTreeSet<NodeId>],
    defs: impl IntoIterator<Item = NodeId>,
) -> BTreeSet<NodeId> {
    let mut result = BTreeSet::new();
    let mut worklist: Vec<NodeId> = defs.into_iter().collect();

    while let Some(node) = worklist.pop() {
        for &frontier in &frontiers[node.index()] {
            if result.insert(frontier) {
                worklist.push(frontier);
            }
        }
    }

    result
}
