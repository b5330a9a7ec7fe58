//! Strongly connected components (Tarjan).
//!
//! The inliner runs this over the module call graph: a function that sits in
//! a component with more than one member, or that calls itself, is recursive
//! and must not be inlined.

use crate::utils::graph::{NodeId, Successors};

/// Computes the strongly connected components of `graph`.
///
/// Components are returned in reverse topological order of the condensation:
/// if component `A` has an edge into component `B`, `B` comes first. For a
/// call graph this is callees-before-callers order.
#[must_use]
pub fn strongly_connected_components<G>(graph: &G) -> Vec<Vec<NodeId>>
where
    G: Successors,
{
    let node_count = graph.node_count();
    let mut state = TarjanState::new(node_count);

    for node in graph.node_ids() {
        if state.index[node.index()].is_none() {
            state.strongconnect(graph, node);
        }
    }

    state.sccs
}

/// Returns `true` if `node` lies on a cycle: it is part of a component with
/// other members, or it has an edge to itself.
#[must_use]
pub fn is_cyclic<G>(graph: &G, component: &[NodeId], node: NodeId) -> bool
where
    G: Successors,
{
    component.len() > 1 || graph.successors(node).any(|succ| succ == node)
}

struct TarjanState {
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<NodeId>,
    next_index: usize,
    sccs: Vec<Vec<NodeId>>,
}

impl TarjanState {
    fn new(n: usize) -> Self {
        Self {
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            sccs: Vec::new(),
        }
    }

    fn strongconnect<G: Successors>(&mut self, graph: &G, v: NodeId) {
        let v_idx = v.index();
        let v_index = self.next_index;

        self.index[v_idx] = Some(v_index);
        self.lowlink[v_idx] = v_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v_idx] = true;

        let successors: Vec<NodeId> = graph.successors(v).collect();
        for w in successors {
            let w_idx = w.index();
            match self.index[w_idx] {
                None => {
                    self.strongconnect(graph, w);
                    self.lowlink[v_idx] = self.lowlink[v_idx].min(self.lowlink[w_idx]);
                }
                Some(w_index) if self.on_stack[w_idx] => {
                    self.lowlink[v_idx] = self.lowlink[v_idx].min(w_index);
                }
                Some(_) => {}
            }
        }

        if self.lowlink[v_idx] == v_index {
            let mut scc = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w.index()] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            self.sccs.push(scc);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::utils::graph::{
        algorithms::scc::{is_cyclic, strongly_connected_components},
        DirectedGraph, NodeId,
    };

    #[test]
    fn test_scc_chain_is_reverse_topological() {
        let mut graph = DirectedGraph::new();
        let a = graph.add_node('A');
        let b = graph.add_node('B');
        let c = graph.add_node('C');
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        let sccs = strongly_connected_components(&graph);
        let order: Vec<NodeId> = sccs.iter().map(|scc| scc[0]).collect();
        assert_eq!(order, vec![c, b, a]);
        assert!(sccs.iter().all(|scc| !is_cyclic(&graph, scc, scc[0])));
    }

    #[test]
    fn test_scc_mutual_recursion() {
        // main -> even <-> odd, main -> leaf
        let mut graph = DirectedGraph::new();
        let main = graph.add_node("main");
        let even = graph.add_node("even");
        let odd = graph.add_node("odd");
        let leaf = graph.add_node("leaf");
        graph.add_edge(main, even).unwrap();
        graph.add_edge(even, odd).unwrap();
        graph.add_edge(odd, even).unwrap();
        graph.add_edge(main, leaf).unwrap();

        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs.len(), 3);

        let cycle = sccs.iter().find(|scc| scc.len() == 2).unwrap();
        let members: HashSet<NodeId> = cycle.iter().copied().collect();
        assert_eq!(members, HashSet::from([even, odd]));
        assert!(is_cyclic(&graph, cycle, even));
        assert_eq!(sccs.last().unwrap(), &vec![main]);
    }

    #[test]
    fn test_scc_self_loop() {
        let mut graph = DirectedGraph::new();
        let fact = graph.add_node("fact");
        graph.add_edge(fact, fact).unwrap();

        let sccs = strongly_connected_components(&graph);
        assert_eq!(sccs, vec![vec![fact]]);
        assert!(is_cyclic(&graph, &sccs[0], fact));
    }
}
