#![no_main]

use libfuzzer_sys::fuzz_target;
use sysmir::utils::graph::{
    algorithms::{compute_dominance_frontiers, compute_dominators},
    DirectedGraph, NodeId,
};

/// Nodes reachable from the entry when `removed` is deleted from the graph.
fn reachable_without(adj: &[Vec<usize>], removed: Option<usize>) -> Vec<bool> {
    let mut seen = vec![false; adj.len()];
    if removed == Some(0) {
        return seen;
    }
    let mut stack = vec![0];
    seen[0] = true;
    while let Some(node) = stack.pop() {
        for &next in &adj[node] {
            if Some(next) != removed && !seen[next] {
                seen[next] = true;
                stack.push(next);
            }
        }
    }
    seen
}

fuzz_target!(|data: &[u8]| {
    let Some((&first, edges)) = data.split_first() else {
        return;
    };
    let n = usize::from(first % 32) + 1;

    let mut graph = DirectedGraph::new();
    let mut adj = vec![Vec::new(); n];
    for i in 0..n {
        graph.add_node(i);
    }
    for pair in edges.chunks_exact(2) {
        let (a, b) = (usize::from(pair[0]) % n, usize::from(pair[1]) % n);
        graph.add_edge(NodeId::new(a), NodeId::new(b)).unwrap();
        adj[a].push(b);
    }

    let doms = compute_dominators(&graph);
    let reachable = reachable_without(&adj, None);

    // d dominates v iff v becomes unreachable once d is removed
    for d in 0..n {
        let without = reachable_without(&adj, Some(d));
        for v in 0..n {
            let expected = reachable[v] && reachable[d] && (d == v || !without[v]);
            assert_eq!(
                doms.dominates(NodeId::new(d), NodeId::new(v)),
                expected,
                "dominates({d}, {v})"
            );
        }
    }

    // The immediate dominator is the closest strict dominator
    for v in 1..n {
        if !reachable[v] {
            assert_eq!(doms.immediate_dominator(NodeId::new(v)), None);
            continue;
        }
        let idom = doms.immediate_dominator(NodeId::new(v)).unwrap();
        assert!(doms.strictly_dominates(idom, NodeId::new(v)));
        for d in 0..n {
            if doms.strictly_dominates(NodeId::new(d), NodeId::new(v)) {
                assert!(doms.dominates(NodeId::new(d), idom));
            }
        }
    }

    // y is in DF(x) iff x dominates a predecessor of y but not y strictly
    let frontiers = compute_dominance_frontiers(&graph, &doms);
    for x in (0..n).filter(|&x| reachable[x]) {
        for y in (0..n).filter(|&y| reachable[y]) {
            let expected = (0..n).any(|p| {
                reachable[p]
                    && adj[p].contains(&y)
                    && doms.dominates(NodeId::new(x), NodeId::new(p))
            }) && !doms.strictly_dominates(NodeId::new(x), NodeId::new(y));
            assert_eq!(
                frontiers[x].contains(&NodeId::new(y)),
                expected,
                "DF({x}) membership of {y}"
            );
        }
    }
});
