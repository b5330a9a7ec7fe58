//! Graph algorithms used by the IR analyses.
//!
//! | Algorithm | Complexity | Used by |
//! |-----------|------------|---------|
//! | [`dfs`], [`reachable`] | O(V + E) | unreachable-block removal |
//! | [`reverse_postorder`] | O(V + E) | dominator fixed point |
//! | [`compute_dominators`] | O(V² · d) worst case | dominance analysis |
//! | [`compute_dominance_frontiers`] | O(V + E + Σ DF) | phi placement |
//! | [`strongly_connected_components`] | O(V + E) | recursion detection for inlining |

mod dominators;
mod scc;
mod traversal;

pub use dominators::{
    compute_dominance_frontiers, compute_dominators, iterated_dominance_frontier, Dominators,
};
pub use scc::{is_cyclic, strongly_connected_components};
pub use traversal::{dfs, postorder, reachable, reverse_postorder, DfsIterator};
