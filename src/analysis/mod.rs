//! Analyses over the IR.
//!
//! - [`build_cfg`] / [`prune_unreachable`] - control-flow edges and
//!   unreachable-block retirement
//! - [`build_dominance`] - dominator sets, immediate dominators, dominator
//!   tree and dominance frontiers
//! - [`CallGraph`] - module call graph with recursion detection
//!
//! Results are stored on the IR itself (block edge and dominance fields) and
//! are valid until the next transformation; re-run the analysis rather than
//! patching them.

mod callgraph;
mod cfg;
mod dominance;

pub use callgraph::CallGraph;
pub use cfg::{build_cfg, prune_unreachable, MirCfg};
pub use dominance::build_dominance;
