//! Dominance analysis over a function's CFG.
//!
//! [`build_dominance`] runs the generic iterative computation from
//! [`crate::utils::graph::algorithms`] on a [`MirCfg`] view and stores the
//! result on the blocks: dominator set, immediate dominator, dominator-tree
//! children and dominance frontier. Every field is recomputed from scratch.

use crate::{
    analysis::MirCfg,
    mir::{BlockId, Function},
    utils::graph::algorithms::{compute_dominance_frontiers, compute_dominators},
    Result,
};

/// Computes dominance facts for every live block of `func`.
///
/// The CFG must be current and unreachable blocks must already be retired
/// (see [`prune_unreachable`](crate::analysis::prune_unreachable)).
///
/// # Errors
///
/// Returns [`Error::Internal`](crate::Error::Internal) if the function has no
/// entry, the entry has predecessors, or a live block is unreachable.
pub fn build_dominance(func: &mut Function) -> Result<()> {
    let Some(entry) = func.entry() else {
        return Err(internal_error!(
            "dominance requested for declaration {}",
            func.name()
        ));
    };
    if !func.block(entry).predecessors().is_empty() {
        return Err(internal_error!(
            "entry block {} of {} has predecessors",
            func.block(entry).label(),
            func.name()
        ));
    }

    let (doms, frontiers) = {
        let cfg = MirCfg::new(func);
        let doms = compute_dominators(&cfg);
        let frontiers = compute_dominance_frontiers(&cfg, &doms);
        (doms, frontiers)
    };

    let live: Vec<BlockId> = func.live_blocks().collect();
    if let Some(&stray) = live
        .iter()
        .find(|&&b| !doms.is_reachable(MirCfg::node(b)))
    {
        return Err(internal_error!(
            "block {} of {} is unreachable; prune before dominance",
            func.block(stray).label(),
            func.name()
        ));
    }

    for index in 0..func.block_count() {
        func.block_mut(BlockId::new(index)).clear_dominance();
    }
    for block in live {
        let node = MirCfg::node(block);
        let data = func.block_mut(block);
        data.dominators = doms.dominator_set(node).clone();
        data.idom = doms.immediate_dominator(node).map(MirCfg::block);
        data.dom_children = doms.children(node).iter().map(|&n| MirCfg::block(n)).collect();
        data.frontier = frontiers[node.index()].iter().map(|&n| MirCfg::block(n)).collect();
    }

    log::trace!(
        "{}: dominators converged after {} iterations",
        func.name(),
        doms.iterations()
    );
    Ok(())
}
