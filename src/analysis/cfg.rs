//! Control-flow graph construction.
//!
//! Edges are derived from terminators and stored on the blocks themselves.
//! [`build_cfg`] always starts from empty edge sets, so it can be re-run after
//! any transformation. [`prune_unreachable`] retires the blocks no path from
//! the entry reaches; it must run before dominance analysis.
//!
//! [`MirCfg`] exposes a function's blocks through the generic graph traits so
//! the algorithms of [`crate::utils::graph::algorithms`] run on them directly.

use std::collections::HashSet;

use crate::{
    mir::{BlockId, Function, InstKind},
    utils::graph::{algorithms::reachable, GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    Error, Result,
};

/// Read-only graph view of a function's control flow.
///
/// Node `n` is block `BlockId(n)`. Deleted blocks are isolated nodes.
pub struct MirCfg<'a> {
    func: &'a Function,
}

impl<'a> MirCfg<'a> {
    /// Wraps `func`. Edges are whatever the last [`build_cfg`] produced.
    #[must_use]
    pub fn new(func: &'a Function) -> Self {
        Self { func }
    }

    /// Node of `block`.
    #[must_use]
    pub fn node(block: BlockId) -> NodeId {
        NodeId::new(block.index())
    }

    /// Block of `node`.
    #[must_use]
    pub fn block(node: NodeId) -> BlockId {
        BlockId::new(node.index())
    }
}

impl GraphBase for MirCfg<'_> {
    fn node_count(&self) -> usize {
        self.func.block_count()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.func.block_count()).map(NodeId::new)
    }
}

impl Successors for MirCfg<'_> {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.func
            .block(Self::block(node))
            .successors()
            .iter()
            .map(|&b| Self::node(b))
    }
}

impl Predecessors for MirCfg<'_> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.func
            .block(Self::block(node))
            .predecessors()
            .iter()
            .map(|&b| Self::node(b))
    }
}

impl RootedGraph for MirCfg<'_> {
    fn entry(&self) -> NodeId {
        self.func.entry().map_or(NodeId::new(0), Self::node)
    }
}

/// Rebuilds the predecessor and successor sets of every live block.
///
/// Targets flagged deleted contribute no edge. A conditional branch with one
/// deleted target is rewritten into a jump to the other; the blocks where
/// that happened are returned.
///
/// # Errors
///
/// - [`Error::PendingJump`] if a jump was never back-filled
/// - [`Error::Unterminated`] if a live block is empty or lacks a terminator
/// - [`Error::Internal`] if both targets of a branch are deleted
pub fn build_cfg(func: &mut Function) -> Result<Vec<BlockId>> {
    for index in 0..func.block_count() {
        func.block_mut(BlockId::new(index)).clear_edges();
    }

    let mut simplified = Vec::new();
    let live: Vec<BlockId> = func.live_blocks().collect();
    for &block in &live {
        let Some(term) = func.terminator(block) else {
            return Err(Error::Unterminated {
                function: func.name().to_string(),
                block: func.block(block).label().to_string(),
            });
        };

        match func.kind(term).clone() {
            InstKind::Jump { target: None } => {
                return Err(Error::PendingJump {
                    function: func.name().to_string(),
                    block: func.block(block).label().to_string(),
                });
            }
            InstKind::Branch {
                then_target,
                else_target,
                ..
            } => {
                let survivor = match (
                    func.block(then_target).is_deleted(),
                    func.block(else_target).is_deleted(),
                ) {
                    (false, false) => None,
                    (false, true) => Some(then_target),
                    (true, false) => Some(else_target),
                    (true, true) => {
                        return Err(internal_error!(
                            "both targets of the branch in {} are deleted",
                            func.block(block).label()
                        ))
                    }
                };
                if let Some(target) = survivor {
                    log::trace!(
                        "{}: branch in {} folded to jump",
                        func.name(),
                        func.block(block).label()
                    );
                    func.replace_kind(
                        term,
                        InstKind::Jump {
                            target: Some(target),
                        },
                    );
                    simplified.push(block);
                }
            }
            _ => {}
        }

        for target in func.kind(term).targets() {
            if func.block(target).is_deleted() {
                continue;
            }
            let data = func.block_mut(block);
            if data.succs.contains(&target) {
                continue;
            }
            data.succs.push(target);
            func.block_mut(target).preds.push(block);
        }
    }

    Ok(simplified)
}

/// Retires every live block that cannot be reached from the entry.
///
/// Phi entries naming a retired predecessor are dropped, the retired blocks'
/// instructions are removed, and the edges are rebuilt. Returns the retired
/// blocks in layout order. Edges must be current when this is called.
///
/// # Errors
///
/// Propagates [`build_cfg`] errors.
pub fn prune_unreachable(func: &mut Function) -> Result<Vec<BlockId>> {
    let Some(entry) = func.entry() else {
        return Ok(Vec::new());
    };

    let reached = reachable(&MirCfg::new(func), MirCfg::node(entry));
    let dead: Vec<BlockId> = func
        .live_blocks()
        .filter(|b| !reached.contains(b.index()))
        .collect();
    if dead.is_empty() {
        return Ok(dead);
    }

    let dead_set: HashSet<BlockId> = dead.iter().copied().collect();
    let survivors: Vec<BlockId> = func
        .live_blocks()
        .filter(|b| !dead_set.contains(b))
        .collect();
    for block in survivors {
        for phi in func.phis(block) {
            func.retain_phi_entries(phi, |pred| !dead_set.contains(&pred));
        }
    }

    for &block in &dead {
        log::trace!(
            "{}: removing unreachable block {}",
            func.name(),
            func.block(block).label()
        );
        func.delete_block(block);
    }

    build_cfg(func)?;
    Ok(dead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{PhiEntry, TypeId, Value};

    fn jump(func: &mut Function, from: BlockId, to: BlockId) {
        func.append(from, InstKind::Jump { target: Some(to) }, TypeId::VOID);
    }

    fn branch(func: &mut Function, from: BlockId, t: BlockId, e: BlockId) {
        func.append(
            from,
            InstKind::Branch {
                cond: Value::Arg(0),
                then_target: t,
                else_target: e,
            },
            TypeId::VOID,
        );
    }

    fn ret(func: &mut Function, block: BlockId) {
        func.append(block, InstKind::Return { value: None }, TypeId::VOID);
    }

    /// entry -> (a | b) -> join, plus an orphan block jumping to join.
    fn diamond() -> (Function, [BlockId; 5]) {
        let mut func = Function::new("f", TypeId::VOID, TypeId::VOID, &[TypeId::I1]);
        let entry = func.add_block("f_BB0");
        let a = func.add_block("f_BB1");
        let b = func.add_block("f_BB2");
        let join = func.add_block("f_BB3");
        let orphan = func.add_block("f_BB4");
        branch(&mut func, entry, a, b);
        jump(&mut func, a, join);
        jump(&mut func, b, join);
        jump(&mut func, orphan, join);
        ret(&mut func, join);
        (func, [entry, a, b, join, orphan])
    }

    #[test]
    fn test_edges_mirror_terminators() {
        let (mut func, [entry, a, b, join, orphan]) = diamond();
        build_cfg(&mut func).unwrap();

        assert_eq!(func.block(entry).successors(), &[a, b]);
        assert_eq!(func.block(join).predecessors(), &[a, b, orphan]);
        assert!(func.block(entry).predecessors().is_empty());

        // Every predecessor's terminator targets the block
        for block in func.live_blocks() {
            for &pred in func.block(block).predecessors() {
                let term = func.terminator(pred).unwrap();
                assert!(func.kind(term).targets().contains(&block));
            }
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let (mut func, _) = diamond();
        build_cfg(&mut func).unwrap();
        let first: Vec<_> = func
            .live_blocks()
            .map(|b| (func.block(b).predecessors().to_vec(), func.block(b).successors().to_vec()))
            .collect();
        build_cfg(&mut func).unwrap();
        let second: Vec<_> = func
            .live_blocks()
            .map(|b| (func.block(b).predecessors().to_vec(), func.block(b).successors().to_vec()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_targets_give_one_edge() {
        let mut func = Function::new("f", TypeId::VOID, TypeId::VOID, &[TypeId::I1]);
        let entry = func.add_block("f_BB0");
        let exit = func.add_block("f_BB1");
        branch(&mut func, entry, exit, exit);
        ret(&mut func, exit);
        build_cfg(&mut func).unwrap();
        assert_eq!(func.block(exit).predecessors(), &[entry]);
    }

    #[test]
    fn test_pending_and_unterminated_are_rejected() {
        let mut func = Function::new("f", TypeId::VOID, TypeId::VOID, &[]);
        let entry = func.add_block("f_BB0");
        func.append(entry, InstKind::Jump { target: None }, TypeId::VOID);
        assert!(matches!(build_cfg(&mut func), Err(Error::PendingJump { .. })));

        let mut func = Function::new("f", TypeId::VOID, TypeId::VOID, &[]);
        let _entry = func.add_block("f_BB0");
        assert!(matches!(build_cfg(&mut func), Err(Error::Unterminated { .. })));
    }

    #[test]
    fn test_prune_removes_orphans_and_their_phi_entries() {
        let (mut func, [_, a, b, join, orphan]) = diamond();
        let phi = func.prepend(
            join,
            InstKind::Phi {
                incoming: vec![
                    PhiEntry {
                        block: a,
                        value: Some(Value::int(1)),
                    },
                    PhiEntry {
                        block: b,
                        value: Some(Value::int(2)),
                    },
                    PhiEntry {
                        block: orphan,
                        value: Some(Value::int(3)),
                    },
                ],
            },
            TypeId::I32,
        );
        build_cfg(&mut func).unwrap();

        let removed = prune_unreachable(&mut func).unwrap();
        assert_eq!(removed, vec![orphan]);
        assert!(func.block(orphan).is_deleted());
        assert_eq!(func.block(join).predecessors(), &[a, b]);
        let InstKind::Phi { incoming } = func.kind(phi) else {
            panic!("expected phi");
        };
        assert_eq!(incoming.len(), 2);
        func.verify().unwrap();

        assert!(prune_unreachable(&mut func).unwrap().is_empty());
    }

    #[test]
    fn test_branch_to_deleted_block_becomes_jump() {
        let (mut func, [entry, a, b, _, _]) = diamond();
        func.delete_block(b);
        let folded = build_cfg(&mut func).unwrap();
        assert_eq!(folded, vec![entry]);
        let term = func.terminator(entry).unwrap();
        assert_eq!(func.kind(term), &InstKind::Jump { target: Some(a) });
        assert_eq!(func.block(entry).successors(), &[a]);
        assert!(func.users(Value::Arg(0)).is_empty());
    }
}
