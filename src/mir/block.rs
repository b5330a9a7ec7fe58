//! Basic blocks.

use std::collections::BTreeSet;

use crate::{
    mir::{BlockId, InstId},
    utils::BitSet,
};

/// A basic block: a straight-line instruction sequence ending in exactly one
/// terminator.
///
/// The instructions themselves live in the owning function's arena; the
/// block holds the ends of an intrusive doubly linked list through them, so
/// insertion at either end and removal of any instruction are O(1).
///
/// Control-flow edges and dominance facts are derived data. They are valid
/// only after [`build_cfg`](crate::analysis::build_cfg) and
/// [`build_dominance`](crate::analysis::build_dominance) ran on the current
/// shape of the function, and are recomputed from scratch, never patched.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub(crate) label: String,
    pub(crate) head: Option<InstId>,
    pub(crate) tail: Option<InstId>,
    pub(crate) len: usize,
    pub(crate) deleted: bool,
    pub(crate) preds: Vec<BlockId>,
    pub(crate) succs: Vec<BlockId>,
    pub(crate) idom: Option<BlockId>,
    pub(crate) dominators: BitSet,
    pub(crate) frontier: BTreeSet<BlockId>,
    pub(crate) dom_children: Vec<BlockId>,
}

impl BasicBlock {
    pub(crate) fn new(label: String) -> Self {
        Self {
            label,
            head: None,
            tail: None,
            len: 0,
            deleted: false,
            preds: Vec::new(),
            succs: Vec::new(),
            idom: None,
            dominators: BitSet::new(0),
            frontier: BTreeSet::new(),
            dom_children: Vec::new(),
        }
    }

    /// The block's label, unique within its function.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// `true` once the block has been retired. Deleted blocks keep their
    /// handle but hold no instructions and take part in no edges.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// First instruction.
    #[must_use]
    pub fn first(&self) -> Option<InstId> {
        self.head
    }

    /// Last instruction; the terminator of a well-formed block.
    #[must_use]
    pub fn last(&self) -> Option<InstId> {
        self.tail
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if the block holds no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Predecessors in first-seen order.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.preds
    }

    /// Successors in terminator order.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.succs
    }

    /// Immediate dominator; `None` for the entry block.
    #[must_use]
    pub fn idom(&self) -> Option<BlockId> {
        self.idom
    }

    /// Iterates the blocks dominating this one, including itself.
    pub fn dominators(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.dominators.iter().map(BlockId::new)
    }

    /// `true` if `other` dominates this block.
    #[must_use]
    pub fn is_dominated_by(&self, other: BlockId) -> bool {
        self.dominators.contains(other.index())
    }

    /// Dominance frontier.
    #[must_use]
    pub fn frontier(&self) -> &BTreeSet<BlockId> {
        &self.frontier
    }

    /// Children in the dominator tree.
    #[must_use]
    pub fn dom_children(&self) -> &[BlockId] {
        &self.dom_children
    }

    pub(crate) fn clear_edges(&mut self) {
        self.preds.clear();
        self.succs.clear();
    }

    pub(crate) fn clear_dominance(&mut self) {
        self.idom = None;
        self.dominators = BitSet::new(0);
        self.frontier.clear();
        self.dom_children.clear();
    }
}
