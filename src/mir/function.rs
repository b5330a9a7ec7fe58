//! Functions: the instruction and block arenas plus def-use bookkeeping.
//!
//! A [`Function`] owns every instruction and block it contains. Instructions
//! are never freed: removal unlinks them from their block, drops the uses
//! they held, and marks them dead, so outstanding [`InstId`]s stay valid for
//! diagnostics.
//!
//! # Use-lists
//!
//! Every instruction and argument carries the list of instructions using it,
//! one entry per operand slot. The list is kept exactly in sync with the
//! operands by the mutation methods on this type; passes must go through them
//! (in particular [`Function::replace_all_uses_with`]) rather than editing
//! operands directly.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use crate::{
    mir::{BasicBlock, BlockId, InstId, InstKind, PhiEntry, TypeId, Value},
    Result,
};

bitflags! {
    /// Function attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FunctionFlags: u8 {
        /// Declared only; the body lives in the runtime library.
        const EXTERNAL = 1 << 0;
        /// Retired by a pass (fully inlined); not emitted.
        const DELETED = 1 << 1;
    }
}

/// Arena record of one instruction.
#[derive(Debug, Clone)]
pub struct InstData {
    pub(crate) kind: InstKind,
    pub(crate) ty: TypeId,
    pub(crate) block: BlockId,
    pub(crate) prev: Option<InstId>,
    pub(crate) next: Option<InstId>,
    pub(crate) users: Vec<InstId>,
    pub(crate) live: bool,
}

impl InstData {
    /// Operation and operands.
    #[must_use]
    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    /// Result type (`void` for instructions without a result).
    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Block the instruction belongs to (or last belonged to, once removed).
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Instructions using this result, one entry per operand slot.
    #[must_use]
    pub fn users(&self) -> &[InstId] {
        &self.users
    }

    /// `false` once the instruction has been removed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Next instruction in the block.
    #[must_use]
    pub fn next(&self) -> Option<InstId> {
        self.next
    }

    /// Previous instruction in the block.
    #[must_use]
    pub fn prev(&self) -> Option<InstId> {
        self.prev
    }
}

/// A formal argument.
#[derive(Debug, Clone)]
pub struct Argument {
    pub(crate) ty: TypeId,
    pub(crate) users: Vec<InstId>,
}

impl Argument {
    /// Declared type.
    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Instructions using the argument.
    #[must_use]
    pub fn users(&self) -> &[InstId] {
        &self.users
    }
}

/// A function of the module, external or defined.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    signature: TypeId,
    ret_ty: TypeId,
    args: Vec<Argument>,
    flags: FunctionFlags,
    entry: Option<BlockId>,
    insts: Vec<InstData>,
    blocks: Vec<BasicBlock>,
    layout: Vec<BlockId>,
}

impl Function {
    /// Creates a function without blocks.
    ///
    /// # Arguments
    ///
    /// * `name` - Symbol name, unique within the module
    /// * `signature` - Interned function type
    /// * `ret_ty` - Return type
    /// * `params` - Parameter types in order
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        signature: TypeId,
        ret_ty: TypeId,
        params: &[TypeId],
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            ret_ty,
            args: params
                .iter()
                .map(|&ty| Argument {
                    ty,
                    users: Vec::new(),
                })
                .collect(),
            flags: FunctionFlags::empty(),
            entry: None,
            insts: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
        }
    }

    /// Creates an external declaration.
    #[must_use]
    pub fn external(
        name: impl Into<String>,
        signature: TypeId,
        ret_ty: TypeId,
        params: &[TypeId],
    ) -> Self {
        let mut func = Self::new(name, signature, ret_ty, params);
        func.flags |= FunctionFlags::EXTERNAL;
        func
    }

    // ── Attributes ──────────────────────────────────────────────────────

    /// Symbol name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interned function type.
    #[must_use]
    pub fn signature(&self) -> TypeId {
        self.signature
    }

    /// Return type.
    #[must_use]
    pub fn return_type(&self) -> TypeId {
        self.ret_ty
    }

    /// Formal arguments.
    #[must_use]
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Attribute flags.
    #[must_use]
    pub fn flags(&self) -> FunctionFlags {
        self.flags
    }

    /// `true` for runtime declarations.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.flags.contains(FunctionFlags::EXTERNAL)
    }

    /// `true` once retired.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(FunctionFlags::DELETED)
    }

    /// Retires the function; it is no longer emitted or optimized.
    pub fn mark_deleted(&mut self) {
        self.flags |= FunctionFlags::DELETED;
    }

    // ── Blocks ──────────────────────────────────────────────────────────

    /// Appends a new empty block to the layout. The first block created
    /// becomes the entry.
    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(label.into()));
        self.layout.push(id);
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    /// Entry block, `None` for declarations.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    /// Block record.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this function.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// Number of blocks ever created, deleted ones included. Block handles
    /// are `0..block_count()`.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// All blocks in layout order, deleted ones included.
    #[must_use]
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Non-deleted blocks in layout order.
    pub fn live_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.layout
            .iter()
            .copied()
            .filter(|&b| !self.blocks[b.index()].deleted)
    }

    /// Moves `block` in the layout so it directly follows `after`.
    pub(crate) fn place_after(&mut self, block: BlockId, after: BlockId) {
        self.layout.retain(|&b| b != block);
        let pos = self
            .layout
            .iter()
            .position(|&b| b == after)
            .map_or(self.layout.len(), |p| p + 1);
        self.layout.insert(pos, block);
    }

    /// Flags `block` deleted and removes every instruction in it.
    pub fn delete_block(&mut self, block: BlockId) {
        for inst in self.block_insts(block) {
            self.remove_inst(inst);
        }
        let data = &mut self.blocks[block.index()];
        data.deleted = true;
        data.clear_edges();
        data.clear_dominance();
    }

    // ── Instructions ────────────────────────────────────────────────────

    /// Arena record of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this function.
    #[must_use]
    pub fn inst(&self, id: InstId) -> &InstData {
        &self.insts[id.index()]
    }

    /// Operation of `id`.
    #[must_use]
    pub fn kind(&self, id: InstId) -> &InstKind {
        &self.insts[id.index()].kind
    }

    /// Number of live instructions.
    #[must_use]
    pub fn inst_count(&self) -> usize {
        self.insts.iter().filter(|i| i.live).count()
    }

    /// Iterates the instructions of `block` in order.
    ///
    /// The iterator borrows the function; use [`Function::block_insts`] to
    /// mutate while walking.
    #[must_use]
    pub fn insts(&self, block: BlockId) -> BlockInsts<'_> {
        BlockInsts {
            func: self,
            next: self.blocks[block.index()].head,
        }
    }

    /// Snapshot of the instructions of `block`.
    #[must_use]
    pub fn block_insts(&self, block: BlockId) -> Vec<InstId> {
        self.insts(block).collect()
    }

    /// The terminator of `block`, if its last instruction is one.
    #[must_use]
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.blocks[block.index()]
            .tail
            .filter(|&t| self.insts[t.index()].kind.is_terminator())
    }

    /// Phis at the start of `block`.
    #[must_use]
    pub fn phis(&self, block: BlockId) -> Vec<InstId> {
        self.insts(block)
            .take_while(|&i| self.insts[i.index()].kind.is_phi())
            .collect()
    }

    /// Type of a function-local value. `None` for globals, whose pointer
    /// type lives in the module.
    #[must_use]
    pub fn value_type(&self, value: Value) -> Option<TypeId> {
        match value {
            Value::Inst(id) => Some(self.insts[id.index()].ty),
            Value::Arg(idx) => self.args.get(idx as usize).map(|a| a.ty),
            Value::Const(c) => Some(c.ty()),
            Value::Global(_) => None,
        }
    }

    /// Users of `value`, one entry per operand slot. Constants and globals
    /// have no tracked users.
    #[must_use]
    pub fn users(&self, value: Value) -> &[InstId] {
        match value {
            Value::Inst(id) => &self.insts[id.index()].users,
            Value::Arg(idx) => self
                .args
                .get(idx as usize)
                .map_or(&[][..], |a| a.users.as_slice()),
            Value::Const(_) | Value::Global(_) => &[],
        }
    }

    /// Appends an instruction at the end of `block`.
    pub fn append(&mut self, block: BlockId, kind: InstKind, ty: TypeId) -> InstId {
        let id = self.alloc_inst(block, kind, ty);
        let tail = self.blocks[block.index()].tail;
        self.link(block, tail, id);
        id
    }

    /// Inserts an instruction at the start of `block`.
    pub fn prepend(&mut self, block: BlockId, kind: InstKind, ty: TypeId) -> InstId {
        let id = self.alloc_inst(block, kind, ty);
        self.link(block, None, id);
        id
    }

    /// Inserts an instruction directly before `before`.
    pub fn insert_before(&mut self, before: InstId, kind: InstKind, ty: TypeId) -> InstId {
        let block = self.insts[before.index()].block;
        let prev = self.insts[before.index()].prev;
        let id = self.alloc_inst(block, kind, ty);
        self.link(block, prev, id);
        id
    }

    /// Unlinks `id` from its block and drops the uses it held.
    ///
    /// The result must be unused or its users must be removed as well;
    /// removing an already dead instruction is a no-op.
    pub fn remove_inst(&mut self, id: InstId) {
        if !self.insts[id.index()].live {
            return;
        }
        self.unlink(id);
        self.unregister_uses(id);
        self.insts[id.index()].live = false;
    }

    /// Replaces the operation of `id`, updating use-lists for both the old
    /// and the new operands.
    pub fn replace_kind(&mut self, id: InstId, kind: InstKind) {
        self.unregister_uses(id);
        self.insts[id.index()].kind = kind;
        self.register_uses(id);
    }

    /// Changes the result type of `id`.
    pub(crate) fn set_type(&mut self, id: InstId, ty: TypeId) {
        self.insts[id.index()].ty = ty;
    }

    /// Rewrites every use of `old` to `new` and moves the use-list entries
    /// across. Returns the number of operand slots rewritten.
    pub fn replace_all_uses_with(&mut self, old: Value, new: Value) -> usize {
        if old == new {
            return 0;
        }
        debug_assert!(
            new.as_inst().map_or(true, |id| self.insts[id.index()].live),
            "replacement {new:?} is not a live instruction"
        );
        let Some(list) = self.users_mut(old) else {
            return 0;
        };
        let users = std::mem::take(list);

        let mut seen = HashSet::new();
        for &user in &users {
            if seen.insert(user) {
                self.insts[user.index()].kind.visit_operands_mut(|v| {
                    if *v == old {
                        *v = new;
                    }
                });
            }
        }

        let count = users.len();
        if let Some(target) = self.users_mut(new) {
            target.extend(users);
        }
        count
    }

    /// Fills the first unfilled entry of `phi` for predecessor `pred`.
    /// Returns `false` if there is no such entry.
    pub fn fill_phi(&mut self, phi: InstId, pred: BlockId, value: Value) -> bool {
        let InstKind::Phi { incoming } = &mut self.insts[phi.index()].kind else {
            return false;
        };
        let Some(entry) = incoming
            .iter_mut()
            .find(|e| e.block == pred && e.value.is_none())
        else {
            return false;
        };
        entry.value = Some(value);
        if let Some(users) = self.users_mut(value) {
            users.push(phi);
        }
        true
    }

    /// Drops the entries of `phi` whose predecessor fails `keep`, returning
    /// how many were removed.
    pub fn retain_phi_entries(&mut self, phi: InstId, mut keep: impl FnMut(BlockId) -> bool) -> usize {
        let InstKind::Phi { incoming } = &self.insts[phi.index()].kind else {
            return 0;
        };
        let (kept, dropped): (Vec<PhiEntry>, Vec<PhiEntry>) =
            incoming.iter().partition(|e| keep(e.block));
        if dropped.is_empty() {
            return 0;
        }
        self.replace_kind(phi, InstKind::Phi { incoming: kept });
        dropped.len()
    }

    /// Renames predecessor `old` to `new` in every phi of `block`.
    pub fn replace_phi_predecessor(&mut self, block: BlockId, old: BlockId, new: BlockId) {
        for phi in self.phis(block) {
            if let InstKind::Phi { incoming } = &mut self.insts[phi.index()].kind {
                for entry in incoming.iter_mut().filter(|e| e.block == old) {
                    entry.block = new;
                }
            }
        }
    }

    /// Moves every instruction after `inst` to the end of `into`, returning
    /// the moved instructions in order.
    pub fn split_after(&mut self, inst: InstId, into: BlockId) -> Vec<InstId> {
        let mut moved = Vec::new();
        let mut cursor = self.insts[inst.index()].next;
        while let Some(id) = cursor {
            cursor = self.insts[id.index()].next;
            self.unlink(id);
            let tail = self.blocks[into.index()].tail;
            self.link(into, tail, id);
            moved.push(id);
        }
        moved
    }

    /// Moves `inst` to the start of `block`.
    pub fn move_to_front(&mut self, inst: InstId, block: BlockId) {
        self.unlink(inst);
        self.link(block, None, inst);
    }

    /// Checks the structural invariants of a defined function:
    ///
    /// - every live block is non-empty and ends in its only terminator;
    /// - phis form a prefix of their block;
    /// - operands only name live instructions;
    /// - use-lists are exactly the reverse of the operand references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`](crate::Error::Internal) describing the
    /// first violation found.
    pub fn verify(&self) -> Result<()> {
        let mut expected: HashMap<UseKey, Vec<InstId>> = HashMap::new();

        for block in self.live_blocks() {
            let data = &self.blocks[block.index()];
            let insts = self.block_insts(block);
            if insts.len() != data.len {
                return Err(internal_error!(
                    "block {} length {} disagrees with its list of {}",
                    data.label,
                    data.len,
                    insts.len()
                ));
            }
            let Some(&last) = insts.last() else {
                return Err(internal_error!("block {} is empty", data.label));
            };

            let mut in_phi_prefix = true;
            for &id in &insts {
                let inst = &self.insts[id.index()];
                if !inst.live || inst.block != block {
                    return Err(internal_error!(
                        "instruction {id} is listed in {} but is dead or owned elsewhere",
                        data.label
                    ));
                }
                if inst.kind.is_terminator() != (id == last) {
                    return Err(internal_error!(
                        "block {} has a misplaced or missing terminator at {id}",
                        data.label
                    ));
                }
                if inst.kind.is_phi() && !in_phi_prefix {
                    return Err(internal_error!(
                        "phi {id} in {} follows a non-phi instruction",
                        data.label
                    ));
                }
                in_phi_prefix &= inst.kind.is_phi();

                let mut bad_operand = None;
                inst.kind.visit_operands(|v| {
                    if let Some(key) = UseKey::of(v) {
                        if let UseKey::Inst(def) = key {
                            if !self.insts[def.index()].live {
                                bad_operand = Some(def);
                            }
                        }
                        expected.entry(key).or_default().push(id);
                    }
                });
                if let Some(def) = bad_operand {
                    return Err(internal_error!("{id} uses removed instruction {def}"));
                }
            }
        }

        let actual = self
            .insts
            .iter()
            .enumerate()
            .filter(|(_, i)| i.live)
            .map(|(idx, i)| (UseKey::Inst(InstId::new(idx)), &i.users))
            .chain(
                self.args
                    .iter()
                    .enumerate()
                    .map(|(idx, a)| (UseKey::Arg(idx), &a.users)),
            );
        for (key, users) in actual {
            let mut have = users.clone();
            let mut want = expected.remove(&key).unwrap_or_default();
            have.sort_unstable();
            want.sort_unstable();
            if have != want {
                return Err(internal_error!(
                    "use-list of {key:?} is {have:?}, operands say {want:?}"
                ));
            }
        }
        if let Some((key, _)) = expected.into_iter().next() {
            return Err(internal_error!("{key:?} is used but not tracked"));
        }

        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn alloc_inst(&mut self, block: BlockId, kind: InstKind, ty: TypeId) -> InstId {
        let id = InstId::new(self.insts.len());
        self.insts.push(InstData {
            kind,
            ty,
            block,
            prev: None,
            next: None,
            users: Vec::new(),
            live: true,
        });
        self.register_uses(id);
        id
    }

    fn users_mut(&mut self, value: Value) -> Option<&mut Vec<InstId>> {
        match value {
            Value::Inst(id) => Some(&mut self.insts[id.index()].users),
            Value::Arg(idx) => self.args.get_mut(idx as usize).map(|a| &mut a.users),
            Value::Const(_) | Value::Global(_) => None,
        }
    }

    fn register_uses(&mut self, id: InstId) {
        for operand in self.insts[id.index()].kind.operands() {
            if let Some(users) = self.users_mut(operand) {
                users.push(id);
            }
        }
    }

    fn unregister_uses(&mut self, id: InstId) {
        for operand in self.insts[id.index()].kind.operands() {
            if let Some(users) = self.users_mut(operand) {
                if let Some(pos) = users.iter().position(|&u| u == id) {
                    users.swap_remove(pos);
                }
            }
        }
    }

    fn link(&mut self, block: BlockId, prev: Option<InstId>, id: InstId) {
        let next = match prev {
            Some(p) => self.insts[p.index()].next,
            None => self.blocks[block.index()].head,
        };

        let data = &mut self.insts[id.index()];
        data.block = block;
        data.prev = prev;
        data.next = next;

        match prev {
            Some(p) => self.insts[p.index()].next = Some(id),
            None => self.blocks[block.index()].head = Some(id),
        }
        match next {
            Some(n) => self.insts[n.index()].prev = Some(id),
            None => self.blocks[block.index()].tail = Some(id),
        }
        self.blocks[block.index()].len += 1;
    }

    fn unlink(&mut self, id: InstId) {
        let InstData {
            block, prev, next, ..
        } = self.insts[id.index()];

        match prev {
            Some(p) => self.insts[p.index()].next = next,
            None => self.blocks[block.index()].head = next,
        }
        match next {
            Some(n) => self.insts[n.index()].prev = prev,
            None => self.blocks[block.index()].tail = prev,
        }
        self.blocks[block.index()].len -= 1;

        let data = &mut self.insts[id.index()];
        data.prev = None;
        data.next = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum UseKey {
    Inst(InstId),
    Arg(usize),
}

impl UseKey {
    fn of(value: Value) -> Option<Self> {
        match value {
            Value::Inst(id) => Some(UseKey::Inst(id)),
            Value::Arg(idx) => Some(UseKey::Arg(idx as usize)),
            Value::Const(_) | Value::Global(_) => None,
        }
    }
}

/// In-order iterator over the instructions of a block.
pub struct BlockInsts<'a> {
    func: &'a Function,
    next: Option<InstId>,
}

impl Iterator for BlockInsts<'_> {
    type Item = InstId;

    fn next(&mut self) -> Option<InstId> {
        let id = self.next?;
        self.next = self.func.insts[id.index()].next;
        Some(id)
    }
}
