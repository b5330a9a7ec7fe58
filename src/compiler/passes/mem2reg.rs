//! Promotion of stack slots to SSA values.
//!
//! The front end lowers every local variable to an `alloca` accessed through
//! `load` and `store`. This pass rewrites the promotable ones into SSA form
//! with phis placed at the iterated dominance frontier of their stores:
//!
//! 1. **Candidates**: a slot is promotable if it does not hold an array and
//!    every use is a `load` from it or a `store` to it. Slots whose address
//!    escapes (stored as a value, used by a `getelementptr` or passed to a
//!    call) stay in memory.
//! 2. **Phi placement**: for each slot, an empty phi goes at the start of
//!    every block of `DF+(blocks storing to the slot)`.
//! 3. **Renaming**: a walk of the dominator tree keeps one stack of current
//!    values per slot. Stores push their value and disappear; loads are
//!    replaced by the top of the stack (or the zero of the slot type when no
//!    store reaches them); on leaving a block its pushes are popped. Each
//!    block fills its entry in the phis of its successors.
//! 4. **Cleanup**: the slots are removed, phis no real instruction depends
//!    on are swept (dead phi cycles included) and instructions that became
//!    constant-only are folded.
//!
//! The CFG is rebuilt, unreachable blocks retired and dominance recomputed
//! at the start of every run.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    analysis::{build_cfg, build_dominance, prune_unreachable, MirCfg},
    compiler::{pass::MirPass, CompilerContext, EventKind},
    mir::{
        constant::{fold_binary, fold_cast, fold_fcmp, fold_icmp},
        BlockId, Constant, Function, InstId, InstKind, PhiEntry, TypeId, TypeTable, Value,
    },
    utils::graph::{algorithms::iterated_dominance_frontier, NodeId},
    Result,
};

/// A promotable stack slot.
struct Slot {
    alloc: InstId,
    ty: TypeId,
    zero: Constant,
}

/// Dominator-tree walk state for renaming.
enum Visit {
    Enter(BlockId),
    Exit(Vec<usize>),
}

/// SSA construction pass.
#[derive(Default)]
pub struct Mem2RegPass;

impl Mem2RegPass {
    /// Creates a new mem2reg pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Allocations whose every use is a direct load or store through them.
    fn promotable_slots(func: &Function, types: &TypeTable) -> Result<Vec<Slot>> {
        let mut slots = Vec::new();
        for block in func.live_blocks() {
            for inst in func.insts(block) {
                let InstKind::Alloc { allocated } = *func.kind(inst) else {
                    continue;
                };
                if types.is_array(allocated) {
                    continue;
                }
                let this = Value::Inst(inst);
                let direct = func.users(this).iter().all(|&user| match func.kind(user) {
                    InstKind::Load { ptr } => *ptr == this,
                    InstKind::Store { value, ptr } => *ptr == this && *value != this,
                    _ => false,
                });
                if !direct {
                    continue;
                }
                let zero = Constant::zero(types, allocated).ok_or_else(|| {
                    internal_error!(
                        "slot {inst} of {} has no zero value for type {}",
                        func.name(),
                        types.display(allocated)
                    )
                })?;
                slots.push(Slot {
                    alloc: inst,
                    ty: allocated,
                    zero,
                });
            }
        }
        Ok(slots)
    }

    /// Places empty phis; returns the slot index of each new phi.
    fn insert_phis(
        &self,
        func: &mut Function,
        slots: &[Slot],
        ctx: &CompilerContext,
    ) -> HashMap<InstId, usize> {
        let frontiers: Vec<BTreeSet<NodeId>> = (0..func.block_count())
            .map(|b| {
                func.block(BlockId::new(b))
                    .frontier()
                    .iter()
                    .map(|&f| MirCfg::node(f))
                    .collect()
            })
            .collect();

        let mut phi_slot = HashMap::new();
        for (index, slot) in slots.iter().enumerate() {
            let def_blocks: BTreeSet<NodeId> = func
                .users(Value::Inst(slot.alloc))
                .iter()
                .filter(|&&u| matches!(func.kind(u), InstKind::Store { .. }))
                .map(|&u| MirCfg::node(func.inst(u).block()))
                .collect();

            for node in iterated_dominance_frontier(&frontiers, def_blocks) {
                let block = MirCfg::block(node);
                let incoming = func
                    .block(block)
                    .predecessors()
                    .iter()
                    .map(|&pred| PhiEntry {
                        block: pred,
                        value: None,
                    })
                    .collect();
                let phi = func.prepend(block, InstKind::Phi { incoming }, slot.ty);
                phi_slot.insert(phi, index);
                ctx.events
                    .record(EventKind::PhiInserted)
                    .at(func.name(), func.block(block).label())
                    .message(format!("{phi} for slot {}", slot.alloc))
                    .pass(self.name());
            }
        }
        phi_slot
    }

    /// Rewrites loads and stores of the slots along the dominator tree.
    /// Returns the instructions that may have become foldable.
    fn rename(
        func: &mut Function,
        slots: &[Slot],
        phi_slot: &HashMap<InstId, usize>,
    ) -> Result<Vec<InstId>> {
        let slot_of: HashMap<InstId, usize> = slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.alloc, i))
            .collect();
        let lookup = |ptr: Value| ptr.as_inst().and_then(|p| slot_of.get(&p).copied());

        let mut stacks: Vec<Vec<Value>> = vec![Vec::new(); slots.len()];
        let current = |stacks: &[Vec<Value>], slot: usize| {
            stacks[slot]
                .last()
                .copied()
                .unwrap_or(Value::Const(slots[slot].zero))
        };
        let mut foldable = Vec::new();

        let Some(entry) = func.entry() else {
            return Ok(foldable);
        };
        let mut work = vec![Visit::Enter(entry)];
        while let Some(visit) = work.pop() {
            let block = match visit {
                Visit::Enter(block) => block,
                Visit::Exit(pushed) => {
                    for slot in pushed {
                        stacks[slot].pop();
                    }
                    continue;
                }
            };

            let mut pushed = Vec::new();
            for inst in func.block_insts(block) {
                if let Some(&slot) = phi_slot.get(&inst) {
                    stacks[slot].push(Value::Inst(inst));
                    pushed.push(slot);
                    continue;
                }
                match *func.kind(inst) {
                    InstKind::Load { ptr } => {
                        if let Some(slot) = lookup(ptr) {
                            let value = current(&stacks, slot);
                            if value.is_const() {
                                foldable.extend_from_slice(func.users(Value::Inst(inst)));
                            }
                            func.replace_all_uses_with(Value::Inst(inst), value);
                            func.remove_inst(inst);
                        }
                    }
                    InstKind::Store { value, ptr } => {
                        if let Some(slot) = lookup(ptr) {
                            stacks[slot].push(value);
                            pushed.push(slot);
                            func.remove_inst(inst);
                        }
                    }
                    _ => {}
                }
            }

            let succs = func.block(block).successors().to_vec();
            for succ in succs {
                for phi in func.phis(succ) {
                    let Some(&slot) = phi_slot.get(&phi) else {
                        continue;
                    };
                    let value = current(&stacks, slot);
                    if !func.fill_phi(phi, block, value) {
                        return Err(internal_error!(
                            "phi {phi} in {} has no open entry for {}",
                            func.block(succ).label(),
                            func.block(block).label()
                        ));
                    }
                }
            }

            work.push(Visit::Exit(pushed));
            for &child in func.block(block).dom_children().iter().rev() {
                work.push(Visit::Enter(child));
            }
        }

        Ok(foldable)
    }

    /// Removes inserted phis that no real instruction depends on.
    fn sweep_phis(
        &self,
        func: &mut Function,
        phi_slot: &HashMap<InstId, usize>,
        ctx: &CompilerContext,
    ) {
        let mut live: HashSet<InstId> = HashSet::new();
        let mut work: Vec<InstId> = phi_slot
            .keys()
            .copied()
            .filter(|&phi| {
                func.users(Value::Inst(phi))
                    .iter()
                    .any(|u| !phi_slot.contains_key(u))
            })
            .collect();

        while let Some(phi) = work.pop() {
            if !live.insert(phi) {
                continue;
            }
            if let InstKind::Phi { incoming } = func.kind(phi) {
                for entry in incoming {
                    if let Some(operand) = entry.value.and_then(Value::as_inst) {
                        if phi_slot.contains_key(&operand) && !live.contains(&operand) {
                            work.push(operand);
                        }
                    }
                }
            }
        }

        let mut dead: Vec<InstId> = phi_slot
            .keys()
            .copied()
            .filter(|phi| !live.contains(phi))
            .collect();
        dead.sort();
        for phi in dead {
            ctx.events
                .record(EventKind::PhiRemoved)
                .at(func.name(), func.block(func.inst(phi).block()).label())
                .message(format!("{phi}"))
                .pass(self.name());
            func.remove_inst(phi);
        }
    }

    /// Folds instructions whose operands all became constants, following
    /// the users of every folded result.
    fn fold_constants(&self, func: &mut Function, mut work: Vec<InstId>, ctx: &CompilerContext) {
        while let Some(inst) = work.pop() {
            if !func.inst(inst).is_live() {
                continue;
            }
            let folded = match *func.kind(inst) {
                InstKind::Binary { op, lhs, rhs } => {
                    lhs.as_const().zip(rhs.as_const()).and_then(|(a, b)| fold_binary(op, a, b))
                }
                InstKind::Icmp { cond, lhs, rhs } => {
                    lhs.as_const().zip(rhs.as_const()).and_then(|(a, b)| fold_icmp(cond, a, b))
                }
                InstKind::Fcmp { cond, lhs, rhs } => {
                    lhs.as_const().zip(rhs.as_const()).and_then(|(a, b)| fold_fcmp(cond, a, b))
                }
                InstKind::Cast { op, value } => value
                    .as_const()
                    .and_then(|c| fold_cast(op, c, func.inst(inst).ty())),
                _ => None,
            };
            let Some(constant) = folded else {
                continue;
            };

            work.extend_from_slice(func.users(Value::Inst(inst)));
            ctx.events
                .record(EventKind::ConstantFolded)
                .at(func.name(), func.block(func.inst(inst).block()).label())
                .message(format!("{inst} = {constant}"))
                .pass(self.name());
            func.replace_all_uses_with(Value::Inst(inst), Value::Const(constant));
            func.remove_inst(inst);
        }
    }
}

impl MirPass for Mem2RegPass {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn description(&self) -> &'static str {
        "Promotes non-escaping stack slots to SSA values with phis"
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        types: &TypeTable,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        build_cfg(func)?;
        prune_unreachable(func)?;
        build_dominance(func)?;

        let slots = Self::promotable_slots(func, types)?;
        if slots.is_empty() {
            return Ok(false);
        }

        let phi_slot = self.insert_phis(func, &slots, ctx);
        let foldable = Self::rename(func, &slots, &phi_slot)?;

        for slot in &slots {
            if !func.users(Value::Inst(slot.alloc)).is_empty() {
                return Err(internal_error!(
                    "slot {} of {} still has users after renaming",
                    slot.alloc,
                    func.name()
                ));
            }
            ctx.events
                .record(EventKind::SlotPromoted)
                .function(func.name())
                .message(format!("{} ({})", slot.alloc, types.display(slot.ty)))
                .pass(self.name());
            func.remove_inst(slot.alloc);
        }

        for &phi in phi_slot.keys() {
            if let InstKind::Phi { incoming } = func.kind(phi) {
                if incoming.iter().any(|e| e.value.is_none()) {
                    return Err(internal_error!(
                        "phi {phi} in {} was left with an unfilled entry",
                        func.block(func.inst(phi).block()).label()
                    ));
                }
            }
        }

        self.sweep_phis(func, &phi_slot, ctx);
        self.fold_constants(func, foldable, ctx);

        log::debug!(
            "{}: promoted {} slots, {} phis placed",
            func.name(),
            slots.len(),
            phi_slot.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::CompilerContext,
        mir::{BinaryOp, CondCode, FuncId, FunctionBuilder, Module},
    };

    fn promote(module: &mut Module, f: FuncId, ctx: &CompilerContext) -> bool {
        let (types, funcs) = module.split_functions_mut();
        Mem2RegPass::new()
            .run_on_function(&mut funcs[f.index()], types, ctx)
            .unwrap()
    }

    fn count(func: &Function, pred: impl Fn(&InstKind) -> bool) -> usize {
        func.live_blocks()
            .flat_map(|b| func.insts(b))
            .filter(|&i| pred(func.kind(i)))
            .count()
    }

    #[test]
    fn test_straight_line_slot_disappears() {
        let mut module = Module::new();
        let ctx = CompilerContext::new();
        let f = module.define_function("f", TypeId::I32, &[TypeId::I32]).unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let slots = b.spill_arguments().unwrap();
        let x = b.load(slots[0]).unwrap();
        let y = b.binary(BinaryOp::Add, x, Value::int(1));
        b.ret(Some(y));
        b.finish().unwrap();

        assert!(promote(&mut module, f, &ctx));
        let func = module.function(f);
        func.verify().unwrap();
        assert_eq!(count(func, |k| matches!(k, InstKind::Alloc { .. })), 0);
        assert_eq!(count(func, |k| matches!(k, InstKind::Load { .. })), 0);
        let add = func.users(Value::Arg(0))[0];
        assert_eq!(
            func.kind(add),
            &InstKind::Binary {
                op: BinaryOp::Add,
                lhs: Value::Arg(0),
                rhs: Value::int(1)
            }
        );
    }

    #[test]
    fn test_read_before_write_is_zero_and_folds() {
        let mut module = Module::new();
        let ctx = CompilerContext::new();
        let f = module.define_function("f", TypeId::I32, &[]).unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let slot = b.alloc(TypeId::I32);
        let x = b.load(slot).unwrap();
        let y = b.binary(BinaryOp::Add, x, Value::int(7));
        b.ret(Some(y));
        b.finish().unwrap();

        promote(&mut module, f, &ctx);
        let func = module.function(f);
        let ret = func.terminator(func.entry().unwrap()).unwrap();
        assert_eq!(
            func.kind(ret),
            &InstKind::Return {
                value: Some(Value::int(7))
            }
        );
        assert_eq!(func.inst_count(), 1);
        assert_eq!(ctx.events.count_kind(EventKind::ConstantFolded), 1);
    }

    #[test]
    fn test_if_else_merges_with_phi() {
        let mut module = Module::new();
        let ctx = CompilerContext::new();
        let f = module.define_function("f", TypeId::I32, &[TypeId::I32]).unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let slot = b.alloc(TypeId::I32);
        let cond = b.icmp(CondCode::Gt, Value::Arg(0), Value::int(0));
        let then_bb = b.create_block();
        let else_bb = b.create_block();
        let join = b.create_block();
        b.branch(cond, then_bb, else_bb);
        b.switch_to(then_bb);
        b.store(Value::int(1), slot).unwrap();
        b.jump(join);
        b.switch_to(else_bb);
        b.store(Value::int(2), slot).unwrap();
        b.jump(join);
        b.switch_to(join);
        let v = b.load(slot).unwrap();
        b.ret(Some(v));
        b.finish().unwrap();

        promote(&mut module, f, &ctx);
        let func = module.function(f);
        func.verify().unwrap();
        let phis = func.phis(join);
        assert_eq!(phis.len(), 1);
        let InstKind::Phi { incoming } = func.kind(phis[0]) else {
            panic!("expected phi");
        };
        assert_eq!(
            incoming,
            &vec![
                PhiEntry {
                    block: then_bb,
                    value: Some(Value::int(1))
                },
                PhiEntry {
                    block: else_bb,
                    value: Some(Value::int(2))
                },
            ]
        );
    }

    #[test]
    fn test_escaping_and_array_slots_stay() {
        let mut module = Module::new();
        let ctx = CompilerContext::new();
        let sink = module.declare_function("sink", TypeId::VOID, &[]);
        let f = module.define_function("f", TypeId::VOID, &[]).unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let arr_ty = b.types_mut().array_of(TypeId::I32, 4);
        let arr = b.alloc(arr_ty);
        let elem = b.gep(arr, vec![Value::int(0), Value::int(1)]).unwrap();
        b.store(Value::int(3), elem).unwrap();
        let escaped = b.alloc(TypeId::I32);
        b.call(sink, vec![escaped]);
        b.ret(None);
        b.finish().unwrap();

        assert!(!promote(&mut module, f, &ctx));
        assert_eq!(count(module.function(f), |k| matches!(k, InstKind::Alloc { .. })), 2);
    }

    #[test]
    fn test_phi_without_readers_is_swept() {
        let mut module = Module::new();
        let ctx = CompilerContext::new();
        let f = module.define_function("f", TypeId::VOID, &[TypeId::I32]).unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let slot = b.alloc(TypeId::I32);
        let cond = b.icmp(CondCode::Eq, Value::Arg(0), Value::int(0));
        let then_bb = b.create_block();
        let else_bb = b.create_block();
        let join = b.create_block();
        b.branch(cond, then_bb, else_bb);
        b.switch_to(then_bb);
        b.store(Value::int(1), slot).unwrap();
        b.jump(join);
        b.switch_to(else_bb);
        b.store(Value::int(2), slot).unwrap();
        b.jump(join);
        b.switch_to(join);
        b.ret(None);
        b.finish().unwrap();

        promote(&mut module, f, &ctx);
        let func = module.function(f);
        func.verify().unwrap();
        assert!(func.phis(join).is_empty());
        assert_eq!(ctx.events.count_kind(EventKind::PhiInserted), 1);
        assert_eq!(ctx.events.count_kind(EventKind::PhiRemoved), 1);
    }

    #[test]
    fn test_loop_counter_gets_header_phi() {
        let mut module = Module::new();
        let ctx = CompilerContext::new();
        let f = module.define_function("f", TypeId::I32, &[TypeId::I32]).unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let slot = b.alloc(TypeId::I32);
        b.store(Value::int(0), slot).unwrap();
        let header = b.create_block();
        let body = b.create_block();
        let exit = b.create_block();
        b.jump(header);
        b.switch_to(header);
        let i = b.load(slot).unwrap();
        let cond = b.icmp(CondCode::Lt, i, Value::Arg(0));
        b.branch(cond, body, exit);
        b.switch_to(body);
        let i = b.load(slot).unwrap();
        let next = b.binary(BinaryOp::Add, i, Value::int(1));
        b.store(next, slot).unwrap();
        b.jump(header);
        b.switch_to(exit);
        let i = b.load(slot).unwrap();
        b.ret(Some(i));
        b.finish().unwrap();

        promote(&mut module, f, &ctx);
        let func = module.function(f);
        func.verify().unwrap();
        let phis = func.phis(header);
        assert_eq!(phis.len(), 1);
        let InstKind::Phi { incoming } = func.kind(phis[0]) else {
            panic!("expected phi");
        };
        assert_eq!(incoming.len(), 2);
        assert!(incoming.contains(&PhiEntry {
            block: body,
            value: Some(Value::Inst(func.users(Value::Inst(phis[0]))
                .iter()
                .copied()
                .find(|&u| matches!(func.kind(u), InstKind::Binary { .. }))
                .unwrap()))
        }));
        let ret = func.terminator(exit).unwrap();
        assert_eq!(
            func.kind(ret),
            &InstKind::Return {
                value: Some(Value::Inst(phis[0]))
            }
        );
        assert!(func.phis(body).is_empty());
        assert!(func.phis(exit).is_empty());
    }
}
