//! Function inlining pass.
//!
//! Replaces calls to non-recursive defined functions with a copy of the
//! callee's body. For each call site:
//!
//! 1. The caller block is split after the call; the tail moves to a fresh
//!    "after" block, and phis of the old successors are renamed to it.
//! 2. Every callee block is cloned into the caller (deleted blocks stay
//!    deleted), with formal arguments replaced by the actual values.
//! 3. Cloned `alloca`s move to the front of the caller's entry block, and
//!    the cloned body starts by zeroing them (a store of the zero for
//!    scalars, `memset` for arrays), so each call sees fresh slots.
//! 4. Each cloned `ret` becomes a jump to "after". For a non-void callee
//!    the returned values meet in a phi at the start of "after" (or the
//!    single returned value is used directly).
//! 5. The call itself becomes a jump to the cloned entry.
//!
//! Recursion is detected on the call graph: no function that is part of a
//! call cycle (self-loop included) is ever inlined. Callers are processed
//! callees-first so a callee has already absorbed its own callees when it is
//! copied. Once no call to an inlined function remains anywhere, the function
//! is marked deleted (except `main`).

use std::collections::{BTreeSet, HashMap};

use crate::{
    analysis::{build_cfg, prune_unreachable, CallGraph},
    compiler::{pass::MirPass, CompilerContext, EventKind},
    mir::{
        BlockId, CastOp, Constant, FuncId, Function, InstId, InstKind, Module, PhiEntry,
        RuntimeFunction, TypeId, TypeTable, Value,
    },
    Result,
};

/// A call site selected for inlining.
#[derive(Debug, Clone, Copy)]
struct InlineCandidate {
    /// The call instruction in the caller
    call: InstId,
    /// The function being called
    callee: FuncId,
}

/// State for inlining into one caller.
struct InliningContext<'a> {
    caller: &'a mut Function,
    caller_id: FuncId,
    types: &'a TypeTable,
    ctx: &'a CompilerContext,
    /// `memset` and the `i32*` type, declared when the callee has array slots
    memset: Option<(FuncId, TypeId)>,
}

impl InliningContext<'_> {
    /// Copies `callee` over the call `call`.
    fn inline_call(&mut self, call: InstId, callee: &Function) -> Result<()> {
        let InstKind::Call { args, .. } = self.caller.kind(call) else {
            return Err(internal_error!("{call} in {} is not a call", self.caller.name()));
        };
        let args = args.clone();
        let Some(callee_entry) = callee.entry() else {
            return Err(internal_error!("cannot inline declaration {}", callee.name()));
        };
        let Some(caller_entry) = self.caller.entry() else {
            return Err(internal_error!("caller {} has no body", self.caller.name()));
        };
        let call_block = self.caller.inst(call).block();

        let label = self
            .ctx
            .next_block_label(self.caller_id, self.caller.name());
        let after = self.caller.add_block(label);
        let moved = self.caller.split_after(call, after);
        if let Some(&term) = moved.last() {
            for succ in self.caller.kind(term).targets() {
                self.caller.replace_phi_predecessor(succ, call_block, after);
            }
        }

        let block_map = self.clone_blocks(callee, call_block, after);
        let map_block = |b: BlockId| block_map[b.index()];

        // Placeholders first, so operands can name instructions cloned later
        // (loop-carried phi operands)
        let mut inst_map: HashMap<InstId, InstId> = HashMap::new();
        for src in callee.live_blocks() {
            for inst in callee.insts(src) {
                let copy = self.caller.append(
                    map_block(src),
                    InstKind::Phi {
                        incoming: Vec::new(),
                    },
                    callee.inst(inst).ty(),
                );
                inst_map.insert(inst, copy);
            }
        }

        let remap = |v: Value| match v {
            Value::Inst(id) => inst_map.get(&id).map_or(v, |&m| Value::Inst(m)),
            Value::Arg(i) => args.get(i as usize).copied().unwrap_or(v),
            Value::Const(_) | Value::Global(_) => v,
        };

        let mut returns = Vec::new();
        let mut allocs = Vec::new();
        for src in callee.live_blocks() {
            for inst in callee.insts(src) {
                let copy = inst_map[&inst];
                let mut kind = callee.kind(inst).clone();
                kind.visit_operands_mut(|v| *v = remap(*v));
                kind.visit_blocks_mut(|b| *b = map_block(*b));
                match kind {
                    InstKind::Return { value } => {
                        returns.push((map_block(src), value));
                        kind = InstKind::Jump {
                            target: Some(after),
                        };
                    }
                    InstKind::Alloc { .. } => allocs.push(copy),
                    _ => {}
                }
                self.caller.replace_kind(copy, kind);
            }
        }

        for &alloc in allocs.iter().rev() {
            self.caller.move_to_front(alloc, caller_entry);
        }
        self.reset_slots(&allocs, map_block(callee_entry))?;

        let result = self.merge_returns(callee, &returns, after);
        let call_value = Value::Inst(call);
        match result {
            Some(value) => {
                self.caller.replace_all_uses_with(call_value, value);
            }
            None if !self.caller.users(call_value).is_empty() => {
                return Err(internal_error!(
                    "result of {call} in {} is used but {} returns nothing",
                    self.caller.name(),
                    callee.name()
                ));
            }
            None => {}
        }
        self.caller.replace_kind(
            call,
            InstKind::Jump {
                target: Some(map_block(callee_entry)),
            },
        );
        self.caller.set_type(call, TypeId::VOID);
        Ok(())
    }

    /// Zeroes the hoisted `slots` at the top of `body_entry`, in slot order.
    fn reset_slots(&mut self, slots: &[InstId], body_entry: BlockId) -> Result<()> {
        let Some(first) = self.caller.insts(body_entry).next() else {
            return Err(internal_error!(
                "inlined entry {} of {} is empty",
                self.caller.block(body_entry).label(),
                self.caller.name()
            ));
        };
        for &slot in slots {
            let InstKind::Alloc { allocated } = *self.caller.kind(slot) else {
                continue;
            };
            if let Some(zero) = Constant::zero(self.types, allocated) {
                self.caller.insert_before(
                    first,
                    InstKind::Store {
                        value: Value::Const(zero),
                        ptr: Value::Inst(slot),
                    },
                    TypeId::VOID,
                );
                continue;
            }
            let Some((memset, i32_ptr)) = self.memset else {
                return Err(internal_error!(
                    "no memset declared for array slot {slot} in {}",
                    self.caller.name()
                ));
            };
            let bytes = i32::try_from(self.types.cell_count(allocated) * 4)
                .map_err(|_| internal_error!("array slot {slot} too large to reset"))?;
            let raw = self.caller.insert_before(
                first,
                InstKind::Cast {
                    op: CastOp::BitCast,
                    value: Value::Inst(slot),
                },
                i32_ptr,
            );
            self.caller.insert_before(
                first,
                InstKind::Call {
                    callee: memset,
                    args: vec![Value::Inst(raw), Value::int(0), Value::int(bytes)],
                    format: None,
                },
                TypeId::VOID,
            );
        }
        Ok(())
    }

    /// Creates one caller block per callee block, laid out between the call
    /// block and `after`. Entry `i` of the result is the copy of callee
    /// block `i`.
    fn clone_blocks(&mut self, callee: &Function, call_block: BlockId, after: BlockId) -> Vec<BlockId> {
        let mut block_map = vec![after; callee.block_count()];
        let mut prev = call_block;
        for &src in callee.layout() {
            let n = self.ctx.next_block_index(self.caller_id);
            let label = format!(
                "{}_{}_{}_{n}",
                self.caller.name(),
                callee.name(),
                callee.block(src).label()
            );
            let copy = self.caller.add_block(label);
            self.caller.place_after(copy, prev);
            if callee.block(src).is_deleted() {
                self.caller.delete_block(copy);
            }
            block_map[src.index()] = copy;
            prev = copy;
        }
        self.caller.place_after(after, prev);
        block_map
    }

    /// The value the call evaluates to, given the rewritten returns.
    fn merge_returns(
        &mut self,
        callee: &Function,
        returns: &[(BlockId, Option<Value>)],
        after: BlockId,
    ) -> Option<Value> {
        let ret_ty = callee.return_type();
        if ret_ty == TypeId::VOID {
            return None;
        }
        let values: Vec<(BlockId, Value)> = returns
            .iter()
            .filter_map(|&(block, value)| value.map(|v| (block, v)))
            .collect();
        match values.as_slice() {
            [] => Constant::zero(self.types, ret_ty).map(Value::Const),
            [(_, value)] => Some(*value),
            _ => {
                let incoming = values
                    .iter()
                    .map(|&(block, value)| PhiEntry {
                        block,
                        value: Some(value),
                    })
                    .collect();
                Some(Value::Inst(self.caller.prepend(
                    after,
                    InstKind::Phi { incoming },
                    ret_ty,
                )))
            }
        }
    }
}

/// Function inlining pass.
#[derive(Debug, Default)]
pub struct InliningPass {
    /// Only callees with at most this many instructions are inlined.
    threshold: Option<usize>,
}

impl InliningPass {
    /// Creates a pass that inlines every eligible callee.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pass limited to callees of at most `threshold` instructions
    /// (`None` for no limit).
    #[must_use]
    pub fn with_threshold(threshold: Option<usize>) -> Self {
        Self { threshold }
    }

    fn is_inlinable(&self, module: &Module, graph: &CallGraph, caller: FuncId, callee: FuncId) -> bool {
        if callee == caller || graph.is_recursive(callee) {
            return false;
        }
        let func = module.function(callee);
        if func.is_external() || func.is_deleted() || func.entry().is_none() {
            return false;
        }
        self.threshold.map_or(true, |limit| func.inst_count() <= limit)
    }

    fn find_candidates(&self, module: &Module, graph: &CallGraph, caller: FuncId) -> Vec<InlineCandidate> {
        let func = module.function(caller);
        if func.is_external() || func.is_deleted() {
            return Vec::new();
        }
        func.live_blocks()
            .flat_map(|block| func.insts(block))
            .filter_map(|call| match func.kind(call) {
                InstKind::Call { callee, .. }
                    if self.is_inlinable(module, graph, caller, *callee) =>
                {
                    Some(InlineCandidate {
                        call,
                        callee: *callee,
                    })
                }
                _ => None,
            })
            .collect()
    }

    fn has_array_slot(types: &TypeTable, func: &Function) -> bool {
        func.live_blocks().flat_map(|b| func.insts(b)).any(|inst| {
            matches!(func.kind(inst), InstKind::Alloc { allocated } if Constant::zero(types, *allocated).is_none())
        })
    }

    /// Functions still called from a live function.
    fn called_functions(module: &Module) -> BTreeSet<FuncId> {
        let mut called = BTreeSet::new();
        for (_, func) in module.functions() {
            if func.is_external() || func.is_deleted() {
                continue;
            }
            for block in func.live_blocks() {
                for inst in func.insts(block) {
                    if let InstKind::Call { callee, .. } = func.kind(inst) {
                        called.insert(*callee);
                    }
                }
            }
        }
        called
    }
}

impl MirPass for InliningPass {
    fn name(&self) -> &'static str {
        "inlining"
    }

    fn description(&self) -> &'static str {
        "Inlines calls to non-recursive functions and retires fully inlined ones"
    }

    fn is_global(&self) -> bool {
        true
    }

    fn run_on_function(
        &self,
        _func: &mut Function,
        _types: &TypeTable,
        _ctx: &CompilerContext,
    ) -> Result<bool> {
        Ok(false)
    }

    fn run_global(&self, module: &mut Module, ctx: &CompilerContext) -> Result<bool> {
        let graph = CallGraph::build(module)?;
        let mut inlined = BTreeSet::new();

        for &caller in graph.bottom_up_order() {
            for candidate in self.find_candidates(module, &graph, caller) {
                let mut callee = module.function(candidate.callee).clone();
                build_cfg(&mut callee)?;
                prune_unreachable(&mut callee)?;
                let memset = Self::has_array_slot(module.types(), &callee).then(|| {
                    let memset = ctx.runtime_function(module, RuntimeFunction::MemSet);
                    (memset, module.types_mut().pointer_to(TypeId::I32))
                });
                let (types, funcs) = module.split_functions_mut();
                let mut site = InliningContext {
                    caller: &mut funcs[caller.index()],
                    caller_id: caller,
                    types,
                    ctx,
                    memset,
                };
                let block = site.caller.inst(candidate.call).block();
                let block_label = site.caller.block(block).label().to_string();
                site.inline_call(candidate.call, &callee)?;

                log::trace!("inlined {} into {}", callee.name(), site.caller.name());
                ctx.events
                    .record(EventKind::FunctionInlined)
                    .at(site.caller.name(), block_label)
                    .message(format!("{} ({} instructions)", callee.name(), callee.inst_count()))
                    .pass(self.name());
                ctx.mark_inlined(candidate.callee);
                inlined.insert(candidate.callee);
            }
        }

        let called = Self::called_functions(module);
        for func in inlined.iter().copied().filter(|f| !called.contains(f)) {
            let function = module.function_mut(func);
            if function.name() == "main" {
                continue;
            }
            function.mark_deleted();
            ctx.mark_deleted(func);
            ctx.events
                .record(EventKind::FunctionMarkedDead)
                .function(function.name())
                .message("every call site was inlined")
                .pass(self.name());
        }

        Ok(!inlined.is_empty())
    }
}
