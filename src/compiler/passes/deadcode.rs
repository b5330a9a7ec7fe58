//! Dead code elimination pass.
//!
//! Each sweep:
//!
//! 1. rebuilds the CFG, folding branches into a retired block into jumps;
//! 2. retires blocks no longer reachable from the entry;
//! 3. removes every instruction that has no users and no side effects.
//!
//! Sweeps repeat until one changes nothing. Calls, stores and terminators are
//! never removed; a chain of otherwise unused arithmetic disappears over
//! successive sweeps (usually in one, since each block is walked backwards).

use crate::{
    analysis::{build_cfg, prune_unreachable},
    compiler::{pass::MirPass, CompilerContext, EventKind},
    mir::{Function, InstId, TypeTable},
    Result,
};

/// Default bound on the number of sweeps.
const MAX_ITERATIONS: usize = 100;

/// Dead code elimination pass.
pub struct DeadCodeEliminationPass {
    max_iterations: usize,
}

impl Default for DeadCodeEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminationPass {
    /// Creates a new dead code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Sets the bound on the number of sweeps per function.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    fn is_removable(func: &Function, inst: InstId) -> bool {
        let data = func.inst(inst);
        data.is_live() && data.users().is_empty() && !data.kind().has_side_effects()
    }

    /// One sweep; returns the number of changes made.
    fn run_iteration(&self, func: &mut Function, ctx: &CompilerContext) -> Result<usize> {
        let mut changes = 0;

        for block in build_cfg(func)? {
            ctx.events
                .record(EventKind::BranchSimplified)
                .at(func.name(), func.block(block).label())
                .pass(self.name());
            changes += 1;
        }

        for block in prune_unreachable(func)? {
            ctx.events
                .record(EventKind::BlockRemoved)
                .at(func.name(), func.block(block).label())
                .pass(self.name());
            changes += 1;
        }

        let blocks: Vec<_> = func.live_blocks().collect();
        for block in blocks {
            let mut insts = func.block_insts(block);
            insts.reverse();
            for inst in insts {
                if !Self::is_removable(func, inst) {
                    continue;
                }
                log::trace!("{}: removing dead {}", func.name(), inst);
                ctx.events
                    .record(EventKind::InstructionRemoved)
                    .at(func.name(), func.block(block).label())
                    .message(format!("{} {inst}", func.kind(inst).mnemonic()))
                    .pass(self.name());
                func.remove_inst(inst);
                changes += 1;
            }
        }

        Ok(changes)
    }
}

impl MirPass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes unreachable blocks and unused side-effect-free instructions"
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _types: &TypeTable,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let mut total = 0;
        for _ in 0..self.max_iterations {
            let changes = self.run_iteration(func, ctx)?;
            if changes == 0 {
                return Ok(total > 0);
            }
            total += changes;
        }

        log::warn!(
            "{}: dead code elimination stopped after {} sweeps without settling",
            func.name(),
            self.max_iterations
        );
        ctx.events.warn(format!(
            "dead code elimination on {} hit the sweep bound ({})",
            func.name(),
            self.max_iterations
        ));
        Ok(total > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{BinaryOp, FuncId, InstKind, Module, TypeId, Value};

    fn run(module: &mut Module, f: FuncId, ctx: &CompilerContext) -> bool {
        let (types, funcs) = module.split_functions_mut();
        DeadCodeEliminationPass::new()
            .run_on_function(&mut funcs[f.index()], types, ctx)
            .unwrap()
    }

    /// Unused arithmetic chain, a store, a call and an orphan block.
    fn sample() -> (Module, FuncId) {
        let mut module = Module::new();
        let callee = module.declare_function("sink", TypeId::VOID, &[]);
        let f = module.define_function("f", TypeId::I32, &[TypeId::I32]).unwrap();
        let func = module.function_mut(f);
        let entry = func.add_block("f_BB0");
        let orphan = func.add_block("f_BB1");

        let slot = func.append(
            entry,
            InstKind::Alloc {
                allocated: TypeId::I32,
            },
            TypeId::I32,
        );
        let a = func.append(
            entry,
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: Value::Arg(0),
                rhs: Value::int(1),
            },
            TypeId::I32,
        );
        func.append(
            entry,
            InstKind::Binary {
                op: BinaryOp::Mul,
                lhs: Value::Inst(a),
                rhs: Value::int(2),
            },
            TypeId::I32,
        );
        func.append(
            entry,
            InstKind::Store {
                value: Value::Arg(0),
                ptr: Value::Inst(slot),
            },
            TypeId::VOID,
        );
        func.append(
            entry,
            InstKind::Call {
                callee,
                args: vec![],
                format: None,
            },
            TypeId::VOID,
        );
        func.append(
            entry,
            InstKind::Return {
                value: Some(Value::Arg(0)),
            },
            TypeId::VOID,
        );
        func.append(
            orphan,
            InstKind::Return {
                value: Some(Value::int(0)),
            },
            TypeId::VOID,
        );
        (module, f)
    }

    #[test]
    fn test_removes_dead_chain_and_orphan_block() {
        let (mut module, f) = sample();
        let ctx = CompilerContext::new();
        assert!(run(&mut module, f, &ctx));

        let func = module.function(f);
        let entry = func.entry().unwrap();
        let kinds: Vec<_> = func
            .insts(entry)
            .map(|i| func.kind(i).mnemonic())
            .collect();
        assert_eq!(kinds, vec!["alloca", "store", "call", "ret"]);
        assert_eq!(func.live_blocks().count(), 1);
        func.verify().unwrap();

        assert_eq!(ctx.events.count_kind(EventKind::InstructionRemoved), 2);
        assert_eq!(ctx.events.count_kind(EventKind::BlockRemoved), 1);
    }

    #[test]
    fn test_is_idempotent() {
        let (mut module, f) = sample();
        let ctx = CompilerContext::new();
        run(&mut module, f, &ctx);
        let before = module.function(f).inst_count();
        assert!(!run(&mut module, f, &ctx));
        assert_eq!(module.function(f).inst_count(), before);
    }

    #[test]
    fn test_sweep_bound_is_reported() {
        let (mut module, f) = sample();
        let ctx = CompilerContext::new();
        let (types, funcs) = module.split_functions_mut();
        let pass = DeadCodeEliminationPass::new().with_max_iterations(1);
        assert!(pass.run_on_function(&mut funcs[f.index()], types, &ctx).unwrap());
        assert_eq!(ctx.events.warnings().count(), 1);
    }
}
