//! Pass scheduler for running the optimization pipeline.
//!
//! The `PassScheduler` first rebuilds the CFG of every defined function
//! (which also rejects unresolved jumps and unterminated blocks), then, when
//! optimizing, runs its passes once each in order. Global passes see the
//! whole module; function-local passes run over every function, optionally
//! in parallel.

use rayon::prelude::*;

use crate::{
    analysis::build_cfg,
    compiler::{
        config::PipelineConfig,
        context::CompilerContext,
        pass::MirPass,
        passes::{DeadCodeEliminationPass, InliningPass, Mem2RegPass},
        EventKind,
    },
    mir::{Function, Module, TypeTable},
    Result,
};

/// Runs the pass pipeline over a module.
///
/// The default pipeline, with every pass enabled, is:
///
/// 1. **CFG build** on every function (always, even without optimization)
/// 2. **Inlining** (global, sequential)
/// 3. **Dead code elimination** (CFG rebuild, unreachable blocks, unused
///    instructions)
/// 4. **mem2reg** (CFG rebuild, dominance, SSA construction)
/// 5. **Dead code elimination** again, for instructions whose only users
///    were promoted loads
pub struct PassScheduler {
    config: PipelineConfig,
    /// Passes in execution order.
    pub passes: Vec<Box<dyn MirPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl PassScheduler {
    /// Creates a scheduler with the pipeline described by `config`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let mut passes: Vec<Box<dyn MirPass>> = Vec::new();
        if config.optimize {
            if config.inline {
                passes.push(Box::new(InliningPass::with_threshold(
                    config.inline_threshold,
                )));
            }
            if config.dead_code {
                passes.push(Box::new(
                    DeadCodeEliminationPass::new().with_max_iterations(config.max_dce_iterations),
                ));
            }
            if config.mem2reg {
                passes.push(Box::new(Mem2RegPass::new()));
                if config.dead_code {
                    passes.push(Box::new(
                        DeadCodeEliminationPass::new()
                            .with_max_iterations(config.max_dce_iterations),
                    ));
                }
            }
        }
        Self { config, passes }
    }

    /// Creates a scheduler running exactly `passes` after the CFG build.
    #[must_use]
    pub fn with_passes(config: PipelineConfig, passes: Vec<Box<dyn MirPass>>) -> Self {
        Self { config, passes }
    }

    /// The configuration this scheduler was built from.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the scheduled passes, in order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|p| p.name())
    }

    /// Runs `f` on every defined, non-deleted function.
    ///
    /// Each function is handled by exactly one thread; with `parallel` the
    /// functions are spread over the rayon pool.
    fn for_each_function<F>(module: &mut Module, parallel: bool, f: F) -> Result<bool>
    where
        F: Fn(&mut Function, &TypeTable) -> Result<bool> + Send + Sync,
    {
        let (types, funcs) = module.split_functions_mut();
        let visit = |func: &mut Function| {
            if func.is_external() || func.is_deleted() {
                Ok(false)
            } else {
                f(func, types)
            }
        };
        let changed: Vec<bool> = if parallel {
            funcs.par_iter_mut().map(visit).collect::<Result<_>>()?
        } else {
            funcs.iter_mut().map(visit).collect::<Result<_>>()?
        };
        Ok(changed.into_iter().any(|c| c))
    }

    /// Runs one pass over the module.
    fn run_pass(&self, pass: &dyn MirPass, module: &mut Module, ctx: &CompilerContext) -> Result<bool> {
        log::debug!("{}: starting", pass.name());
        ctx.events
            .record(EventKind::PassStarted)
            .message(pass.description())
            .pass(pass.name());

        let changed = if pass.is_global() {
            pass.run_global(module, ctx)?
        } else {
            Self::for_each_function(module, self.config.parallel, |func, types| {
                if pass.should_run(func) {
                    pass.run_on_function(func, types, ctx)
                } else {
                    Ok(false)
                }
            })?
        };

        log::debug!(
            "{}: finished ({}) after {:?}",
            pass.name(),
            if changed { "changed" } else { "unchanged" },
            ctx.elapsed()
        );
        ctx.events
            .record(EventKind::PassCompleted)
            .message(if changed { "changed" } else { "unchanged" })
            .pass(pass.name());
        Ok(changed)
    }

    /// Runs the pipeline.
    ///
    /// Returns `true` if any pass changed the module. Events are accumulated
    /// in `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the CFG build or a pass; the module
    /// is left in whatever state that pass reached.
    pub fn run(&mut self, module: &mut Module, ctx: &CompilerContext) -> Result<bool> {
        log::debug!("building control-flow graphs");
        Self::for_each_function(module, self.config.parallel, |func, _| {
            build_cfg(func).map(|folded| !folded.is_empty())
        })?;

        if !self.config.optimize || self.passes.is_empty() {
            return Ok(false);
        }

        for pass in &mut self.passes {
            pass.initialize(ctx)?;
        }

        let mut changed = false;
        for pass in &self.passes {
            changed |= self.run_pass(pass.as_ref(), module, ctx)?;
        }

        for pass in &mut self.passes {
            pass.finalize(ctx)?;
        }

        log::debug!(
            "pipeline finished in {:?}: {}",
            ctx.elapsed(),
            ctx.events.summary()
        );
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        mir::{InstKind, TypeId},
        Error,
    };

    struct CountingPass {
        runs: AtomicUsize,
    }

    impl MirPass for CountingPass {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn run_on_function(
            &self,
            func: &mut Function,
            _types: &TypeTable,
            ctx: &CompilerContext,
        ) -> Result<bool> {
            self.runs.fetch_add(1, Ordering::Relaxed);
            ctx.events.info(format!("visited {}", func.name()));
            Ok(false)
        }
    }

    fn module_with(names: &[&str]) -> Module {
        let mut module = Module::new();
        module.declare_function("getint", TypeId::I32, &[]);
        for name in names {
            let f = module.define_function(*name, TypeId::VOID, &[]).unwrap();
            let func = module.function_mut(f);
            let entry = func.add_block(format!("{name}_BB0"));
            func.append(entry, InstKind::Return { value: None }, TypeId::VOID);
        }
        module
    }

    #[test]
    fn test_default_pipeline_order() {
        let scheduler = PassScheduler::default();
        let names: Vec<_> = scheduler.pass_names().collect();
        assert_eq!(
            names,
            vec![
                "inlining",
                "dead-code-elimination",
                "mem2reg",
                "dead-code-elimination"
            ]
        );
    }

    #[test]
    fn test_disabled_passes_are_not_scheduled() {
        assert_eq!(PassScheduler::new(PipelineConfig::unoptimized()).pass_names().count(), 0);
        let names: Vec<_> = PassScheduler::new(PipelineConfig::default().with_inline(false).with_mem2reg(false))
            .pass_names()
            .collect();
        assert_eq!(names, vec!["dead-code-elimination"]);
    }

    #[test]
    fn test_local_pass_skips_declarations() {
        for parallel in [false, true] {
            let mut module = module_with(&["a", "b", "c"]);
            let ctx = CompilerContext::new();
            let pass = CountingPass {
                runs: AtomicUsize::new(0),
            };
            let mut scheduler = PassScheduler::with_passes(
                PipelineConfig::default().with_parallel(parallel),
                vec![Box::new(pass)],
            );
            assert!(!scheduler.run(&mut module, &ctx).unwrap());
            assert_eq!(ctx.events.count_kind(EventKind::Info), 3);
            assert_eq!(ctx.events.count_kind(EventKind::PassStarted), 1);
            assert_eq!(ctx.events.count_kind(EventKind::PassCompleted), 1);
        }
    }

    #[test]
    fn test_unoptimized_run_still_checks_jumps() {
        let mut module = module_with(&[]);
        let f = module.define_function("f", TypeId::VOID, &[]).unwrap();
        let func = module.function_mut(f);
        let entry = func.add_block("f_BB0");
        func.append(entry, InstKind::Jump { target: None }, TypeId::VOID);

        let ctx = CompilerContext::new();
        let mut scheduler = PassScheduler::new(PipelineConfig::unoptimized());
        match scheduler.run(&mut module, &ctx) {
            Err(Error::PendingJump { function, block }) => {
                assert_eq!(function, "f");
                assert_eq!(block, "f_BB0");
            }
            other => panic!("expected a pending jump error, got {other:?}"),
        }
        assert!(ctx.events.is_empty());
    }
}
