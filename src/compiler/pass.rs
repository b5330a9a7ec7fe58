//! The interface every IR pass implements.

use crate::{
    compiler::CompilerContext,
    mir::{Function, Module, TypeTable},
    Result,
};

/// A transformation over the IR.
///
/// Function-local passes implement [`MirPass::run_on_function`] and may be
/// run on several functions at once; interprocedural passes set
/// [`MirPass::is_global`] and implement [`MirPass::run_global`], which sees
/// the whole module.
///
/// Passes report individual rewrites to `ctx.events` and return whether
/// anything changed. An `Err` means an IR invariant was broken and the
/// pipeline stops.
pub trait MirPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Human-readable description of what the pass does.
    fn description(&self) -> &'static str {
        ""
    }

    /// Should this pass run on `func`? Declarations and retired functions
    /// are skipped by default.
    fn should_run(&self, func: &Function) -> bool {
        !func.is_external() && !func.is_deleted()
    }

    /// Runs the pass on a single function.
    ///
    /// # Errors
    ///
    /// Returns an error if an IR invariant does not hold.
    fn run_on_function(
        &self,
        func: &mut Function,
        types: &TypeTable,
        ctx: &CompilerContext,
    ) -> Result<bool>;

    /// Runs the pass on the whole module (for interprocedural passes).
    ///
    /// # Errors
    ///
    /// Returns an error if an IR invariant does not hold.
    fn run_global(&self, _module: &mut Module, _ctx: &CompilerContext) -> Result<bool> {
        Ok(false)
    }

    /// Does this pass operate on the whole module?
    fn is_global(&self) -> bool {
        false
    }

    /// Called once before the pass runs.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after the pass ran.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }
}
