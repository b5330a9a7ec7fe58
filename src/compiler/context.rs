//! Pipeline context.
//!
//! The [`CompilerContext`] holds the state that is shared between IR
//! construction and the passes: fresh-label counters, the registry of runtime
//! functions already declared in the module, inlining bookkeeping and the
//! event log. It is threaded explicitly through the builder and every pass;
//! there is no process-wide registry.

use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};

use crate::{
    compiler::events::EventLog,
    mir::{FuncId, Module, RuntimeFunction},
};

/// Shared state of one compilation.
///
/// All collection fields use concurrent containers so function-local passes
/// can run on different functions in parallel.
pub struct CompilerContext {
    /// Accumulated events from all passes and operations.
    pub events: EventLog,

    /// Next block number per function, for `{function}_BB{n}` labels.
    block_counters: DashMap<FuncId, usize>,

    /// Runtime functions already declared in the module.
    runtime: DashMap<RuntimeFunction, FuncId>,

    /// Functions inlined into at least one caller.
    inlined: DashSet<FuncId>,

    /// Functions retired after all their call sites were inlined.
    deleted: DashSet<FuncId>,

    /// When the compilation started.
    start_time: Instant,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerContext {
    /// Creates a new, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: EventLog::new(),
            block_counters: DashMap::new(),
            runtime: DashMap::new(),
            inlined: DashSet::new(),
            deleted: DashSet::new(),
            start_time: Instant::now(),
        }
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    // ── Fresh names ─────────────────────────────────────────────────────

    /// Reserves the next block number of `func`.
    pub fn next_block_index(&self, func: FuncId) -> usize {
        let mut counter = self.block_counters.entry(func).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }

    /// Returns a fresh block label `{name}_BB{n}` for `func`.
    pub fn next_block_label(&self, func: FuncId, name: &str) -> String {
        format!("{name}_BB{}", self.next_block_index(func))
    }

    // ── Runtime registry ────────────────────────────────────────────────

    /// Returns the declaration of `rf`, declaring it in `module` on first use.
    pub fn runtime_function(&self, module: &mut Module, rf: RuntimeFunction) -> FuncId {
        if let Some(id) = self.runtime.get(&rf) {
            return *id;
        }
        let id = module.declare_runtime(rf);
        self.runtime.insert(rf, id);
        id
    }

    /// Runtime functions declared so far.
    #[must_use]
    pub fn declared_runtime(&self) -> Vec<RuntimeFunction> {
        let mut declared: Vec<_> = self.runtime.iter().map(|e| *e.key()).collect();
        declared.sort();
        declared
    }

    // ── Inlining bookkeeping ────────────────────────────────────────────

    /// Marks a function as having been inlined at least once.
    pub fn mark_inlined(&self, func: FuncId) {
        self.inlined.insert(func);
    }

    /// Checks if a function was inlined at least once.
    #[must_use]
    pub fn was_inlined(&self, func: FuncId) -> bool {
        self.inlined.contains(&func)
    }

    /// Records that a function was retired.
    pub fn mark_deleted(&self, func: FuncId) {
        self.deleted.insert(func);
    }

    /// Checks if a function was retired by a pass.
    #[must_use]
    pub fn is_deleted(&self, func: FuncId) -> bool {
        self.deleted.contains(&func)
    }
}
