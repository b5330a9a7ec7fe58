//! Built-in IR passes.
//!
//! Each pass implements [`MirPass`](crate::compiler::MirPass), records every
//! rewrite in the [`EventLog`](crate::compiler::EventLog) and reports whether
//! it changed anything.
//!
//! | Pass | Scope | Description |
//! |------|-------|-------------|
//! | [`InliningPass`] | module | Copies non-recursive callees into their callers |
//! | [`DeadCodeEliminationPass`] | function | Removes unreachable blocks and unused instructions |
//! | [`Mem2RegPass`] | function | Promotes stack slots to SSA values |
//!
//! The [`PassScheduler`](crate::compiler::PassScheduler) runs them in the
//! order of the table, with a second dead code sweep after mem2reg.

mod deadcode;
mod inlining;
mod mem2reg;

pub use deadcode::DeadCodeEliminationPass;
pub use inlining::InliningPass;
pub use mem2reg::Mem2RegPass;
