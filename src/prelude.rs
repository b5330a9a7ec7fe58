//! # sysmir Prelude
//!
//! Re-exports of the types needed to build a module, run the pipeline over
//! it, and emit or execute the result.
//!
//! ```rust
//! use sysmir::prelude::*;
//!
//! let ctx = CompilerContext::new();
//! let mut module = Module::new();
//! let main = module.define_function("main", TypeId::I32, &[])?;
//! FunctionBuilder::new(&mut module, &ctx, main)?.finish()?;
//! PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;
//! assert_eq!(Interpreter::new(&module)?.run("main", &[])?, EmValue::Int(0));
//! # Ok::<(), sysmir::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

pub use crate::{Error, Result};

// ================================================================================================
// IR
// ================================================================================================

pub use crate::mir::{
    BasicBlock, BinaryOp, BlockId, CastOp, CondCode, Constant, FuncId, Function,
    FunctionBuilder, GlobalId, GlobalInit, InstId, InstKind, Module, RuntimeFunction, TypeId,
    TypeTable, Value,
};

// ================================================================================================
// Pipeline
// ================================================================================================

pub use crate::compiler::{
    CompilerContext, DeadCodeEliminationPass, EventKind, EventLog, InliningPass, Mem2RegPass,
    MirPass, PassScheduler, PipelineConfig,
};

pub use crate::analysis::{build_cfg, build_dominance, prune_unreachable, CallGraph};

// ================================================================================================
// Output
// ================================================================================================

pub use crate::emit::{emit_module, emit_to_string};

pub use crate::emulation::{EmValue, EmulationError, EmulationLimits, Interpreter};
