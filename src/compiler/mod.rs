//! Compiler infrastructure: pass interface, shared context and pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared state of one compilation    │
//! │    ├─ Block label counters    (per function)                     │
//! │    ├─ Runtime declarations    (declared on first use)            │
//! │    ├─ Inlined / deleted sets                                     │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler                Fixed pipeline                     │
//! │    ├─ CFG build               (every function, always)           │
//! │    ├─ Inlining                (module-wide, sequential)          │
//! │    ├─ Dead code elimination   (per function)                     │
//! │    ├─ mem2reg                 (per function)                     │
//! │    └─ Dead code elimination   (per function)                     │
//! │                                                                  │
//! │  MirPass trait                Interface for all passes           │
//! │    ├─ run_on_function()       Per-function transformation        │
//! │    ├─ run_global()            Module-wide transformation         │
//! │    └─ initialize()/finalize() Setup and teardown                 │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use sysmir::{
//!     compiler::{CompilerContext, PassScheduler, PipelineConfig},
//!     mir::{FunctionBuilder, Module, TypeId, Value},
//! };
//!
//! let mut module = Module::new();
//! let ctx = CompilerContext::new();
//! let main = module.define_function("main", TypeId::I32, &[])?;
//! let mut builder = FunctionBuilder::new(&mut module, &ctx, main)?;
//! let slot = builder.alloc(TypeId::I32);
//! builder.store(Value::int(41), slot)?;
//! let x = builder.load(slot)?;
//! let y = builder.binary(sysmir::mir::BinaryOp::Add, x, Value::int(1));
//! builder.ret(Some(y));
//! builder.finish()?;
//!
//! PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;
//! assert_eq!(module.function(main).inst_count(), 1);
//! # Ok::<(), sysmir::Error>(())
//! ```

mod config;
mod context;
mod events;
mod pass;
mod passes;
mod scheduler;

pub use config::PipelineConfig;
pub use context::CompilerContext;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::MirPass;
pub use passes::{DeadCodeEliminationPass, InliningPass, Mem2RegPass};
pub use scheduler::PassScheduler;
