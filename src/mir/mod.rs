//! The mid-level IR.
//!
//! A [`Module`] owns the type table, the globals, the string pool and the
//! functions. Each defined [`Function`] owns its blocks and instructions in
//! arenas addressed by copyable handles ([`BlockId`], [`InstId`]); operands
//! are [`Value`]s. Every instruction and argument keeps the list of
//! instructions that use it, so passes can retarget values with
//! [`Function::replace_all_uses_with`] and find dead code by looking at an
//! empty use-list.
//!
//! The IR starts out in the shape the front end lowers to: every local lives
//! in an `alloca` and is accessed through `load`/`store`. Phis only appear
//! after mem2reg.
//!
//! # Key Components
//!
//! - [`TypeTable`] / [`TypeId`] - interned structural types
//! - [`Constant`] - literals, with the folding rules in [`constant`]
//! - [`InstKind`] - the instruction set
//! - [`BasicBlock`] - instruction list plus CFG and dominance annotations
//! - [`Function`] / [`Module`] - the containers
//! - [`FunctionBuilder`] - the construction API used by the front end
//! - [`RuntimeFunction`] - the fixed runtime library surface

mod block;
mod builder;
pub mod constant;
mod function;
mod instruction;
mod module;
mod runtime;
mod types;
mod value;

pub use block::BasicBlock;
pub use builder::{default_return, FunctionBuilder};
pub use constant::Constant;
pub use function::{Argument, BlockInsts, Function, FunctionFlags, InstData};
pub use instruction::{BinaryOp, CastOp, CondCode, InstKind, PhiEntry};
pub use module::{Global, GlobalInit, Module};
pub use runtime::RuntimeFunction;
pub use types::{Type, TypeDisplay, TypeId, TypeTable};
pub use value::{BlockId, FuncId, GlobalId, InstId, StrId, Value};
