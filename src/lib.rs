// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # sysmir
//!
//! The middle end of a compiler for a small C-like language: a typed,
//! register-oriented intermediate representation, the analyses and
//! optimization passes that run over it, a textual IR emitter, and a
//! reference interpreter.
//!
//! ## Features
//!
//! - **Arena IR** - functions own their blocks and instructions, addressed by
//!   copyable handles; every instruction keeps its use-list
//! - **Construction-time folding** - constant operands never reach the IR
//! - **CFG and dominance** - edges from terminators, unreachable-block
//!   pruning, dominator sets, immediate dominators and dominance frontiers
//! - **mem2reg** - promotion of scalar stack slots to SSA values with phis
//! - **Dead code elimination** - iterated removal of unused side-effect-free
//!   instructions
//! - **Inlining** - bottom-up inlining of non-recursive callees, with
//!   retirement of fully inlined functions
//! - **Textual emission** - LLVM-flavored IR text, with formatted prints
//!   lowered to `putstr`/`putint`
//! - **Reference interpreter** - executes any stage of the pipeline, for
//!   behavior-preservation checks
//!
//! ## Quick Start
//!
//! ```rust
//! use sysmir::prelude::*;
//!
//! let ctx = CompilerContext::new();
//! let mut module = Module::new();
//!
//! // int inc(int x) { return x + 1; }
//! let inc = module.define_function("inc", TypeId::I32, &[TypeId::I32])?;
//! let mut b = FunctionBuilder::new(&mut module, &ctx, inc)?;
//! let params = b.spill_arguments()?;
//! let x = b.load(params[0])?;
//! let r = b.binary(BinaryOp::Add, x, Value::int(1));
//! b.ret(Some(r));
//! b.finish()?;
//!
//! // int main() { return inc(3); }
//! let main = module.define_function("main", TypeId::I32, &[])?;
//! let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
//! let r = b.call(inc, vec![Value::int(3)]);
//! b.ret(Some(r));
//! b.finish()?;
//!
//! PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;
//!
//! assert!(module.function(inc).is_deleted());
//! assert!(emit_to_string(&module)?.contains("ret i32 4"));
//! # Ok::<(), sysmir::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`mir`] - the IR data model and the [`mir::FunctionBuilder`] used by front ends
//! - [`analysis`] - CFG construction, dominance, call graph
//! - [`compiler`] - pass interface, [`compiler::CompilerContext`], the passes
//!   and the [`compiler::PassScheduler`]
//! - [`emit`] - textual IR output
//! - [`emulation`] - the reference interpreter
//! - [`utils`] - bit sets and generic graph algorithms
//! - [`prelude`] - re-exports of the commonly used types
//!
//! ## Pipeline
//!
//! With optimization enabled the scheduler runs, in order: CFG
//! construction, inlining, dead code elimination, mem2reg, dead code
//! elimination. Without optimization only the CFG is built, which still
//! rejects unresolved pending jumps.
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result`]. The passes expect well-formed
//! IR; a broken invariant is reported as [`Error::Internal`] with the source
//! location that detected it, rather than by panicking.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

pub mod analysis;
pub mod compiler;
pub mod emit;
pub mod emulation;
pub mod mir;
pub mod prelude;
pub mod utils;

/// The error type of this crate.
pub use error::Error;

/// `Result` alias used by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;
