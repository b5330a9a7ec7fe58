//! Reference interpreter for the IR.
//!
//! The interpreter executes a [`Module`](crate::mir::Module) directly, in any
//! stage of the pipeline: the load/store form the front end produces, SSA
//! form with phis after mem2reg, and the result of inlining. Running the same
//! program before and after the passes and comparing return values and
//! printed output is how the pass tests check that behavior is preserved.
//!
//! # Key Components
//!
//! - [`Interpreter`] - executes functions, with scripted input and captured output
//! - [`EmulationLimits`] - instruction, call depth and memory bounds
//! - [`EmValue`] - values held in registers and memory cells
//! - [`Memory`] - cell-addressed storage for globals and allocas
//! - [`EmulationError`] - everything that stops a run
//!
//! # Memory Model
//!
//! Memory is a flat array of 32-bit cells. Each scalar occupies one cell, an
//! array occupies one cell per element, and pointers are cell indices.
//! `memset` counts bytes and clears `bytes / 4` cells.
//!
//! # Runtime Library
//!
//! Calls to declared runtime functions are served by the interpreter:
//! `getint`/`getch`/`getfloat`/`getarray`/`getfarray` read from the input
//! text, the `put*` family appends to the output buffer (`putarray` prints
//! `n: a0 a1 ...` followed by a newline), and a formatted print substitutes its
//! arguments for the `%d` directives. `starttime` and `stoptime` do nothing.

mod error;
mod interpreter;
mod memory;
mod value;

pub use error::EmulationError;
pub use interpreter::{EmulationLimits, Interpreter};
pub use memory::Memory;
pub use value::EmValue;
