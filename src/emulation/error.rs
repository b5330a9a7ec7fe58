//! Emulation error types.

use std::fmt;

/// Errors that stop the reference interpreter.
///
/// These describe the executed program, not the IR: a division by zero or an
/// exhausted input stream is a property of the program and its input, while
/// malformed IR is reported as [`EmulationError::Malformed`].
#[derive(Debug, Clone, PartialEq)]
pub enum EmulationError {
    /// The configured instruction budget was used up.
    StepLimitExceeded {
        /// Configured limit.
        limit: usize,
    },
    /// Calls nested deeper than the configured limit.
    CallDepthExceeded {
        /// Configured limit.
        limit: usize,
    },
    /// Allocating would exceed the configured memory size.
    MemoryLimitExceeded {
        /// Cells in use.
        current: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Access outside the allocated cells.
    InvalidAddress {
        /// The offending cell address.
        address: usize,
    },
    /// Access through a null pointer.
    NullPointer,
    /// Integer division or remainder by zero.
    DivisionByZero {
        /// Function executing the division.
        function: String,
    },
    /// A runtime input function ran out of input.
    InputExhausted {
        /// The runtime function that tried to read.
        function: &'static str,
    },
    /// An operation received a value of the wrong kind.
    TypeMismatch {
        /// Operation being performed.
        operation: &'static str,
        /// Description of the value found.
        found: String,
    },
    /// A call passed the wrong number of arguments.
    ArgumentCount {
        /// Called function.
        function: String,
        /// Declared parameter count.
        expected: usize,
        /// Actual argument count.
        found: usize,
    },
    /// The called function has no body to execute: an unknown external or a
    /// function retired by a pass.
    NoBody {
        /// Called function.
        function: String,
    },
    /// The IR cannot be executed (pending jump, unfilled phi, use of a value
    /// that was never computed).
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

impl fmt::Display for EmulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulationError::StepLimitExceeded { limit } => {
                write!(f, "instruction limit of {limit} steps exceeded")
            }
            EmulationError::CallDepthExceeded { limit } => {
                write!(f, "call depth limit of {limit} exceeded")
            }
            EmulationError::MemoryLimitExceeded { current, limit } => {
                write!(f, "memory limit exceeded ({current} of {limit} cells in use)")
            }
            EmulationError::InvalidAddress { address } => {
                write!(f, "access to unallocated cell {address}")
            }
            EmulationError::NullPointer => write!(f, "null pointer access"),
            EmulationError::DivisionByZero { function } => {
                write!(f, "integer division by zero in {function}")
            }
            EmulationError::InputExhausted { function } => {
                write!(f, "{function} reached the end of the input")
            }
            EmulationError::TypeMismatch { operation, found } => {
                write!(f, "type mismatch in {operation}: found {found}")
            }
            EmulationError::ArgumentCount {
                function,
                expected,
                found,
            } => write!(
                f,
                "{function} expects {expected} arguments, {found} were passed"
            ),
            EmulationError::NoBody { function } => {
                write!(f, "function {function} has no executable body")
            }
            EmulationError::Malformed { message } => write!(f, "malformed IR: {message}"),
        }
    }
}

impl std::error::Error for EmulationError {}

impl EmulationError {
    /// Checks if this error was caused by a configured resource limit rather
    /// than by the program itself.
    #[must_use]
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            EmulationError::StepLimitExceeded { .. }
                | EmulationError::CallDepthExceeded { .. }
                | EmulationError::MemoryLimitExceeded { .. }
        )
    }
}
