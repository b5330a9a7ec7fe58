use thiserror::Error;

use crate::emulation::EmulationError;

macro_rules! internal_error {
    // Format string, with or without arguments
    ($fmt:literal $(, $($arg:tt)*)?) => {
        crate::Error::Internal {
            message: format!($fmt $(, $($arg)*)?),
            file: file!(),
            line: line!(),
        }
    };

    // Any other displayable message
    ($msg:expr) => {
        crate::Error::Internal {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };
}

/// The error type for every fallible operation in this crate.
///
/// The passes assume well-formed input: a front end that produced valid IR
/// never observes an error from the pipeline. A broken IR invariant (a
/// pending jump reaching the CFG builder, a block without terminator, a phi
/// left unfilled after renaming) is reported as [`Error::Internal`] and stops
/// the pipeline immediately.
///
/// # Error Categories
///
/// ## Invariant violations
/// - [`Error::Internal`] - an IR invariant did not hold
/// - [`Error::PendingJump`] - a jump was never back-filled
/// - [`Error::Unterminated`] - a live block does not end in a terminator
///
/// ## Module construction
/// - [`Error::DuplicateDefinition`] - a global or function name was reused
/// - [`Error::UnknownFunction`] - lookup of a function by name failed
/// - [`Error::Builder`] - the IR builder was used incorrectly
///
/// ## Other
/// - [`Error::Io`] - the emitter's output sink failed
/// - [`Error::GraphError`] - a generic graph operation referenced a missing node
/// - [`Error::Emulation`] - the reference interpreter stopped abnormally
///
/// # Examples
///
/// ```rust
/// use sysmir::{Error, mir::Module};
///
/// let mut module = Module::new();
/// module.add_global_i32("counter", 0)?;
/// match module.add_global_i32("counter", 1) {
///     Err(Error::DuplicateDefinition(name)) => assert_eq!(name, "counter"),
///     other => panic!("unexpected {other:?}"),
/// }
/// # Ok::<(), sysmir::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An internal IR invariant was violated.
    ///
    /// Carries the source location where the violation was detected.
    #[error("Internal - {file}:{line}: {message}")]
    Internal {
        /// Description of the broken invariant
        message: String,
        /// The source file in which the violation was detected
        file: &'static str,
        /// The source line in which the violation was detected
        line: u32,
    },

    /// A jump created before its target existed was never resolved.
    #[error("Unresolved pending jump in block '{block}' of function '{function}'")]
    PendingJump {
        /// Function containing the jump
        function: String,
        /// Label of the block containing the jump
        block: String,
    },

    /// A live block is empty or does not end in a terminator.
    #[error("Block '{block}' of function '{function}' is not terminated")]
    Unterminated {
        /// Function containing the block
        function: String,
        /// Label of the offending block
        block: String,
    },

    /// A global or function with this name already exists in the module.
    #[error("Duplicate definition of '{0}'")]
    DuplicateDefinition(String),

    /// No function with this name exists in the module.
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// The IR builder was driven into an invalid state.
    #[error("Builder - {0}")]
    Builder(String),

    /// I/O error from the output sink.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Graph construction error.
    #[error("{0}")]
    GraphError(String),

    /// The reference interpreter stopped abnormally.
    #[error("{0}")]
    Emulation(#[from] EmulationError),
}
