//! Runtime values of the interpreter.

use std::fmt;

use crate::{emulation::EmulationError, mir::Constant};

/// A value held in a register or a memory cell.
///
/// Memory is addressed in cells: every scalar, whatever its IR type,
/// occupies exactly one cell, and a pointer is the index of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmValue {
    /// `i32` (and `i8`) value.
    Int(i32),
    /// `float` value.
    Float(f32),
    /// `i1` value.
    Bool(bool),
    /// Address of a memory cell.
    Ptr(usize),
    /// Null pointer.
    Null,
    /// The result of a `void` call.
    Void,
}

impl EmValue {
    /// Short kind name for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            EmValue::Int(_) => "i32",
            EmValue::Float(_) => "float",
            EmValue::Bool(_) => "i1",
            EmValue::Ptr(_) => "pointer",
            EmValue::Null => "null",
            EmValue::Void => "void",
        }
    }

    /// Integer view of `i32` and `i1` values.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::TypeMismatch`] for any other kind.
    pub fn as_int(&self, operation: &'static str) -> Result<i32, EmulationError> {
        match self {
            EmValue::Int(v) => Ok(*v),
            EmValue::Bool(v) => Ok(i32::from(*v)),
            other => Err(other.mismatch(operation)),
        }
    }

    /// Float view.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::TypeMismatch`] for non-float values.
    pub fn as_float(&self, operation: &'static str) -> Result<f32, EmulationError> {
        match self {
            EmValue::Float(v) => Ok(*v),
            other => Err(other.mismatch(operation)),
        }
    }

    /// Truth value of an `i1` (or `i32`) condition.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::TypeMismatch`] for non-integer values.
    pub fn as_bool(&self, operation: &'static str) -> Result<bool, EmulationError> {
        self.as_int(operation).map(|v| v != 0)
    }

    /// Cell address of a pointer.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::NullPointer`] for null and
    /// [`EmulationError::TypeMismatch`] for non-pointers.
    pub fn as_ptr(&self, operation: &'static str) -> Result<usize, EmulationError> {
        match self {
            EmValue::Ptr(addr) => Ok(*addr),
            EmValue::Null => Err(EmulationError::NullPointer),
            other => Err(other.mismatch(operation)),
        }
    }

    /// The literal with the same value, for values that have one.
    #[must_use]
    pub fn to_constant(&self) -> Option<Constant> {
        match *self {
            EmValue::Int(v) => Some(Constant::Int(v)),
            EmValue::Float(v) => Some(Constant::Float(v)),
            EmValue::Bool(v) => Some(Constant::Bool(v)),
            EmValue::Ptr(_) | EmValue::Null | EmValue::Void => None,
        }
    }

    fn mismatch(&self, operation: &'static str) -> EmulationError {
        EmulationError::TypeMismatch {
            operation,
            found: self.kind().to_string(),
        }
    }
}

impl From<Constant> for EmValue {
    fn from(c: Constant) -> Self {
        match c {
            Constant::Int(v) => EmValue::Int(v),
            Constant::Float(v) => EmValue::Float(v),
            Constant::Bool(v) => EmValue::Bool(v),
            Constant::Null(_) => EmValue::Null,
        }
    }
}

impl fmt::Display for EmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmValue::Int(v) => write!(f, "{v}"),
            EmValue::Float(v) => write!(f, "{v}"),
            EmValue::Bool(v) => write!(f, "{}", i32::from(*v)),
            EmValue::Ptr(addr) => write!(f, "&{addr}"),
            EmValue::Null => f.write_str("null"),
            EmValue::Void => f.write_str("void"),
        }
    }
}
