//! Value handles and operand representation.
//!
//! Every entity an instruction can reference is addressed by a small copyable
//! handle into an arena owned by its container: instructions and blocks by
//! their [`Function`](crate::mir::Function), functions, globals and strings by
//! the [`Module`](crate::mir::Module). An instruction operand is a [`Value`].

use std::fmt;

use crate::mir::Constant;

entity_id!(InstId, "%v", "Handle of an instruction within its function.");
entity_id!(BlockId, "bb", "Handle of a basic block within its function.");
entity_id!(FuncId, "fn", "Handle of a function within its module.");
entity_id!(GlobalId, "@g", "Handle of a global variable within its module.");
entity_id!(StrId, "str", "Handle of a string literal in the module's pool.");

/// An instruction operand.
///
/// Constants are stored inline and have no identity; the other variants are
/// handles. Use-lists are maintained for [`Value::Inst`] and [`Value::Arg`],
/// the values passes can retarget with replace-all-uses-with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Result of an instruction in the same function.
    Inst(InstId),
    /// Formal argument of the enclosing function, by position.
    Arg(u32),
    /// Literal.
    Const(Constant),
    /// Address of a global variable.
    Global(GlobalId),
}

impl Value {
    /// Returns the instruction handle if this is an instruction result.
    #[must_use]
    pub fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the literal if this is a constant.
    #[must_use]
    pub fn as_const(self) -> Option<Constant> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }

    /// `true` for constants.
    #[must_use]
    pub fn is_const(self) -> bool {
        matches!(self, Value::Const(_))
    }

    /// Shorthand for an `i32` literal.
    #[must_use]
    pub fn int(v: i32) -> Self {
        Value::Const(Constant::Int(v))
    }

    /// Shorthand for a `float` literal.
    #[must_use]
    pub fn float(v: f32) -> Self {
        Value::Const(Constant::Float(v))
    }

    /// Shorthand for an `i1` literal.
    #[must_use]
    pub fn bool(v: bool) -> Self {
        Value::Const(Constant::Bool(v))
    }
}

impl From<Constant> for Value {
    fn from(c: Constant) -> Self {
        Value::Const(c)
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Inst(id) => write!(f, "{id}"),
            Value::Arg(idx) => write!(f, "%a{idx}"),
            Value::Const(c) => write!(f, "{c}"),
            Value::Global(id) => write!(f, "{id}"),
        }
    }
}
