//! The instruction set.
//!
//! An instruction is a tagged [`InstKind`] plus the bookkeeping the owning
//! [`Function`](crate::mir::Function) keeps in its arena (result type, parent
//! block, list links, use-list). Operand access is centralised here so every
//! pass, the emitter and the interpreter agree on which fields are uses.

use strum::{Display, EnumIter, IntoStaticStr};

use crate::mir::{BlockId, FuncId, StrId, TypeId, Value};

/// Two-operand arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    /// Integer addition
    Add,
    /// Integer subtraction
    Sub,
    /// Integer multiplication
    Mul,
    /// Signed integer division
    SDiv,
    /// Signed integer remainder
    SRem,
    /// Float addition
    FAdd,
    /// Float subtraction
    FSub,
    /// Float multiplication
    FMul,
    /// Float division
    FDiv,
    /// Float remainder
    FRem,
}

impl BinaryOp {
    /// `true` for the float operators.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem
        )
    }
}

/// Comparison condition shared by `icmp` (signed) and `fcmp` (ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CondCode {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Greater than
    Gt,
    /// Greater or equal
    Ge,
    /// Less than
    Lt,
    /// Less or equal
    Le,
}

impl CondCode {
    /// Predicate spelling for `icmp`.
    #[must_use]
    pub fn icmp_predicate(self) -> &'static str {
        match self {
            CondCode::Eq => "eq",
            CondCode::Ne => "ne",
            CondCode::Gt => "sgt",
            CondCode::Ge => "sge",
            CondCode::Lt => "slt",
            CondCode::Le => "sle",
        }
    }

    /// Predicate spelling for `fcmp`.
    #[must_use]
    pub fn fcmp_predicate(self) -> &'static str {
        match self {
            CondCode::Eq => "oeq",
            CondCode::Ne => "one",
            CondCode::Gt => "ogt",
            CondCode::Ge => "oge",
            CondCode::Lt => "olt",
            CondCode::Le => "ole",
        }
    }
}

/// Conversion operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CastOp {
    /// Signed integer to float
    SiToFp,
    /// Float to signed integer, truncating toward zero
    FpToSi,
    /// `i1` to `i32`, zero extending
    Zext,
    /// `i32` to `i1`, keeping the low bit
    Trunc,
    /// Pointer reinterpretation
    BitCast,
}

/// One incoming edge of a phi.
///
/// `value` is `None` while mem2reg has inserted the phi but not yet renamed
/// the predecessor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhiEntry {
    /// Predecessor block the value flows in from
    pub block: BlockId,
    /// Value on that edge
    pub value: Option<Value>,
}

/// The operation of an instruction together with its operands.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// Reserves a stack slot; the result is a pointer to `allocated`.
    Alloc {
        /// Type of the slot
        allocated: TypeId,
    },
    /// Reads through a pointer.
    Load {
        /// Address
        ptr: Value,
    },
    /// Writes `value` through `ptr`.
    Store {
        /// Stored value
        value: Value,
        /// Address
        ptr: Value,
    },
    /// Address arithmetic: the first offset steps over whole pointees, every
    /// further offset indexes one array dimension.
    GetElementPtr {
        /// Base address
        base: Value,
        /// Index operands
        offsets: Vec<Value>,
    },
    /// Arithmetic.
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Value,
        /// Right operand
        rhs: Value,
    },
    /// Signed integer comparison.
    Icmp {
        /// Condition
        cond: CondCode,
        /// Left operand
        lhs: Value,
        /// Right operand
        rhs: Value,
    },
    /// Ordered float comparison.
    Fcmp {
        /// Condition
        cond: CondCode,
        /// Left operand
        lhs: Value,
        /// Right operand
        rhs: Value,
    },
    /// Conversion to the instruction's result type.
    Cast {
        /// Conversion
        op: CastOp,
        /// Converted value
        value: Value,
    },
    /// Direct call.
    ///
    /// A call carrying `format` is a formatted print: the arguments are the
    /// values substituted for the `%d` directives of the pooled string.
    Call {
        /// Called function
        callee: FuncId,
        /// Actual arguments
        args: Vec<Value>,
        /// Format string of a formatted print
        format: Option<StrId>,
    },
    /// Two-way conditional branch.
    Branch {
        /// `i1` condition
        cond: Value,
        /// Target when the condition is true
        then_target: BlockId,
        /// Target when the condition is false
        else_target: BlockId,
    },
    /// Unconditional branch. `None` marks a pending jump whose target is not
    /// known yet.
    Jump {
        /// Target block
        target: Option<BlockId>,
    },
    /// Function return.
    Return {
        /// Returned value, `None` for `void`
        value: Option<Value>,
    },
    /// SSA merge of one value per predecessor.
    Phi {
        /// Incoming edges
        incoming: Vec<PhiEntry>,
    },
}

impl InstKind {
    /// Returns the operands read by this instruction, in order.
    ///
    /// Unfilled phi entries are skipped.
    #[must_use]
    pub fn operands(&self) -> Vec<Value> {
        let mut ops = Vec::new();
        self.visit_operands(|v| ops.push(v));
        ops
    }

    /// Calls `f` on every operand.
    pub fn visit_operands(&self, mut f: impl FnMut(Value)) {
        match self {
            InstKind::Alloc { .. } | InstKind::Jump { .. } => {}
            InstKind::Load { ptr } => f(*ptr),
            InstKind::Store { value, ptr } => {
                f(*value);
                f(*ptr);
            }
            InstKind::GetElementPtr { base, offsets } => {
                f(*base);
                offsets.iter().for_each(|o| f(*o));
            }
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::Icmp { lhs, rhs, .. }
            | InstKind::Fcmp { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            InstKind::Cast { value, .. } => f(*value),
            InstKind::Call { args, .. } => args.iter().for_each(|a| f(*a)),
            InstKind::Branch { cond, .. } => f(*cond),
            InstKind::Return { value } => {
                if let Some(v) = value {
                    f(*v);
                }
            }
            InstKind::Phi { incoming } => {
                for entry in incoming {
                    if let Some(v) = entry.value {
                        f(v);
                    }
                }
            }
        }
    }

    /// Calls `f` on a mutable reference to every operand.
    pub fn visit_operands_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        match self {
            InstKind::Alloc { .. } | InstKind::Jump { .. } => {}
            InstKind::Load { ptr } => f(ptr),
            InstKind::Store { value, ptr } => {
                f(value);
                f(ptr);
            }
            InstKind::GetElementPtr { base, offsets } => {
                f(base);
                offsets.iter_mut().for_each(f);
            }
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::Icmp { lhs, rhs, .. }
            | InstKind::Fcmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            InstKind::Cast { value, .. } => f(value),
            InstKind::Call { args, .. } => args.iter_mut().for_each(f),
            InstKind::Branch { cond, .. } => f(cond),
            InstKind::Return { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
            InstKind::Phi { incoming } => {
                for entry in incoming {
                    if let Some(v) = entry.value.as_mut() {
                        f(v);
                    }
                }
            }
        }
    }

    /// Returns the control-flow targets of a terminator. Pending jumps have
    /// none.
    #[must_use]
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            InstKind::Branch {
                then_target,
                else_target,
                ..
            } => vec![*then_target, *else_target],
            InstKind::Jump {
                target: Some(target),
            } => vec![*target],
            _ => Vec::new(),
        }
    }

    /// Calls `f` on a mutable reference to every block this instruction
    /// names: terminator targets and phi predecessors.
    pub fn visit_blocks_mut(&mut self, mut f: impl FnMut(&mut BlockId)) {
        match self {
            InstKind::Branch {
                then_target,
                else_target,
                ..
            } => {
                f(then_target);
                f(else_target);
            }
            InstKind::Jump {
                target: Some(target),
            } => f(target),
            InstKind::Phi { incoming } => incoming.iter_mut().for_each(|e| f(&mut e.block)),
            _ => {}
        }
    }

    /// `true` for `Branch`, `Jump` and `Return`.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Branch { .. } | InstKind::Jump { .. } | InstKind::Return { .. }
        )
    }

    /// `true` for phis.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi { .. })
    }

    /// `true` for a jump whose target has not been resolved.
    #[must_use]
    pub fn is_pending_jump(&self) -> bool {
        matches!(self, InstKind::Jump { target: None })
    }

    /// Instructions that must survive dead-code elimination even when their
    /// result is unused.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        matches!(self, InstKind::Call { .. } | InstKind::Store { .. }) || self.is_terminator()
    }

    /// Operation mnemonic in IR syntax.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstKind::Alloc { .. } => "alloca",
            InstKind::Load { .. } => "load",
            InstKind::Store { .. } => "store",
            InstKind::GetElementPtr { .. } => "getelementptr",
            InstKind::Binary { op, .. } => (*op).into(),
            InstKind::Icmp { .. } => "icmp",
            InstKind::Fcmp { .. } => "fcmp",
            InstKind::Cast { op, .. } => (*op).into(),
            InstKind::Call { .. } => "call",
            InstKind::Branch { .. } | InstKind::Jump { .. } => "br",
            InstKind::Return { .. } => "ret",
            InstKind::Phi { .. } => "phi",
        }
    }
}
