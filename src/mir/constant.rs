//! Literal values and construction-time folding.
//!
//! Arithmetic, comparison and casts whose operands are all constants never
//! become instructions: the builder asks the `fold_*` functions first and only
//! emits an instruction when they decline. Integer arithmetic wraps at 32
//! bits. Integer division or remainder by zero is left unfolded so the fault
//! stays observable at run time.

use std::{cmp::Ordering, fmt};

use crate::mir::{BinaryOp, CastOp, CondCode, Type, TypeId, TypeTable};

/// An immutable literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    /// `i32` literal.
    Int(i32),
    /// `float` literal.
    Float(f32),
    /// `i1` literal.
    Bool(bool),
    /// Null pointer of the given pointer type.
    Null(TypeId),
}

impl Constant {
    /// Type of the literal.
    #[must_use]
    pub fn ty(self) -> TypeId {
        match self {
            Constant::Int(_) => TypeId::I32,
            Constant::Float(_) => TypeId::F32,
            Constant::Bool(_) => TypeId::I1,
            Constant::Null(ty) => ty,
        }
    }

    /// The zero value of `ty`: `0`, `0.0`, `false`, or a typed null.
    ///
    /// Used for reads of a promoted slot that no store reaches. Returns
    /// `None` for types without a scalar zero (void, label, arrays,
    /// functions).
    #[must_use]
    pub fn zero(types: &TypeTable, ty: TypeId) -> Option<Self> {
        match types.get(ty) {
            Type::I32 | Type::I8 => Some(Constant::Int(0)),
            Type::F32 => Some(Constant::Float(0.0)),
            Type::I1 => Some(Constant::Bool(false)),
            Type::Pointer(_) => Some(Constant::Null(ty)),
            _ => None,
        }
    }

    /// Returns `true` if this is the zero of its type.
    #[must_use]
    pub fn is_zero(self) -> bool {
        match self {
            Constant::Int(v) => v == 0,
            Constant::Float(v) => v == 0.0,
            Constant::Bool(v) => !v,
            Constant::Null(_) => true,
        }
    }

    /// Integer view of `i32` and `i1` literals.
    #[must_use]
    pub fn as_int(self) -> Option<i32> {
        match self {
            Constant::Int(v) => Some(v),
            Constant::Bool(v) => Some(i32::from(v)),
            _ => None,
        }
    }

    /// Float view of `float` literals.
    #[must_use]
    pub fn as_float(self) -> Option<f32> {
        match self {
            Constant::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            // Float literals are printed as the bits of the widened double
            Constant::Float(v) => write!(f, "0x{:016X}", f64::from(*v).to_bits()),
            Constant::Bool(v) => write!(f, "{v}"),
            Constant::Null(_) => f.write_str("null"),
        }
    }
}

/// Folds `lhs op rhs`. Returns `None` if the operands are not both literals
/// of the operator's domain, or for integer division by zero.
#[must_use]
pub fn fold_binary(op: BinaryOp, lhs: Constant, rhs: Constant) -> Option<Constant> {
    if op.is_float() {
        let (a, b) = (lhs.as_float()?, rhs.as_float()?);
        let result = match op {
            BinaryOp::FAdd => a + b,
            BinaryOp::FSub => a - b,
            BinaryOp::FMul => a * b,
            BinaryOp::FDiv => a / b,
            BinaryOp::FRem => a % b,
            _ => return None,
        };
        return Some(Constant::Float(result));
    }

    let (a, b) = (lhs.as_int()?, rhs.as_int()?);
    let result = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::SDiv if b != 0 => a.wrapping_div(b),
        BinaryOp::SRem if b != 0 => a.wrapping_rem(b),
        _ => return None,
    };
    Some(Constant::Int(result))
}

/// Folds an integer comparison to an `i1` literal.
#[must_use]
pub fn fold_icmp(cond: CondCode, lhs: Constant, rhs: Constant) -> Option<Constant> {
    let (a, b) = (lhs.as_int()?, rhs.as_int()?);
    Some(Constant::Bool(cond.evaluate(a.partial_cmp(&b))))
}

/// Folds an ordered float comparison to an `i1` literal. Any comparison
/// involving NaN is false.
#[must_use]
pub fn fold_fcmp(cond: CondCode, lhs: Constant, rhs: Constant) -> Option<Constant> {
    let (a, b) = (lhs.as_float()?, rhs.as_float()?);
    Some(Constant::Bool(cond.evaluate(a.partial_cmp(&b))))
}

/// Folds a cast of a literal to type `to`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn fold_cast(op: CastOp, value: Constant, to: TypeId) -> Option<Constant> {
    match (op, value) {
        (CastOp::SiToFp, Constant::Int(v)) => Some(Constant::Float(v as f32)),
        (CastOp::SiToFp, Constant::Bool(v)) => Some(Constant::Float(f32::from(u8::from(v)))),
        // `as` truncates toward zero and saturates out-of-range values
        (CastOp::FpToSi, Constant::Float(v)) => Some(Constant::Int(v as i32)),
        (CastOp::Zext, Constant::Bool(v)) => Some(Constant::Int(i32::from(v))),
        (CastOp::Zext, Constant::Int(v)) => Some(Constant::Int(v)),
        (CastOp::Trunc, Constant::Int(v)) => Some(Constant::Bool(v & 1 != 0)),
        (CastOp::BitCast, Constant::Null(_)) => Some(Constant::Null(to)),
        _ => None,
    }
}

impl CondCode {
    /// Evaluates the condition against an ordering; an unordered comparison
    /// (`None`) is false for every condition.
    #[must_use]
    pub fn evaluate(self, ordering: Option<Ordering>) -> bool {
        let Some(ord) = ordering else {
            return false;
        };
        match self {
            CondCode::Eq => ord == Ordering::Equal,
            CondCode::Ne => ord != Ordering::Equal,
            CondCode::Gt => ord == Ordering::Greater,
            CondCode::Ge => ord != Ordering::Less,
            CondCode::Lt => ord == Ordering::Less,
            CondCode::Le => ord != Ordering::Greater,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_folding_wraps() {
        assert_eq!(
            fold_binary(BinaryOp::Add, Constant::Int(i32::MAX), Constant::Int(1)),
            Some(Constant::Int(i32::MIN))
        );
        assert_eq!(
            fold_binary(BinaryOp::SDiv, Constant::Int(-7), Constant::Int(2)),
            Some(Constant::Int(-3))
        );
        assert_eq!(
            fold_binary(BinaryOp::SRem, Constant::Int(-7), Constant::Int(2)),
            Some(Constant::Int(-1))
        );
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        assert_eq!(
            fold_binary(BinaryOp::SDiv, Constant::Int(1), Constant::Int(0)),
            None
        );
        assert_eq!(
            fold_binary(BinaryOp::SRem, Constant::Int(1), Constant::Int(0)),
            None
        );
    }

    #[test]
    fn test_float_folding() {
        assert_eq!(
            fold_binary(BinaryOp::FRem, Constant::Float(7.5), Constant::Float(2.0)),
            Some(Constant::Float(1.5))
        );
        // Mixed domains decline
        assert_eq!(
            fold_binary(BinaryOp::FAdd, Constant::Int(1), Constant::Float(2.0)),
            None
        );
    }

    #[test]
    fn test_comparison_folding() {
        assert_eq!(
            fold_icmp(CondCode::Le, Constant::Int(3), Constant::Int(3)),
            Some(Constant::Bool(true))
        );
        assert_eq!(
            fold_fcmp(CondCode::Ne, Constant::Float(f32::NAN), Constant::Float(1.0)),
            Some(Constant::Bool(false))
        );
        assert_eq!(
            fold_icmp(CondCode::Gt, Constant::Bool(true), Constant::Int(0)),
            Some(Constant::Bool(true))
        );
    }

    #[test]
    fn test_cast_folding() {
        assert_eq!(
            fold_cast(CastOp::FpToSi, Constant::Float(-2.9), TypeId::I32),
            Some(Constant::Int(-2))
        );
        assert_eq!(
            fold_cast(CastOp::Zext, Constant::Bool(true), TypeId::I32),
            Some(Constant::Int(1))
        );
        assert_eq!(
            fold_cast(CastOp::Trunc, Constant::Int(6), TypeId::I1),
            Some(Constant::Bool(false))
        );
        assert_eq!(
            fold_cast(CastOp::SiToFp, Constant::Int(3), TypeId::F32),
            Some(Constant::Float(3.0))
        );
    }

    #[test]
    fn test_zero_and_display() {
        let mut types = TypeTable::new();
        let ptr = types.pointer_to(TypeId::I32);
        assert_eq!(Constant::zero(&types, TypeId::F32), Some(Constant::Float(0.0)));
        assert_eq!(Constant::zero(&types, ptr), Some(Constant::Null(ptr)));
        assert_eq!(Constant::zero(&types, TypeId::VOID), None);

        assert_eq!(Constant::Float(1.0).to_string(), "0x3FF0000000000000");
        assert_eq!(Constant::Int(-4).to_string(), "-4");
        assert_eq!(Constant::Bool(true).to_string(), "true");
    }
}
