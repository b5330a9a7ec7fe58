//! The IR type system.
//!
//! Types form a closed set: `void`, `label`, the scalars `i1`, `i8`, `i32`
//! and `float`, pointers, fixed-length arrays and function signatures. Every
//! structural type is interned once per module in a [`TypeTable`] and referred
//! to by a copyable [`TypeId`], so type equality is handle equality.

use std::{collections::HashMap, fmt};

/// Handle of an interned [`Type`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TypeId(u32);

impl TypeId {
    /// `void`
    pub const VOID: TypeId = TypeId(0);
    /// `label`, the type of basic blocks
    pub const LABEL: TypeId = TypeId(1);
    /// `i1`, the result of comparisons
    pub const I1: TypeId = TypeId(2);
    /// `i8`, the element type of string constants
    pub const I8: TypeId = TypeId(3);
    /// `i32`
    pub const I32: TypeId = TypeId(4);
    /// `float` (IEEE single precision)
    pub const F32: TypeId = TypeId(5);

    /// Returns the raw table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A structural IR type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type {
    /// No value.
    Void,
    /// Basic block label.
    Label,
    /// Boolean.
    I1,
    /// Byte.
    I8,
    /// 32-bit signed integer.
    I32,
    /// 32-bit float.
    F32,
    /// Pointer to the given type.
    Pointer(TypeId),
    /// `len` consecutive elements.
    Array {
        /// Number of elements
        len: u32,
        /// Element type
        elem: TypeId,
    },
    /// Function signature.
    Function {
        /// Return type
        ret: TypeId,
        /// Parameter types in order
        params: Vec<TypeId>,
    },
}

/// Interning table for [`Type`]s.
///
/// A fresh table already holds the six primitive types at the fixed ids
/// exposed as constants on [`TypeId`].
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<Type>,
    index: HashMap<Type, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Creates a table pre-populated with the primitive types.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            index: HashMap::new(),
        };
        for ty in [Type::Void, Type::Label, Type::I1, Type::I8, Type::I32, Type::F32] {
            table.intern(ty);
        }
        table
    }

    /// Interns `ty`, returning the existing handle if an equal type is known.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.index.get(&ty) {
            return id;
        }
        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.types.push(ty.clone());
        self.index.insert(ty, id);
        id
    }

    /// Interns `T*` for `pointee = T`.
    pub fn pointer_to(&mut self, pointee: TypeId) -> TypeId {
        self.intern(Type::Pointer(pointee))
    }

    /// Interns `[len x elem]`.
    pub fn array_of(&mut self, elem: TypeId, len: u32) -> TypeId {
        self.intern(Type::Array { len, elem })
    }

    /// Interns a nested array type with the given dimensions, outermost first.
    ///
    /// `array_dims(I32, &[2, 3])` is `[2 x [3 x i32]]`.
    pub fn array_dims(&mut self, elem: TypeId, dims: &[u32]) -> TypeId {
        dims.iter()
            .rev()
            .fold(elem, |inner, &len| self.array_of(inner, len))
    }

    /// Interns the function signature `ret (params...)`.
    pub fn function(&mut self, ret: TypeId, params: Vec<TypeId>) -> TypeId {
        self.intern(Type::Function { ret, params })
    }

    /// Returns the structure behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was produced by a different table.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    /// Returns `T` if `id` is `T*`.
    #[must_use]
    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Pointer(inner) => Some(*inner),
            _ => None,
        }
    }

    /// Returns `(len, elem)` if `id` is an array.
    #[must_use]
    pub fn array_parts(&self, id: TypeId) -> Option<(u32, TypeId)> {
        match self.get(id) {
            Type::Array { len, elem } => Some((*len, *elem)),
            _ => None,
        }
    }

    /// Returns the return type if `id` is a function signature.
    #[must_use]
    pub fn return_type(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Function { ret, .. } => Some(*ret),
            _ => None,
        }
    }

    /// `true` for `i1`, `i8` and `i32`.
    #[must_use]
    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(id, TypeId::I1 | TypeId::I8 | TypeId::I32)
    }

    /// `true` for `float`.
    #[must_use]
    pub fn is_float(&self, id: TypeId) -> bool {
        id == TypeId::F32
    }

    /// `true` for pointer types.
    #[must_use]
    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Pointer(_))
    }

    /// `true` for array types.
    #[must_use]
    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Array { .. })
    }

    /// Number of scalar cells an object of this type occupies.
    ///
    /// Arrays multiply out; every other type counts as one cell.
    #[must_use]
    pub fn cell_count(&self, id: TypeId) -> usize {
        match self.get(id) {
            Type::Array { len, elem } => *len as usize * self.cell_count(*elem),
            _ => 1,
        }
    }

    /// Strips every array dimension, returning the innermost element type.
    #[must_use]
    pub fn scalar_of(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Array { elem, .. } => self.scalar_of(*elem),
            _ => id,
        }
    }

    /// Returns a [`Display`](fmt::Display) adapter printing `id` in IR syntax.
    #[must_use]
    pub fn display(&self, id: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { table: self, id }
    }

    /// Number of interned types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always `false`; the primitives are interned on creation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Formats a type in IR syntax. Created by [`TypeTable::display`].
pub struct TypeDisplay<'a> {
    table: &'a TypeTable,
    id: TypeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nested = |id| self.table.display(id);
        match self.table.get(self.id) {
            Type::Void => f.write_str("void"),
            Type::Label => f.write_str("label"),
            Type::I1 => f.write_str("i1"),
            Type::I8 => f.write_str("i8"),
            Type::I32 => f.write_str("i32"),
            Type::F32 => f.write_str("float"),
            Type::Pointer(inner) => write!(f, "{}*", nested(*inner)),
            Type::Array { len, elem } => write!(f, "[{len} x {}]", nested(*elem)),
            Type::Function { ret, params } => {
                write!(f, "{} (", nested(*ret))?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", nested(*param))?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_have_fixed_ids() {
        let table = TypeTable::new();
        assert_eq!(table.get(TypeId::I32), &Type::I32);
        assert_eq!(table.get(TypeId::F32), &Type::F32);
        assert_eq!(table.display(TypeId::F32).to_string(), "float");
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_interning_is_structural() {
        let mut table = TypeTable::new();
        let p1 = table.pointer_to(TypeId::I32);
        let p2 = table.intern(Type::Pointer(TypeId::I32));
        assert_eq!(p1, p2);
        assert_ne!(p1, table.pointer_to(TypeId::F32));
        assert_eq!(table.pointee(p1), Some(TypeId::I32));
        assert_eq!(table.pointee(TypeId::I32), None);
    }

    #[test]
    fn test_nested_array_display_and_cells() {
        let mut table = TypeTable::new();
        let matrix = table.array_dims(TypeId::I32, &[2, 3]);
        assert_eq!(table.display(matrix).to_string(), "[2 x [3 x i32]]");
        assert_eq!(table.cell_count(matrix), 6);
        assert_eq!(table.scalar_of(matrix), TypeId::I32);
        assert!(table.is_array(matrix));

        let ptr = table.pointer_to(matrix);
        assert_eq!(table.display(ptr).to_string(), "[2 x [3 x i32]]*");
    }

    #[test]
    fn test_function_signature_display() {
        let mut table = TypeTable::new();
        let ptr = table.pointer_to(TypeId::I32);
        let sig = table.function(TypeId::VOID, vec![TypeId::I32, ptr]);
        assert_eq!(table.display(sig).to_string(), "void (i32, i32*)");
        assert_eq!(table.return_type(sig), Some(TypeId::VOID));
    }
}
