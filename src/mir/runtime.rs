//! The runtime library surface.
//!
//! Programs do I/O and timing through a fixed set of externally linked
//! functions. They are declared into a module lazily, the first time the
//! front end calls one, through
//! [`CompilerContext::runtime_function`](crate::compiler::CompilerContext::runtime_function).

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::mir::{TypeId, TypeTable};

/// A function provided by the runtime library.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum RuntimeFunction {
    /// `i32 getint()`
    GetInt,
    /// `i32 getch()`
    GetCh,
    /// `float getfloat()`
    GetFloat,
    /// `i32 getarray(i32*)`, returns the element count read
    GetArray,
    /// `i32 getfarray(float*)`, returns the element count read
    GetFArray,
    /// `void putint(i32)`
    PutInt,
    /// `void putch(i32)`
    PutCh,
    /// `void putfloat(float)`
    PutFloat,
    /// `void putarray(i32, i32*)`
    PutArray,
    /// `void putfarray(i32, float*)`
    PutFArray,
    /// `void putstr(i8*)`
    PutStr,
    /// `void starttime()`
    StartTime,
    /// `void stoptime()`
    StopTime,
    /// `void memset(i32*, i32, i32)`, zero-fills local arrays
    MemSet,
    /// Formatted print; calls carry a pooled format string and the values
    /// for its `%d` directives. Lowered to `putstr`/`putint` on emission.
    Printf,
}

impl RuntimeFunction {
    /// Symbol name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Looks a runtime function up by symbol name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Return and parameter types, interning any pointer types needed.
    pub fn signature(self, types: &mut TypeTable) -> (TypeId, Vec<TypeId>) {
        let i32_ptr = types.pointer_to(TypeId::I32);
        let f32_ptr = types.pointer_to(TypeId::F32);
        let i8_ptr = types.pointer_to(TypeId::I8);
        match self {
            Self::GetInt | Self::GetCh => (TypeId::I32, vec![]),
            Self::GetFloat => (TypeId::F32, vec![]),
            Self::GetArray => (TypeId::I32, vec![i32_ptr]),
            Self::GetFArray => (TypeId::I32, vec![f32_ptr]),
            Self::PutInt | Self::PutCh => (TypeId::VOID, vec![TypeId::I32]),
            Self::PutFloat => (TypeId::VOID, vec![TypeId::F32]),
            Self::PutArray => (TypeId::VOID, vec![TypeId::I32, i32_ptr]),
            Self::PutFArray => (TypeId::VOID, vec![TypeId::I32, f32_ptr]),
            Self::PutStr => (TypeId::VOID, vec![i8_ptr]),
            Self::StartTime | Self::StopTime | Self::Printf => (TypeId::VOID, vec![]),
            Self::MemSet => (TypeId::VOID, vec![i32_ptr, TypeId::I32, TypeId::I32]),
        }
    }
}
