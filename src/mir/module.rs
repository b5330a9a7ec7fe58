//! Modules: globals, the string pool and functions.

use std::collections::HashMap;

use crate::{
    mir::{Constant, FuncId, Function, GlobalId, RuntimeFunction, StrId, TypeId, TypeTable, Value},
    Error, Result,
};

/// Initial value of a global variable.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    /// Scalar initializer.
    Scalar(Constant),
    /// Array initializer, flattened in row-major order. Missing trailing
    /// elements are zero.
    Array(Vec<Constant>),
    /// All-zero initializer.
    Zero,
}

/// A global variable.
#[derive(Debug, Clone)]
pub struct Global {
    pub(crate) name: String,
    pub(crate) ty: TypeId,
    pub(crate) ptr_ty: TypeId,
    pub(crate) init: GlobalInit,
}

impl Global {
    /// Symbol name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the stored object.
    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Type of the global as a value: a pointer to [`Global::ty`].
    #[must_use]
    pub fn ptr_ty(&self) -> TypeId {
        self.ptr_ty
    }

    /// Initializer.
    #[must_use]
    pub fn init(&self) -> &GlobalInit {
        &self.init
    }
}

/// A translation unit.
#[derive(Debug, Clone, Default)]
pub struct Module {
    types: TypeTable,
    globals: Vec<Global>,
    global_index: HashMap<String, GlobalId>,
    strings: Vec<String>,
    functions: Vec<Function>,
    function_index: HashMap<String, FuncId>,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Type table.
    #[must_use]
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Mutable type table, for interning.
    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    // ── Globals ─────────────────────────────────────────────────────────

    /// Adds a global variable of type `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if the name is taken.
    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        ty: TypeId,
        init: GlobalInit,
    ) -> Result<GlobalId> {
        let name = name.into();
        if self.global_index.contains_key(&name) {
            return Err(Error::DuplicateDefinition(name));
        }
        let id = GlobalId::new(self.globals.len());
        let ptr_ty = self.types.pointer_to(ty);
        self.global_index.insert(name.clone(), id);
        self.globals.push(Global {
            name,
            ty,
            ptr_ty,
            init,
        });
        Ok(id)
    }

    /// Adds an `i32` global with a scalar initializer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if the name is taken.
    pub fn add_global_i32(&mut self, name: impl Into<String>, value: i32) -> Result<GlobalId> {
        self.add_global(name, TypeId::I32, GlobalInit::Scalar(Constant::Int(value)))
    }

    /// Global record.
    #[must_use]
    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    /// Iterates globals in definition order.
    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> + '_ {
        self.globals
            .iter()
            .enumerate()
            .map(|(i, g)| (GlobalId::new(i), g))
    }

    /// Looks a global up by name.
    #[must_use]
    pub fn find_global(&self, name: &str) -> Option<GlobalId> {
        self.global_index.get(name).copied()
    }

    // ── Strings ─────────────────────────────────────────────────────────

    /// Appends a literal to the string pool. Indices follow insertion order.
    pub fn add_string(&mut self, text: impl Into<String>) -> StrId {
        let id = StrId::new(self.strings.len());
        self.strings.push(text.into());
        id
    }

    /// Pooled literal.
    #[must_use]
    pub fn string(&self, id: StrId) -> &str {
        &self.strings[id.index()]
    }

    /// The whole pool in insertion order.
    #[must_use]
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    // ── Functions ───────────────────────────────────────────────────────

    /// Adds a defined function without blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if the name is taken.
    pub fn define_function(
        &mut self,
        name: impl Into<String>,
        ret: TypeId,
        params: &[TypeId],
    ) -> Result<FuncId> {
        let name = name.into();
        if self.function_index.contains_key(&name) {
            return Err(Error::DuplicateDefinition(name));
        }
        let signature = self.types.function(ret, params.to_vec());
        Ok(self.insert_function(Function::new(name, signature, ret, params)))
    }

    /// Declares an external function, returning the existing handle if the
    /// name is already known.
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        ret: TypeId,
        params: &[TypeId],
    ) -> FuncId {
        let name = name.into();
        if let Some(&id) = self.function_index.get(&name) {
            return id;
        }
        let signature = self.types.function(ret, params.to_vec());
        self.insert_function(Function::external(name, signature, ret, params))
    }

    /// Declares a runtime library function (idempotent).
    pub fn declare_runtime(&mut self, func: RuntimeFunction) -> FuncId {
        let (ret, params) = func.signature(&mut self.types);
        self.declare_function(func.name(), ret, &params)
    }

    fn insert_function(&mut self, func: Function) -> FuncId {
        let id = FuncId::new(self.functions.len());
        self.function_index.insert(func.name().to_string(), id);
        self.functions.push(func);
        id
    }

    /// Function record.
    #[must_use]
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    /// Mutable function record.
    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    /// Iterates functions in definition order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> + '_ {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId::new(i), f))
    }

    /// Handles of every function.
    #[must_use]
    pub fn function_ids(&self) -> Vec<FuncId> {
        (0..self.functions.len()).map(FuncId::new).collect()
    }

    /// Number of functions, declarations included.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Looks a function up by name.
    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.function_index.get(name).copied()
    }

    /// Looks a function up by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if no such function exists.
    pub fn function_by_name(&self, name: &str) -> Result<FuncId> {
        self.find_function(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    /// Splits the module into the read-only type table and the function
    /// list, so function-local passes can run on several functions at once.
    pub fn split_functions_mut(&mut self) -> (&TypeTable, &mut [Function]) {
        (&self.types, &mut self.functions)
    }

    /// Type of `value` as seen from inside `func`.
    #[must_use]
    pub fn value_type(&self, func: FuncId, value: Value) -> TypeId {
        match value {
            Value::Global(id) => self.globals[id.index()].ptr_ty,
            other => self.functions[func.index()]
                .value_type(other)
                .unwrap_or(TypeId::VOID),
        }
    }
}
