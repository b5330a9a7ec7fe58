//! Construction API for function bodies.
//!
//! [`FunctionBuilder`] is the boundary a front end drives while lowering a
//! function. It takes care of the conventions the passes rely on:
//!
//! - block labels come from the pipeline context (`{function}_BB{n}`);
//! - stack slots are placed at the front of the entry block;
//! - operations on constant operands fold instead of emitting instructions;
//! - appending after a terminator opens a fresh, unreachable block (code
//!   following `return`, `break` or `continue`);
//! - jumps whose target is not known yet (`break`/`continue`) are created
//!   pending and back-filled exactly once;
//! - [`FunctionBuilder::finish`] terminates any open block with the default
//!   return and rejects unresolved pending jumps.
//!
//! # Example
//!
//! ```rust
//! use sysmir::{compiler::CompilerContext, mir::{BinaryOp, FunctionBuilder, Module, TypeId, Value}};
//!
//! let mut module = Module::new();
//! let ctx = CompilerContext::new();
//! let f = module.define_function("inc", TypeId::I32, &[TypeId::I32])?;
//!
//! let mut b = FunctionBuilder::new(&mut module, &ctx, f)?;
//! let slots = b.spill_arguments()?;
//! let x = b.load(slots[0])?;
//! let sum = b.binary(BinaryOp::Add, x, Value::int(1));
//! b.ret(Some(sum));
//! b.finish()?;
//! # Ok::<(), sysmir::Error>(())
//! ```

use crate::{
    compiler::CompilerContext,
    mir::{
        constant::{fold_binary, fold_cast, fold_fcmp, fold_icmp},
        BinaryOp, BlockId, CastOp, CondCode, Constant, FuncId, InstId, InstKind, Module,
        RuntimeFunction, Type, TypeId, TypeTable, Value,
    },
    Error, Result,
};

/// Appends instructions to one function of a module.
pub struct FunctionBuilder<'a> {
    module: &'a mut Module,
    ctx: &'a CompilerContext,
    func: FuncId,
    current: BlockId,
    pending: Vec<InstId>,
}

impl<'a> FunctionBuilder<'a> {
    /// Starts building `func`, creating its entry block if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Builder`] for external functions.
    pub fn new(module: &'a mut Module, ctx: &'a CompilerContext, func: FuncId) -> Result<Self> {
        let function = module.function(func);
        if function.is_external() {
            return Err(Error::Builder(format!(
                "cannot add a body to external function '{}'",
                function.name()
            )));
        }
        let current = match function.entry() {
            Some(entry) => entry,
            None => {
                let label = ctx.next_block_label(func, function.name());
                module.function_mut(func).add_block(label)
            }
        };
        Ok(Self {
            module,
            ctx,
            func,
            current,
            pending: Vec::new(),
        })
    }

    /// The function being built.
    #[must_use]
    pub fn func(&self) -> FuncId {
        self.func
    }

    /// The module being built.
    #[must_use]
    pub fn module(&self) -> &Module {
        self.module
    }

    /// Type table, for interning array and pointer types.
    pub fn types_mut(&mut self) -> &mut TypeTable {
        self.module.types_mut()
    }

    /// Creates a new block without switching to it.
    pub fn create_block(&mut self) -> BlockId {
        let label = self
            .ctx
            .next_block_label(self.func, self.module.function(self.func).name());
        self.module.function_mut(self.func).add_block(label)
    }

    /// Directs subsequent instructions to the end of `block`.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Block receiving instructions.
    #[must_use]
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// `true` if the current block already ends in a terminator.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.module
            .function(self.func)
            .terminator(self.current)
            .is_some()
    }

    /// The `index`-th formal argument.
    #[must_use]
    pub fn arg(&self, index: u32) -> Value {
        Value::Arg(index)
    }

    /// Type of `value` inside this function.
    #[must_use]
    pub fn value_type(&self, value: Value) -> TypeId {
        self.module.value_type(self.func, value)
    }

    /// Stores every argument into its own stack slot and returns the slots,
    /// the lowering convention for parameters.
    ///
    /// # Errors
    ///
    /// Propagates [`FunctionBuilder::store`] errors.
    pub fn spill_arguments(&mut self) -> Result<Vec<Value>> {
        let arg_types: Vec<TypeId> = self
            .module
            .function(self.func)
            .args()
            .iter()
            .map(|a| a.ty())
            .collect();
        let mut slots = Vec::with_capacity(arg_types.len());
        for (index, ty) in arg_types.into_iter().enumerate() {
            let slot = self.alloc(ty);
            let index = u32::try_from(index)
                .map_err(|_| Error::Builder("too many arguments".to_string()))?;
            self.store(Value::Arg(index), slot)?;
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Reserves a stack slot of type `ty` at the front of the entry block.
    pub fn alloc(&mut self, ty: TypeId) -> Value {
        let ptr_ty = self.module.types_mut().pointer_to(ty);
        let func = self.module.function_mut(self.func);
        let entry = func.entry().unwrap_or(self.current);
        let id = func.prepend(entry, InstKind::Alloc { allocated: ty }, ptr_ty);
        Value::Inst(id)
    }

    /// Reads through `ptr`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Builder`] if `ptr` is not a pointer.
    pub fn load(&mut self, ptr: Value) -> Result<Value> {
        let ty = self.pointee_of(ptr)?;
        Ok(self.emit(InstKind::Load { ptr }, ty))
    }

    /// Writes `value` through `ptr`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Builder`] if `ptr` is not a pointer.
    pub fn store(&mut self, value: Value, ptr: Value) -> Result<()> {
        self.pointee_of(ptr)?;
        self.emit(InstKind::Store { value, ptr }, TypeId::VOID);
        Ok(())
    }

    /// Computes an element address. The first offset steps over whole
    /// pointees; each further offset selects within one array dimension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Builder`] if `base` is not a pointer or there are
    /// more offsets than array dimensions.
    pub fn gep(&mut self, base: Value, offsets: Vec<Value>) -> Result<Value> {
        let mut ty = self.pointee_of(base)?;
        for _ in offsets.iter().skip(1) {
            ty = self
                .module
                .types()
                .array_parts(ty)
                .map(|(_, elem)| elem)
                .ok_or_else(|| Error::Builder("getelementptr indexes a non-array".to_string()))?;
        }
        let result = self.module.types_mut().pointer_to(ty);
        Ok(self.emit(InstKind::GetElementPtr { base, offsets }, result))
    }

    /// `lhs op rhs`, folded when both operands are constants.
    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            if let Some(folded) = fold_binary(op, a, b) {
                return Value::Const(folded);
            }
        }
        let ty = if op.is_float() { TypeId::F32 } else { TypeId::I32 };
        self.emit(InstKind::Binary { op, lhs, rhs }, ty)
    }

    /// Signed integer comparison, folded on constants.
    pub fn icmp(&mut self, cond: CondCode, lhs: Value, rhs: Value) -> Value {
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            if let Some(folded) = fold_icmp(cond, a, b) {
                return Value::Const(folded);
            }
        }
        self.emit(InstKind::Icmp { cond, lhs, rhs }, TypeId::I1)
    }

    /// Ordered float comparison, folded on constants.
    pub fn fcmp(&mut self, cond: CondCode, lhs: Value, rhs: Value) -> Value {
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            if let Some(folded) = fold_fcmp(cond, a, b) {
                return Value::Const(folded);
            }
        }
        self.emit(InstKind::Fcmp { cond, lhs, rhs }, TypeId::I1)
    }

    /// Converts `value` to `to`, folded on constants.
    pub fn cast(&mut self, op: CastOp, value: Value, to: TypeId) -> Value {
        if let Some(c) = value.as_const() {
            if let Some(folded) = fold_cast(op, c, to) {
                return Value::Const(folded);
            }
        }
        self.emit(InstKind::Cast { op, value }, to)
    }

    /// Calls `callee`. The result is unusable for `void` callees.
    pub fn call(&mut self, callee: FuncId, args: Vec<Value>) -> Value {
        let ty = self.module.function(callee).return_type();
        self.emit(
            InstKind::Call {
                callee,
                args,
                format: None,
            },
            ty,
        )
    }

    /// Calls a runtime library function, declaring it on first use.
    pub fn call_runtime(&mut self, func: RuntimeFunction, args: Vec<Value>) -> Value {
        let callee = self.ctx.runtime_function(self.module, func);
        self.call(callee, args)
    }

    /// Formatted print of `format` with `%d` directives filled from `args`.
    pub fn printf(&mut self, format: &str, args: Vec<Value>) -> Value {
        let callee = self.ctx.runtime_function(self.module, RuntimeFunction::Printf);
        let format = self.module.add_string(format);
        self.emit(
            InstKind::Call {
                callee,
                args,
                format: Some(format),
            },
            TypeId::VOID,
        )
    }

    /// Zero-fills the local array behind `array_ptr` through `memset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Builder`] if `array_ptr` is not a pointer.
    pub fn zero_fill(&mut self, array_ptr: Value) -> Result<()> {
        let pointee = self.pointee_of(array_ptr)?;
        let cells = self.module.types().cell_count(pointee);
        let bytes = i32::try_from(cells * 4)
            .map_err(|_| Error::Builder("array too large to zero-fill".to_string()))?;
        let i32_ptr = self.module.types_mut().pointer_to(TypeId::I32);
        let raw = self.cast(CastOp::BitCast, array_ptr, i32_ptr);
        self.call_runtime(
            RuntimeFunction::MemSet,
            vec![raw, Value::int(0), Value::int(bytes)],
        );
        Ok(())
    }

    /// Conditional branch. A constant condition becomes a jump to the taken
    /// side; the other side is left unreachable.
    pub fn branch(&mut self, cond: Value, then_target: BlockId, else_target: BlockId) {
        if let Some(c) = cond.as_const() {
            let target = if c.is_zero() { else_target } else { then_target };
            self.jump(target);
            return;
        }
        self.emit(
            InstKind::Branch {
                cond,
                then_target,
                else_target,
            },
            TypeId::VOID,
        );
    }

    /// Unconditional jump.
    pub fn jump(&mut self, target: BlockId) {
        self.emit(
            InstKind::Jump {
                target: Some(target),
            },
            TypeId::VOID,
        );
    }

    /// Emits a jump whose target is supplied later through
    /// [`FunctionBuilder::resolve_pending`].
    pub fn pending_jump(&mut self) -> InstId {
        let id = self.emit_inst(InstKind::Jump { target: None }, TypeId::VOID);
        self.pending.push(id);
        id
    }

    /// Back-fills a pending jump.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Builder`] if `jump` is not an unresolved pending jump.
    pub fn resolve_pending(&mut self, jump: InstId, target: BlockId) -> Result<()> {
        let func = self.module.function_mut(self.func);
        if !func.kind(jump).is_pending_jump() {
            return Err(Error::Builder(format!("{jump} is not a pending jump")));
        }
        func.replace_kind(
            jump,
            InstKind::Jump {
                target: Some(target),
            },
        );
        self.pending.retain(|&p| p != jump);
        Ok(())
    }

    /// Returns from the function.
    pub fn ret(&mut self, value: Option<Value>) {
        self.emit(InstKind::Return { value }, TypeId::VOID);
    }

    /// Completes the body: open blocks receive the default return and every
    /// pending jump must have been resolved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PendingJump`] naming the first unresolved jump.
    pub fn finish(self) -> Result<()> {
        let default = default_return(
            self.module.types(),
            self.module.function(self.func).return_type(),
        );
        let func = self.module.function_mut(self.func);

        if let Some(&jump) = self.pending.first() {
            return Err(Error::PendingJump {
                function: func.name().to_string(),
                block: func.block(func.inst(jump).block()).label().to_string(),
            });
        }

        let open: Vec<BlockId> = func
            .live_blocks()
            .filter(|&b| func.terminator(b).is_none())
            .collect();
        for block in open {
            func.append(block, InstKind::Return { value: default }, TypeId::VOID);
        }
        Ok(())
    }

    fn emit(&mut self, kind: InstKind, ty: TypeId) -> Value {
        Value::Inst(self.emit_inst(kind, ty))
    }

    fn emit_inst(&mut self, kind: InstKind, ty: TypeId) -> InstId {
        if self.is_terminated() {
            self.current = self.create_block();
        }
        self.module
            .function_mut(self.func)
            .append(self.current, kind, ty)
    }

    fn pointee_of(&self, ptr: Value) -> Result<TypeId> {
        let ty = self.value_type(ptr);
        self.module
            .types()
            .pointee(ty)
            .ok_or_else(|| {
                Error::Builder(format!(
                    "expected a pointer, found {}",
                    self.module.types().display(ty)
                ))
            })
    }
}

/// The value `ret` carries when control falls off the end of a function.
#[must_use]
pub fn default_return(types: &TypeTable, ret: TypeId) -> Option<Value> {
    match types.get(ret) {
        Type::Void => None,
        _ => Constant::zero(types, ret).map(Value::Const),
    }
}
