//! The IR interpreter.
//!
//! Executes functions block by block. Phis of a block are evaluated together
//! on entry, against the block control came from, before any other
//! instruction of the block runs. Allocas live until their frame returns.
//! Calls to declared functions are dispatched to the built-in runtime
//! library; everything else must have a body.

use std::collections::HashMap;

use log::trace;

use crate::{
    emulation::{EmValue, EmulationError, Memory},
    mir::{
        constant::{fold_binary, fold_cast, fold_fcmp, fold_icmp},
        BinaryOp, BlockId, CastOp, Constant, FuncId, Function, GlobalInit, InstId, InstKind,
        Module, RuntimeFunction, TypeId, Value,
    },
    Result,
};

/// Resource limits of one interpreter run.
///
/// # Default Values
///
/// | Setting | Default Value |
/// |---------|---------------|
/// | `max_instructions` | 10,000,000 |
/// | `max_call_depth` | 512 |
/// | `max_memory_cells` | 16,777,216 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulationLimits {
    /// Maximum instructions to execute. Set to 0 for unlimited execution.
    pub max_instructions: usize,

    /// Maximum nesting of calls to defined functions.
    pub max_call_depth: usize,

    /// Maximum number of memory cells for globals and allocas together.
    pub max_memory_cells: usize,
}

impl Default for EmulationLimits {
    fn default() -> Self {
        Self {
            max_instructions: 10_000_000,
            max_call_depth: 512,
            max_memory_cells: 1 << 24,
        }
    }
}

/// Byte input consumed by the `get*` runtime functions.
#[derive(Debug, Clone, Default)]
struct Input {
    bytes: Vec<u8>,
    pos: usize,
}

impl Input {
    fn skip_whitespace(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(u8::is_ascii_whitespace)
        {
            self.pos += 1;
        }
    }

    fn token(&mut self) -> Option<&str> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }

    /// Reads a decimal integer the way `scanf("%d")` does, stopping at the
    /// first non-digit.
    fn read_int(&mut self) -> Option<i32> {
        self.skip_whitespace();
        let start = self.pos;
        if matches!(self.bytes.get(self.pos), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let digits = self.pos;
        while self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        if digits == self.pos {
            self.pos = start;
            return None;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
        text.parse::<i64>().ok().map(|v| v as i32)
    }

    fn read_float(&mut self) -> Option<f32> {
        self.token()?.parse().ok()
    }

    fn read_char(&mut self) -> Option<i32> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(i32::from(byte))
    }
}

enum Flow {
    Next,
    Jump(BlockId),
    Return(EmValue),
}

/// Registers of one activation.
struct Frame {
    func: FuncId,
    args: Vec<EmValue>,
    values: HashMap<InstId, EmValue>,
}

/// Reference interpreter for a [`Module`].
///
/// Globals are materialized from their initializers when the interpreter is
/// created; they keep their values across several [`Interpreter::run`]
/// calls, like the output buffer and the input position.
///
/// # Example
///
/// ```rust
/// use sysmir::{
///     compiler::CompilerContext,
///     emulation::{EmValue, Interpreter},
///     mir::{FunctionBuilder, Module, RuntimeFunction, TypeId, Value},
/// };
///
/// let ctx = CompilerContext::new();
/// let mut module = Module::new();
/// let main = module.define_function("main", TypeId::I32, &[])?;
/// let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
/// let n = b.call_runtime(RuntimeFunction::GetInt, vec![]);
/// b.call_runtime(RuntimeFunction::PutInt, vec![n]);
/// b.ret(Some(Value::int(0)));
/// b.finish()?;
///
/// let mut interp = Interpreter::new(&module)?.with_input("42");
/// assert_eq!(interp.run("main", &[])?, EmValue::Int(0));
/// assert_eq!(interp.output(), "42");
/// # Ok::<(), sysmir::Error>(())
/// ```
pub struct Interpreter<'m> {
    module: &'m Module,
    limits: EmulationLimits,
    memory: Memory,
    globals: Vec<usize>,
    input: Input,
    output: String,
    steps: usize,
    depth: usize,
}

impl<'m> Interpreter<'m> {
    /// Creates an interpreter with default limits and empty input.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Emulation`] if the globals do not fit into
    /// the default memory limit.
    pub fn new(module: &'m Module) -> Result<Self> {
        Self::with_limits(module, EmulationLimits::default())
    }

    /// Creates an interpreter with explicit limits.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Emulation`] if the globals do not fit into
    /// `limits.max_memory_cells`.
    pub fn with_limits(module: &'m Module, limits: EmulationLimits) -> Result<Self> {
        let mut memory = Memory::new(limits.max_memory_cells);
        let mut globals = Vec::new();
        let types = module.types();
        for (_, global) in module.globals() {
            let cells = types.cell_count(global.ty());
            let zero = zero_value(module, global.ty());
            let base = memory.allocate(cells, zero)?;
            match global.init() {
                GlobalInit::Scalar(c) => memory.store(base, EmValue::from(*c))?,
                GlobalInit::Array(values) => {
                    for (i, c) in values.iter().take(cells).enumerate() {
                        memory.store(base + i, EmValue::from(*c))?;
                    }
                }
                GlobalInit::Zero => {}
            }
            globals.push(base);
        }

        Ok(Interpreter {
            module,
            limits,
            memory,
            globals,
            input: Input::default(),
            output: String::new(),
            steps: 0,
            depth: 0,
        })
    }

    /// Replaces the text read by `getint`, `getch`, `getfloat`, `getarray`
    /// and `getfarray`.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Input {
            bytes: input.into().into_bytes(),
            pos: 0,
        };
        self
    }

    /// Everything printed so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Instructions executed so far.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Current value of a global scalar, or the first cell of a global array.
    #[must_use]
    pub fn global_value(&self, name: &str) -> Option<EmValue> {
        let id = self.module.find_global(name)?;
        self.memory.load(self.globals[id.index()]).ok()
    }

    /// Calls the function `name` with `args` and returns its result
    /// ([`EmValue::Void`] for `void` functions).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownFunction`] if there is no such
    /// function, and [`crate::Error::Emulation`] for every failure during
    /// execution.
    pub fn run(&mut self, name: &str, args: &[EmValue]) -> Result<EmValue> {
        let func = self.module.function_by_name(name)?;
        let result = self.call(func, args.to_vec())?;
        trace!("{name} returned {result} after {} steps", self.steps);
        Ok(result)
    }

    fn call(&mut self, id: FuncId, args: Vec<EmValue>) -> std::result::Result<EmValue, EmulationError> {
        let module = self.module;
        let func = module.function(id);
        if func.is_deleted() {
            return Err(EmulationError::NoBody {
                function: func.name().to_string(),
            });
        }
        if args.len() != func.args().len() {
            return Err(EmulationError::ArgumentCount {
                function: func.name().to_string(),
                expected: func.args().len(),
                found: args.len(),
            });
        }
        if func.is_external() {
            let runtime =
                RuntimeFunction::from_name(func.name()).ok_or_else(|| EmulationError::NoBody {
                    function: func.name().to_string(),
                })?;
            return self.call_runtime(runtime, &args);
        }
        if self.depth >= self.limits.max_call_depth {
            return Err(EmulationError::CallDepthExceeded {
                limit: self.limits.max_call_depth,
            });
        }

        self.depth += 1;
        let mark = self.memory.mark();
        let result = self.execute(func, Frame {
            func: id,
            args,
            values: HashMap::new(),
        });
        self.memory.release(mark);
        self.depth -= 1;
        result
    }

    fn execute(&mut self, func: &Function, mut frame: Frame) -> std::result::Result<EmValue, EmulationError> {
        let mut block = func.entry().ok_or_else(|| EmulationError::NoBody {
            function: func.name().to_string(),
        })?;
        let mut pred: Option<BlockId> = None;

        loop {
            self.enter_block(func, &mut frame, block, pred)?;

            let mut next = None;
            for inst in func.insts(block) {
                if func.kind(inst).is_phi() {
                    continue;
                }
                self.tick()?;
                match self.step(func, &mut frame, inst)? {
                    Flow::Next => {}
                    Flow::Jump(target) => {
                        next = Some(target);
                        break;
                    }
                    Flow::Return(value) => return Ok(value),
                }
            }

            let target = next.ok_or_else(|| EmulationError::Malformed {
                message: format!(
                    "block {} of {} has no terminator",
                    func.block(block).label(),
                    func.name()
                ),
            })?;
            pred = Some(block);
            block = target;
        }
    }

    /// Evaluates every phi of `block` against `pred` before assigning any.
    fn enter_block(
        &mut self,
        func: &Function,
        frame: &mut Frame,
        block: BlockId,
        pred: Option<BlockId>,
    ) -> std::result::Result<(), EmulationError> {
        let phis = func.phis(block);
        if phis.is_empty() {
            return Ok(());
        }
        let missing = || EmulationError::Malformed {
            message: format!(
                "no phi entry for the incoming edge of {}",
                func.block(block).label()
            ),
        };
        let pred = pred.ok_or_else(missing)?;

        let mut values = Vec::with_capacity(phis.len());
        for phi in phis {
            let InstKind::Phi { incoming } = func.kind(phi) else {
                continue;
            };
            let value = incoming
                .iter()
                .find(|e| e.block == pred)
                .and_then(|e| e.value)
                .ok_or_else(missing)?;
            values.push((phi, self.eval(frame, value)?));
        }
        frame.values.extend(values);
        Ok(())
    }

    fn tick(&mut self) -> std::result::Result<(), EmulationError> {
        self.steps += 1;
        let limit = self.limits.max_instructions;
        if limit != 0 && self.steps > limit {
            return Err(EmulationError::StepLimitExceeded { limit });
        }
        Ok(())
    }

    fn eval(&self, frame: &Frame, value: Value) -> std::result::Result<EmValue, EmulationError> {
        match value {
            Value::Inst(id) => {
                frame
                    .values
                    .get(&id)
                    .copied()
                    .ok_or_else(|| EmulationError::Malformed {
                        message: format!("{id} used before it was computed"),
                    })
            }
            Value::Arg(index) => {
                frame
                    .args
                    .get(index as usize)
                    .copied()
                    .ok_or_else(|| EmulationError::Malformed {
                        message: format!("argument {index} out of range"),
                    })
            }
            Value::Const(c) => Ok(c.into()),
            Value::Global(id) => Ok(EmValue::Ptr(self.globals[id.index()])),
        }
    }

    fn step(&mut self, func: &Function, frame: &mut Frame, inst: InstId) -> std::result::Result<Flow, EmulationError> {
        let module = self.module;
        let types = module.types();
        let ty = func.inst(inst).ty();

        let result = match func.kind(inst) {
            InstKind::Alloc { allocated } => {
                let cells = types.cell_count(*allocated);
                let addr = self.memory.allocate(cells, zero_value(module, *allocated))?;
                EmValue::Ptr(addr)
            }
            InstKind::Load { ptr } => {
                let addr = self.eval(frame, *ptr)?.as_ptr("load")?;
                reinterpret(module, self.memory.load(addr)?, ty)
            }
            InstKind::Store { value, ptr } => {
                let value = self.eval(frame, *value)?;
                let addr = self.eval(frame, *ptr)?.as_ptr("store")?;
                self.memory.store(addr, value)?;
                return Ok(Flow::Next);
            }
            InstKind::GetElementPtr { base, offsets } => {
                let addr = self.eval(frame, *base)?.as_ptr("getelementptr")?;
                let base_ty = module.value_type(frame.func, *base);
                let mut offsets_values = Vec::with_capacity(offsets.len());
                for offset in offsets {
                    offsets_values.push(self.eval(frame, *offset)?.as_int("getelementptr")?);
                }
                EmValue::Ptr(element_address(module, addr, base_ty, &offsets_values)?)
            }
            InstKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(frame, *lhs)?;
                let rhs = self.eval(frame, *rhs)?;
                if matches!(op, BinaryOp::SDiv | BinaryOp::SRem) && rhs.as_int(op.into())? == 0 {
                    return Err(EmulationError::DivisionByZero {
                        function: func.name().to_string(),
                    });
                }
                let (l, r) = (constant(lhs, op.into())?, constant(rhs, op.into())?);
                fold_binary(*op, l, r)
                    .map(EmValue::from)
                    .ok_or_else(|| mismatch(op.into(), lhs, rhs))?
            }
            InstKind::Icmp { cond, lhs, rhs } => {
                let lhs = self.eval(frame, *lhs)?;
                let rhs = self.eval(frame, *rhs)?;
                fold_icmp(*cond, constant(lhs, "icmp")?, constant(rhs, "icmp")?)
                    .map(EmValue::from)
                    .ok_or_else(|| mismatch("icmp", lhs, rhs))?
            }
            InstKind::Fcmp { cond, lhs, rhs } => {
                let lhs = self.eval(frame, *lhs)?;
                let rhs = self.eval(frame, *rhs)?;
                fold_fcmp(*cond, constant(lhs, "fcmp")?, constant(rhs, "fcmp")?)
                    .map(EmValue::from)
                    .ok_or_else(|| mismatch("fcmp", lhs, rhs))?
            }
            InstKind::Cast { op, value } => {
                let value = self.eval(frame, *value)?;
                match (op, value) {
                    // Pointers keep their address across a reinterpretation
                    (CastOp::BitCast, EmValue::Ptr(_) | EmValue::Null) => value,
                    _ => {
                        let operation: &'static str = op.into();
                        fold_cast(*op, constant(value, operation)?, ty)
                            .map(EmValue::from)
                            .ok_or(EmulationError::TypeMismatch {
                                operation,
                                found: value.kind().to_string(),
                            })?
                    }
                }
            }
            InstKind::Call {
                callee,
                args,
                format,
            } => {
                let mut actual = Vec::with_capacity(args.len());
                for arg in args {
                    actual.push(self.eval(frame, *arg)?);
                }
                match format {
                    Some(format) => {
                        self.print_formatted(module.string(*format), &actual)?;
                        EmValue::Void
                    }
                    None => self.call(*callee, actual)?,
                }
            }
            InstKind::Branch {
                cond,
                then_target,
                else_target,
            } => {
                let taken = self.eval(frame, *cond)?.as_bool("br")?;
                return Ok(Flow::Jump(if taken { *then_target } else { *else_target }));
            }
            InstKind::Jump { target } => {
                return target.map(Flow::Jump).ok_or_else(|| EmulationError::Malformed {
                    message: format!(
                        "pending jump in {} of {}",
                        func.block(func.inst(inst).block()).label(),
                        func.name()
                    ),
                });
            }
            InstKind::Return { value } => {
                let value = match value {
                    Some(v) => self.eval(frame, *v)?,
                    None => EmValue::Void,
                };
                return Ok(Flow::Return(value));
            }
            InstKind::Phi { .. } => return Ok(Flow::Next),
        };

        frame.values.insert(inst, result);
        Ok(Flow::Next)
    }

    fn call_runtime(
        &mut self,
        func: RuntimeFunction,
        args: &[EmValue],
    ) -> std::result::Result<EmValue, EmulationError> {
        let name = func.name();
        let exhausted = || EmulationError::InputExhausted { function: name };

        let result = match func {
            RuntimeFunction::GetInt => EmValue::Int(self.input.read_int().ok_or_else(exhausted)?),
            RuntimeFunction::GetCh => EmValue::Int(self.input.read_char().ok_or_else(exhausted)?),
            RuntimeFunction::GetFloat => {
                EmValue::Float(self.input.read_float().ok_or_else(exhausted)?)
            }
            RuntimeFunction::GetArray | RuntimeFunction::GetFArray => {
                let base = args[0].as_ptr(name)?;
                let count = self.input.read_int().ok_or_else(exhausted)?;
                for i in 0..usize::try_from(count).unwrap_or(0) {
                    let value = if func == RuntimeFunction::GetArray {
                        EmValue::Int(self.input.read_int().ok_or_else(exhausted)?)
                    } else {
                        EmValue::Float(self.input.read_float().ok_or_else(exhausted)?)
                    };
                    self.memory.store(base + i, value)?;
                }
                EmValue::Int(count)
            }
            RuntimeFunction::PutInt => {
                let v = args[0].as_int(name)?;
                self.output.push_str(&v.to_string());
                EmValue::Void
            }
            RuntimeFunction::PutCh => {
                let v = args[0].as_int(name)?;
                let ch = u32::try_from(v)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                self.output.push(ch);
                EmValue::Void
            }
            RuntimeFunction::PutFloat => {
                let v = args[0].as_float(name)?;
                self.output.push_str(&v.to_string());
                EmValue::Void
            }
            RuntimeFunction::PutArray | RuntimeFunction::PutFArray => {
                let count = args[0].as_int(name)?;
                let base = args[1].as_ptr(name)?;
                let mut line = format!("{count}:");
                for i in 0..usize::try_from(count).unwrap_or(0) {
                    let cell = self.memory.load(base + i)?;
                    line.push(' ');
                    line.push_str(&cell.to_string());
                }
                line.push('\n');
                self.output.push_str(&line);
                EmValue::Void
            }
            RuntimeFunction::PutStr => {
                let mut addr = args[0].as_ptr(name)?;
                loop {
                    let c = self.memory.load(addr)?.as_int(name)?;
                    if c == 0 {
                        break;
                    }
                    self.output
                        .push(u8::try_from(c).map_or(char::REPLACEMENT_CHARACTER, char::from));
                    addr += 1;
                }
                EmValue::Void
            }
            RuntimeFunction::MemSet => {
                let base = args[0].as_ptr(name)?;
                let value = args[1].as_int(name)?;
                let bytes = args[2].as_int(name)?;
                let cells = usize::try_from(bytes).unwrap_or(0) / 4;
                self.memory.fill(base, cells, EmValue::Int(value))?;
                EmValue::Void
            }
            RuntimeFunction::StartTime | RuntimeFunction::StopTime => EmValue::Void,
            RuntimeFunction::Printf => {
                return Err(EmulationError::Malformed {
                    message: "printf called without a format string".to_string(),
                })
            }
        };
        Ok(result)
    }

    /// Prints `format`, substituting one integer argument per `%d`.
    fn print_formatted(&mut self, format: &str, args: &[EmValue]) -> std::result::Result<(), EmulationError> {
        let directives = format.matches("%d").count();
        if directives != args.len() {
            return Err(EmulationError::ArgumentCount {
                function: RuntimeFunction::Printf.name().to_string(),
                expected: directives,
                found: args.len(),
            });
        }
        for (i, piece) in format.split("%d").enumerate() {
            if i > 0 {
                let v = args[i - 1].as_int("printf")?;
                self.output.push_str(&v.to_string());
            }
            self.output.push_str(piece);
        }
        Ok(())
    }
}

/// Address of the element `offsets` selects from `addr`, a pointer of type
/// `ptr_ty`: the first offset steps over whole pointees, each further offset
/// indexes one array dimension.
fn element_address(
    module: &Module,
    addr: usize,
    ptr_ty: TypeId,
    offsets: &[i32],
) -> std::result::Result<usize, EmulationError> {
    let types = module.types();
    let malformed = || EmulationError::Malformed {
        message: format!(
            "getelementptr through non-pointer type {}",
            types.display(ptr_ty)
        ),
    };
    let mut ty = types.pointee(ptr_ty).ok_or_else(malformed)?;
    let mut cell = i64::try_from(addr).map_err(|_| EmulationError::InvalidAddress { address: addr })?;

    for (i, &offset) in offsets.iter().enumerate() {
        if i > 0 {
            let (_, elem) = types.array_parts(ty).ok_or_else(malformed)?;
            ty = elem;
        }
        cell += i64::from(offset) * types.cell_count(ty) as i64;
    }

    usize::try_from(cell).map_err(|_| EmulationError::InvalidAddress { address: 0 })
}

/// Initial cell value for an object of type `ty`.
fn zero_value(module: &Module, ty: TypeId) -> EmValue {
    let types = module.types();
    Constant::zero(types, types.scalar_of(ty)).map_or(EmValue::Int(0), EmValue::from)
}

/// Reads a 32-bit cell as the loaded type. Cells written by `memset` or
/// through a bitcast pointer may hold the other scalar kind.
fn reinterpret(module: &Module, value: EmValue, ty: TypeId) -> EmValue {
    let types = module.types();
    match value {
        EmValue::Int(v) if types.is_float(ty) => EmValue::Float(f32::from_bits(v as u32)),
        EmValue::Float(v) if ty == TypeId::I32 => EmValue::Int(v.to_bits() as i32),
        other => other,
    }
}

fn constant(value: EmValue, operation: &'static str) -> std::result::Result<Constant, EmulationError> {
    value.to_constant().ok_or(EmulationError::TypeMismatch {
        operation,
        found: value.kind().to_string(),
    })
}

fn mismatch(operation: &'static str, lhs: EmValue, rhs: EmValue) -> EmulationError {
    EmulationError::TypeMismatch {
        operation,
        found: format!("{} and {}", lhs.kind(), rhs.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::CompilerContext,
        mir::{CondCode, FunctionBuilder},
        Error,
    };

    fn emulation_error(result: Result<EmValue>) -> EmulationError {
        match result {
            Err(Error::Emulation(err)) => err,
            other => panic!("expected an emulation error, got {other:?}"),
        }
    }

    #[test]
    fn test_arithmetic_and_locals() {
        let ctx = CompilerContext::new();
        let mut module = Module::new();
        let f = module
            .define_function("f", TypeId::I32, &[TypeId::I32])
            .unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let params = b.spill_arguments().unwrap();
        let x = b.load(params[0]).unwrap();
        let y = b.binary(BinaryOp::Mul, x, Value::int(3));
        let z = b.binary(BinaryOp::SRem, y, Value::int(5));
        b.ret(Some(z));
        b.finish().unwrap();

        let mut interp = Interpreter::new(&module).unwrap();
        assert_eq!(interp.run("f", &[EmValue::Int(4)]).unwrap(), EmValue::Int(2));
        assert!(interp.steps() > 0);
    }

    #[test]
    fn test_loop_with_globals_and_arrays() {
        let ctx = CompilerContext::new();
        let mut module = Module::new();
        let arr_ty = module.types_mut().array_of(TypeId::I32, 4);
        let table = module
            .add_global(
                "table",
                arr_ty,
                GlobalInit::Array(vec![Constant::Int(5), Constant::Int(6), Constant::Int(7)]),
            )
            .unwrap();
        let main = module.define_function("main", TypeId::I32, &[]).unwrap();

        let mut b = FunctionBuilder::new(&mut module, &ctx, main).unwrap();
        let i = b.alloc(TypeId::I32);
        let sum = b.alloc(TypeId::I32);
        b.store(Value::int(0), i).unwrap();
        b.store(Value::int(0), sum).unwrap();
        let header = b.create_block();
        let body = b.create_block();
        let exit = b.create_block();
        b.jump(header);

        b.switch_to(header);
        let iv = b.load(i).unwrap();
        let cond = b.icmp(CondCode::Lt, iv, Value::int(4));
        b.branch(cond, body, exit);

        b.switch_to(body);
        let iv = b.load(i).unwrap();
        let slot = b.gep(Value::Global(table), vec![Value::int(0), iv]).unwrap();
        let elem = b.load(slot).unwrap();
        let acc = b.load(sum).unwrap();
        let acc = b.binary(BinaryOp::Add, acc, elem);
        b.store(acc, sum).unwrap();
        let next = b.binary(BinaryOp::Add, iv, Value::int(1));
        b.store(next, i).unwrap();
        b.jump(header);

        b.switch_to(exit);
        let result = b.load(sum).unwrap();
        b.ret(Some(result));
        b.finish().unwrap();

        let mut interp = Interpreter::new(&module).unwrap();
        assert_eq!(interp.run("main", &[]).unwrap(), EmValue::Int(18));
        assert_eq!(interp.global_value("table"), Some(EmValue::Int(5)));
    }

    #[test]
    fn test_runtime_io() {
        let ctx = CompilerContext::new();
        let mut module = Module::new();
        let arr_ty = module.types_mut().array_of(TypeId::I32, 8);
        let main = module.define_function("main", TypeId::VOID, &[]).unwrap();

        let mut b = FunctionBuilder::new(&mut module, &ctx, main).unwrap();
        let arr = b.alloc(arr_ty);
        b.zero_fill(arr).unwrap();
        let first = b.gep(arr, vec![Value::int(0), Value::int(0)]).unwrap();
        let n = b.call_runtime(RuntimeFunction::GetArray, vec![first]);
        b.call_runtime(RuntimeFunction::PutArray, vec![n, first]);
        let c = b.call_runtime(RuntimeFunction::GetCh, vec![]);
        b.call_runtime(RuntimeFunction::PutCh, vec![c]);
        b.printf("n=%d, twice=%d\n", vec![n, n]);
        b.ret(None);
        b.finish().unwrap();

        let mut interp = Interpreter::new(&module).unwrap().with_input("3 1 2 3!");
        assert_eq!(interp.run("main", &[]).unwrap(), EmValue::Void);
        assert_eq!(interp.output(), "3: 1 2 3\n!n=3, twice=3\n");

        let err = emulation_error(interp.run("main", &[]));
        assert_eq!(err, EmulationError::InputExhausted { function: "getarray" });
    }

    #[test]
    fn test_division_by_zero() {
        let ctx = CompilerContext::new();
        let mut module = Module::new();
        let f = module
            .define_function("f", TypeId::I32, &[TypeId::I32])
            .unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let q = b.binary(BinaryOp::SDiv, Value::int(1), Value::Arg(0));
        b.ret(Some(q));
        b.finish().unwrap();

        let mut interp = Interpreter::new(&module).unwrap();
        assert_eq!(
            emulation_error(interp.run("f", &[EmValue::Int(0)])),
            EmulationError::DivisionByZero {
                function: "f".to_string()
            }
        );
        assert_eq!(interp.run("f", &[EmValue::Int(1)]).unwrap(), EmValue::Int(1));
    }

    #[test]
    fn test_limits() {
        let ctx = CompilerContext::new();
        let mut module = Module::new();
        let f = module.define_function("spin", TypeId::VOID, &[]).unwrap();
        let g = module.define_function("deep", TypeId::VOID, &[]).unwrap();

        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let entry = b.current_block();
        b.jump(entry);
        b.finish().unwrap();

        let mut b = FunctionBuilder::new(&mut module, &ctx, g).unwrap();
        b.call(g, vec![]);
        b.ret(None);
        b.finish().unwrap();

        let limits = EmulationLimits {
            max_instructions: 1000,
            ..EmulationLimits::default()
        };
        let mut interp = Interpreter::with_limits(&module, limits).unwrap();
        let err = emulation_error(interp.run("spin", &[]));
        assert_eq!(err, EmulationError::StepLimitExceeded { limit: 1000 });
        assert!(err.is_limit());

        let limits = EmulationLimits {
            max_call_depth: 64,
            ..EmulationLimits::default()
        };
        let mut interp = Interpreter::with_limits(&module, limits).unwrap();
        assert_eq!(
            emulation_error(interp.run("deep", &[])),
            EmulationError::CallDepthExceeded { limit: 64 }
        );
    }

    #[test]
    fn test_unknown_external_has_no_body() {
        let mut module = Module::new();
        module.declare_function("mystery", TypeId::I32, &[]);
        let mut interp = Interpreter::new(&module).unwrap();
        assert!(matches!(
            emulation_error(interp.run("mystery", &[])),
            EmulationError::NoBody { .. }
        ));
        assert!(matches!(
            interp.run("nope", &[]),
            Err(Error::UnknownFunction(_))
        ));
    }
}
