//! Textual IR emission.
//!
//! Writes a [`Module`] as LLVM-flavoured assembly text, in four sections:
//!
//! 1. string constants (`@.str_K`, plus the `@.str_K_J` pieces of every
//!    format string used by a formatted print)
//! 2. global variables
//! 3. external declarations
//! 4. function bodies
//!
//! Deleted functions and deleted blocks are skipped. Instruction results are
//! named after their handle (`%v7`), arguments by position (`%a0`).
//!
//! A formatted print is not a real runtime function: each call is expanded
//! in place into `putstr` calls for the literal pieces of its format string,
//! interleaved with `putint` calls for the arguments, and `printf` itself is
//! never declared.
//!
//! # Example
//!
//! ```rust
//! use sysmir::{emit::emit_to_string, mir::{Module, TypeId}};
//!
//! let mut module = Module::new();
//! module.add_global_i32("answer", 42)?;
//! let text = emit_to_string(&module)?;
//! assert_eq!(text, "@answer = global i32 42\n");
//! # Ok::<(), sysmir::Error>(())
//! ```

use std::{collections::BTreeSet, io};

use crate::{
    mir::{
        Constant, Function, GlobalInit, InstId, InstKind, Module, RuntimeFunction, StrId, TypeId,
        Value,
    },
    Result,
};

/// Directive replaced by an integer argument in print format strings.
const INT_DIRECTIVE: &str = "%d";

/// Writes `module` to `out`.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if writing fails.
pub fn emit_module(module: &Module, out: &mut impl io::Write) -> Result<()> {
    Emitter { module, out }.emit()
}

/// Renders `module` into a string.
///
/// # Errors
///
/// Returns [`Error::Internal`](crate::Error::Internal) if the rendered text
/// is not valid UTF-8, which only happens for non-UTF-8 symbol names.
pub fn emit_to_string(module: &Module) -> Result<String> {
    let mut buffer = Vec::new();
    emit_module(module, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| internal_error!("emitted IR is not UTF-8: {e}"))
}

/// Escapes `text` as an `i8` array literal body, NUL-terminated. Returns the
/// array length and the escaped text.
fn encode_literal(text: &str) -> (usize, String) {
    let mut body = String::with_capacity(text.len() + 3);
    for byte in text.bytes() {
        match byte {
            b'\n' => body.push_str("\\0A"),
            b'"' => body.push_str("\\22"),
            b'\\' => body.push_str("\\5C"),
            0x20..=0x7e => body.push(char::from(byte)),
            _ => body.push_str(&format!("\\{byte:02X}")),
        }
    }
    body.push_str("\\00");
    (text.len() + 1, body)
}

/// Literal pieces of a print format, as `(J, text)` with 1-based `J`.
/// Empty pieces are dropped but keep their number.
fn format_pieces(format: &str) -> impl Iterator<Item = (usize, &str)> {
    format
        .split(INT_DIRECTIVE)
        .enumerate()
        .filter(|(_, piece)| !piece.is_empty())
        .map(|(j, piece)| (j + 1, piece))
}

struct Emitter<'a, W> {
    module: &'a Module,
    out: W,
}

impl<W: io::Write> Emitter<'_, W> {
    fn emit(&mut self) -> Result<()> {
        self.emit_strings()?;
        self.emit_globals()?;
        self.emit_declarations()?;
        let module = self.module;
        for (_, func) in module.functions() {
            if func.is_external() || func.is_deleted() {
                continue;
            }
            self.emit_function(func)?;
        }
        Ok(())
    }

    fn live_functions(&self) -> impl Iterator<Item = &Function> + '_ {
        self.module
            .functions()
            .map(|(_, f)| f)
            .filter(|f| !f.is_external() && !f.is_deleted())
    }

    /// Format strings of every print that will be emitted.
    fn print_formats(&self) -> BTreeSet<StrId> {
        let mut formats = BTreeSet::new();
        for func in self.live_functions() {
            for block in func.live_blocks() {
                for inst in func.insts(block) {
                    if let InstKind::Call {
                        format: Some(format),
                        ..
                    } = func.kind(inst)
                    {
                        formats.insert(*format);
                    }
                }
            }
        }
        formats
    }

    fn emit_strings(&mut self) -> Result<()> {
        for (k, text) in self.module.strings().iter().enumerate() {
            let (len, body) = encode_literal(text);
            writeln!(self.out, "@.str_{} = constant [{len} x i8] c\"{body}\"", k + 1)?;
        }
        for format in self.print_formats() {
            for (j, piece) in format_pieces(self.module.string(format)) {
                let (len, body) = encode_literal(piece);
                writeln!(
                    self.out,
                    "@.str_{}_{j} = constant [{len} x i8] c\"{body}\"",
                    format.index() + 1
                )?;
            }
        }
        Ok(())
    }

    /// Initializer literal of an object of type `ty` whose cells are `cells`.
    fn initializer(&self, ty: TypeId, cells: &[Constant]) -> String {
        let types = self.module.types();
        let Some((len, elem)) = types.array_parts(ty) else {
            return cells.first().map_or_else(
                || Constant::zero(types, ty).map_or_else(|| "zeroinitializer".to_string(), |c| c.to_string()),
                ToString::to_string,
            );
        };
        if cells.iter().all(|c| c.is_zero()) {
            return "zeroinitializer".to_string();
        }
        let stride = types.cell_count(elem);
        let items: Vec<String> = (0..len as usize)
            .map(|i| {
                let chunk = &cells[i * stride..(i + 1) * stride];
                format!("{} {}", types.display(elem), self.initializer(elem, chunk))
            })
            .collect();
        format!("[{}]", items.join(", "))
    }

    fn emit_globals(&mut self) -> Result<()> {
        let types = self.module.types();
        for (_, global) in self.module.globals() {
            let ty = global.ty();
            let init = match global.init() {
                GlobalInit::Scalar(c) => c.to_string(),
                GlobalInit::Zero => self.initializer(ty, &[]),
                GlobalInit::Array(cells) => {
                    let count = types.cell_count(ty);
                    let mut cells = cells.clone();
                    if let Some(zero) = Constant::zero(types, types.scalar_of(ty)) {
                        cells.resize(count.max(cells.len()), zero);
                    }
                    cells.truncate(count);
                    self.initializer(ty, &cells)
                }
            };
            writeln!(
                self.out,
                "@{} = global {} {init}",
                global.name(),
                types.display(ty)
            )?;
        }
        Ok(())
    }

    fn emit_declarations(&mut self) -> Result<()> {
        let types = self.module.types();
        let externals: Vec<&Function> = self
            .module
            .functions()
            .map(|(_, f)| f)
            .filter(|f| f.is_external())
            .collect();
        let declared = |name: &str| externals.iter().any(|f| f.name() == name);

        for func in &externals {
            if func.name() == RuntimeFunction::Printf.name() {
                if !declared(RuntimeFunction::PutStr.name()) {
                    writeln!(self.out, "declare void @putstr(i8*)")?;
                }
                if !declared(RuntimeFunction::PutInt.name()) {
                    writeln!(self.out, "declare void @putint(i32)")?;
                }
                continue;
            }
            let params: Vec<String> = func
                .args()
                .iter()
                .map(|a| types.display(a.ty()).to_string())
                .collect();
            writeln!(
                self.out,
                "declare {} @{}({})",
                types.display(func.return_type()),
                func.name(),
                params.join(", ")
            )?;
        }
        Ok(())
    }

    fn emit_function(&mut self, func: &Function) -> Result<()> {
        let types = self.module.types();
        let params: Vec<String> = func
            .args()
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{} %a{i}", types.display(a.ty())))
            .collect();
        writeln!(
            self.out,
            "define {} @{}({}) {{",
            types.display(func.return_type()),
            func.name(),
            params.join(", ")
        )?;
        for block in func.live_blocks() {
            writeln!(self.out, "{}:", func.block(block).label())?;
            for inst in func.insts(block) {
                self.emit_inst(func, inst)?;
            }
        }
        writeln!(self.out, "}}")?;
        Ok(())
    }

    fn value_type(&self, func: &Function, value: Value) -> TypeId {
        match value {
            Value::Global(g) => self.module.global(g).ptr_ty(),
            _ => func.value_type(value).unwrap_or(TypeId::VOID),
        }
    }

    fn value(&self, value: Value) -> String {
        match value {
            Value::Inst(id) => id.to_string(),
            Value::Arg(i) => format!("%a{i}"),
            Value::Const(c) => c.to_string(),
            Value::Global(g) => format!("@{}", self.module.global(g).name()),
        }
    }

    /// `T v` for an operand.
    fn typed(&self, func: &Function, value: Value) -> String {
        let ty = self.value_type(func, value);
        format!("{} {}", self.module.types().display(ty), self.value(value))
    }

    fn label(func: &Function, block: crate::mir::BlockId) -> String {
        format!("label %{}", func.block(block).label())
    }

    fn emit_print(&mut self, id: InstId, format: StrId, args: &[Value], func: &Function) -> Result<()> {
        let k = format.index() + 1;
        let mut args = args.iter();
        for (j, piece) in self.module.string(format).split(INT_DIRECTIVE).enumerate() {
            if !piece.is_empty() {
                let len = piece.len() + 1;
                writeln!(
                    self.out,
                    "  {id}_s{} = getelementptr [{len} x i8], [{len} x i8]* @.str_{k}_{}, i32 0, i32 0",
                    j + 1,
                    j + 1
                )?;
                writeln!(self.out, "  call void @putstr(i8* {id}_s{})", j + 1)?;
            }
            if let Some(&arg) = args.next() {
                let arg = self.typed(func, arg);
                writeln!(self.out, "  call void @putint({arg})")?;
            }
        }
        for &arg in args {
            let arg = self.typed(func, arg);
            writeln!(self.out, "  call void @putint({arg})")?;
        }
        Ok(())
    }

    fn emit_inst(&mut self, func: &Function, id: InstId) -> Result<()> {
        let types = self.module.types();
        let ty = func.inst(id).ty();
        let ty_text = types.display(ty);
        let line = match func.kind(id) {
            InstKind::Alloc { allocated } => format!("{id} = alloca {}", types.display(*allocated)),
            InstKind::Load { ptr } => format!("{id} = load {ty_text}, {}", self.typed(func, *ptr)),
            InstKind::Store { value, ptr } => {
                format!("store {}, {}", self.typed(func, *value), self.typed(func, *ptr))
            }
            InstKind::GetElementPtr { base, offsets } => {
                let base_ty = self.value_type(func, *base);
                let pointee = types.pointee(base_ty).unwrap_or(base_ty);
                let mut text = format!(
                    "{id} = getelementptr {}, {}",
                    types.display(pointee),
                    self.typed(func, *base)
                );
                for offset in offsets {
                    text.push_str(", ");
                    text.push_str(&self.typed(func, *offset));
                }
                text
            }
            InstKind::Binary { op, lhs, rhs } => format!(
                "{id} = {op} {}, {}",
                self.typed(func, *lhs),
                self.value(*rhs)
            ),
            InstKind::Icmp { cond, lhs, rhs } => format!(
                "{id} = icmp {} {}, {}",
                cond.icmp_predicate(),
                self.typed(func, *lhs),
                self.value(*rhs)
            ),
            InstKind::Fcmp { cond, lhs, rhs } => format!(
                "{id} = fcmp {} {}, {}",
                cond.fcmp_predicate(),
                self.typed(func, *lhs),
                self.value(*rhs)
            ),
            InstKind::Cast { op, value } => {
                format!("{id} = {op} {} to {ty_text}", self.typed(func, *value))
            }
            InstKind::Call {
                format: Some(format),
                args,
                ..
            } => return self.emit_print(id, *format, args, func),
            InstKind::Call { callee, args, .. } => {
                let callee = self.module.function(*callee);
                let args: Vec<String> = args.iter().map(|a| self.typed(func, *a)).collect();
                let ret = callee.return_type();
                let call = format!(
                    "call {} @{}({})",
                    types.display(ret),
                    callee.name(),
                    args.join(", ")
                );
                if ret == TypeId::VOID {
                    call
                } else {
                    format!("{id} = {call}")
                }
            }
            InstKind::Branch {
                cond,
                then_target,
                else_target,
            } => format!(
                "br {}, {}, {}",
                self.typed(func, *cond),
                Self::label(func, *then_target),
                Self::label(func, *else_target)
            ),
            InstKind::Jump {
                target: Some(target),
            } => format!("br {}", Self::label(func, *target)),
            InstKind::Jump { target: None } => {
                return Err(internal_error!(
                    "pending jump {id} in {} reached emission",
                    func.name()
                ))
            }
            InstKind::Return { value: Some(value) } => format!("ret {}", self.typed(func, *value)),
            InstKind::Return { value: None } => "ret void".to_string(),
            InstKind::Phi { incoming } => {
                let entries: Vec<String> = incoming
                    .iter()
                    .map(|e| {
                        let value = e.value.map_or_else(|| "undef".to_string(), |v| self.value(v));
                        format!("[ {value}, %{} ]", func.block(e.block).label())
                    })
                    .collect();
                format!("{id} = phi {ty_text} {}", entries.join(", "))
            }
        };
        writeln!(self.out, "  {line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::CompilerContext,
        mir::{BinaryOp, CondCode, FunctionBuilder},
    };

    #[test]
    fn test_literal_encoding() {
        assert_eq!(encode_literal("hi\n"), (4, "hi\\0A\\00".to_string()));
        assert_eq!(encode_literal("a\"b\\"), (5, "a\\22b\\5C\\00".to_string()));
        let pieces: Vec<_> = format_pieces("%d, %d\n").collect();
        assert_eq!(pieces, vec![(2, ", "), (3, "\n")]);
    }

    #[test]
    fn test_globals_and_arrays() {
        let mut module = Module::new();
        let row = module.types_mut().array_of(TypeId::I32, 2);
        let grid = module.types_mut().array_of(row, 2);
        module
            .add_global("grid", grid, GlobalInit::Array(vec![Constant::Int(1), Constant::Int(2)]))
            .unwrap();
        module.add_global("zeros", row, GlobalInit::Zero).unwrap();
        module
            .add_global("f", TypeId::F32, GlobalInit::Scalar(Constant::Float(1.0)))
            .unwrap();

        let text = emit_to_string(&module).unwrap();
        assert_eq!(
            text,
            "@grid = global [2 x [2 x i32]] [[2 x i32] [i32 1, i32 2], [2 x i32] zeroinitializer]\n\
             @zeros = global [2 x i32] zeroinitializer\n\
             @f = global float 0x3FF0000000000000\n"
        );
    }

    #[test]
    fn test_function_body() {
        let mut module = Module::new();
        let ctx = CompilerContext::new();
        let getint = ctx.runtime_function(&mut module, RuntimeFunction::GetInt);
        let f = module.define_function("max0", TypeId::I32, &[TypeId::I32]).unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, f).unwrap();
        let x = b.call(getint, vec![]);
        let sum = b.binary(BinaryOp::Add, x, Value::Arg(0));
        let pos = b.icmp(CondCode::Gt, sum, Value::int(0));
        let then_bb = b.create_block();
        let else_bb = b.create_block();
        b.branch(pos, then_bb, else_bb);
        b.switch_to(then_bb);
        b.ret(Some(sum));
        b.switch_to(else_bb);
        b.ret(Some(Value::int(0)));
        b.finish().unwrap();

        let text = emit_to_string(&module).unwrap();
        let expected = "declare i32 @getint()\n\
                        define i32 @max0(i32 %a0) {\n\
                        max0_BB0:\n  \
                        %v0 = call i32 @getint()\n  \
                        %v1 = add i32 %v0, %a0\n  \
                        %v2 = icmp sgt i32 %v1, 0\n  \
                        br i1 %v2, label %max0_BB1, label %max0_BB2\n\
                        max0_BB1:\n  \
                        ret i32 %v1\n\
                        max0_BB2:\n  \
                        ret i32 0\n\
                        }\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_print_is_desugared() {
        let mut module = Module::new();
        let ctx = CompilerContext::new();
        let main = module.define_function("main", TypeId::VOID, &[]).unwrap();
        let mut b = FunctionBuilder::new(&mut module, &ctx, main).unwrap();
        b.printf("x=%d\n", vec![Value::int(7)]);
        b.ret(None);
        b.finish().unwrap();

        let text = emit_to_string(&module).unwrap();
        let expected = "@.str_1 = constant [6 x i8] c\"x=%d\\0A\\00\"\n\
                        @.str_1_1 = constant [3 x i8] c\"x=\\00\"\n\
                        @.str_1_2 = constant [2 x i8] c\"\\0A\\00\"\n\
                        declare void @putstr(i8*)\n\
                        declare void @putint(i32)\n\
                        define void @main() {\n\
                        main_BB0:\n  \
                        %v0_s1 = getelementptr [3 x i8], [3 x i8]* @.str_1_1, i32 0, i32 0\n  \
                        call void @putstr(i8* %v0_s1)\n  \
                        call void @putint(i32 7)\n  \
                        %v0_s2 = getelementptr [2 x i8], [2 x i8]* @.str_1_2, i32 0, i32 0\n  \
                        call void @putstr(i8* %v0_s2)\n  \
                        ret void\n\
                        }\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_deleted_functions_are_skipped() {
        let mut module = Module::new();
        let f = module.define_function("gone", TypeId::VOID, &[]).unwrap();
        let func = module.function_mut(f);
        let entry = func.add_block("gone_BB0");
        func.append(entry, InstKind::Return { value: None }, TypeId::VOID);
        func.mark_deleted();
        assert_eq!(emit_to_string(&module).unwrap(), "");
    }
}
