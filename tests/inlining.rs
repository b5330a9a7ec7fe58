//! Inlining integration tests.

use sysmir::{
    analysis::CallGraph,
    compiler::{CompilerContext, EventKind, InliningPass, MirPass, PassScheduler, PipelineConfig},
    emit::emit_to_string,
    emulation::{EmValue, Interpreter},
    mir::{
        BinaryOp, CastOp, CondCode, FuncId, FunctionBuilder, InstKind, Module, RuntimeFunction,
        TypeId, Value,
    },
    Result,
};

fn calls_to(module: &Module, caller: FuncId, callee: FuncId) -> usize {
    let f = module.function(caller);
    f.live_blocks()
        .flat_map(|b| f.insts(b))
        .filter(|&i| matches!(f.kind(i), InstKind::Call { callee: c, .. } if *c == callee))
        .count()
}

fn run(module: &Module, input: &str) -> Result<(EmValue, String)> {
    let mut interp = Interpreter::new(module)?.with_input(input);
    let value = interp.run("main", &[])?;
    Ok((value, interp.output().to_string()))
}

/// `int f(int x) { return x + 1; }`
fn build_increment(module: &mut Module, ctx: &CompilerContext) -> Result<FuncId> {
    let f = module.define_function("f", TypeId::I32, &[TypeId::I32])?;
    let mut b = FunctionBuilder::new(module, ctx, f)?;
    let params = b.spill_arguments()?;
    let x = b.load(params[0])?;
    let r = b.binary(BinaryOp::Add, x, Value::int(1));
    b.ret(Some(r));
    b.finish()?;
    Ok(f)
}

#[test]
fn test_increment_folds_to_constant() -> Result<()> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();
    let f = build_increment(&mut module, &ctx)?;

    // int main() { return f(3); }
    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let r = b.call(f, vec![Value::int(3)]);
    b.ret(Some(r));
    b.finish()?;

    PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;

    assert_eq!(calls_to(&module, main, f), 0);
    assert!(module.function(f).is_deleted());
    assert!(ctx.was_inlined(f));
    assert!(ctx.is_deleted(f));

    // Every remaining instruction of main is a jump chain ending in `ret 4`
    let func = module.function(main);
    let returns: Vec<_> = func
        .live_blocks()
        .flat_map(|b| func.insts(b))
        .filter_map(|i| match func.kind(i) {
            InstKind::Return { value } => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(returns, vec![Some(Value::int(4))]);
    assert!(!emit_to_string(&module)?.contains("define i32 @f("));
    assert_eq!(run(&module, "")?.0, EmValue::Int(4));
    Ok(())
}

#[test]
fn test_call_chain_inlines_bottom_up() -> Result<()> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();
    let f = build_increment(&mut module, &ctx)?;

    // int g(int x) { return f(x) * 2; }
    let g = module.define_function("g", TypeId::I32, &[TypeId::I32])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, g)?;
    let r = b.call(f, vec![Value::Arg(0)]);
    let r = b.binary(BinaryOp::Mul, r, Value::int(2));
    b.ret(Some(r));
    b.finish()?;

    // int main() { int n = getint(); putint(g(n)); return g(n); }
    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let n = b.call_runtime(RuntimeFunction::GetInt, vec![]);
    let r = b.call(g, vec![n]);
    b.call_runtime(RuntimeFunction::PutInt, vec![r]);
    let r = b.call(g, vec![n]);
    b.ret(Some(r));
    b.finish()?;

    let graph = CallGraph::build(&module)?;
    let order = graph.bottom_up_order();
    let pos = |id| order.iter().position(|&x| x == id);
    assert!(pos(f) < pos(g));
    assert!(pos(g) < pos(main));

    let before = run(&module, "20")?;
    PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;
    assert_eq!(run(&module, "20")?, before);
    assert_eq!(before, (EmValue::Int(42), "42".to_string()));

    assert_eq!(calls_to(&module, main, g), 0);
    assert_eq!(calls_to(&module, main, f), 0);
    assert!(module.function(f).is_deleted());
    assert!(module.function(g).is_deleted());
    assert_eq!(ctx.events.count_kind(EventKind::FunctionMarkedDead), 2);
    Ok(())
}

#[test]
fn test_multiple_returns_merge_through_phi() -> Result<()> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();

    // int clamp(int x) { if (x > 10) return 10; if (x < 0) return 0; return x; }
    let clamp = module.define_function("clamp", TypeId::I32, &[TypeId::I32])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, clamp)?;
    let hi = b.icmp(CondCode::Gt, Value::Arg(0), Value::int(10));
    let ret_hi = b.create_block();
    let check_lo = b.create_block();
    b.branch(hi, ret_hi, check_lo);
    b.switch_to(ret_hi);
    b.ret(Some(Value::int(10)));
    b.switch_to(check_lo);
    let lo = b.icmp(CondCode::Lt, Value::Arg(0), Value::int(0));
    let ret_lo = b.create_block();
    let ret_x = b.create_block();
    b.branch(lo, ret_lo, ret_x);
    b.switch_to(ret_lo);
    b.ret(Some(Value::int(0)));
    b.switch_to(ret_x);
    b.ret(Some(Value::Arg(0)));
    b.finish()?;

    // int main() { int v = getint(); putint(clamp(v)); putch(32); return clamp(v - 20); }
    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let v = b.call_runtime(RuntimeFunction::GetInt, vec![]);
    let c = b.call(clamp, vec![v]);
    b.call_runtime(RuntimeFunction::PutInt, vec![c]);
    b.call_runtime(RuntimeFunction::PutCh, vec![Value::int(32)]);
    let w = b.binary(BinaryOp::Sub, v, Value::int(20));
    let c = b.call(clamp, vec![w]);
    b.ret(Some(c));
    b.finish()?;

    let reference = module.clone();
    PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;
    assert_eq!(calls_to(&module, main, clamp), 0);

    let func = module.function(main);
    let three_way_phis = func
        .live_blocks()
        .flat_map(|b| func.phis(b))
        .filter(|&p| matches!(func.kind(p), InstKind::Phi { incoming } if incoming.len() == 3))
        .count();
    assert_eq!(three_way_phis, 2);
    func.verify()?;

    for input in ["-5", "7", "25", "33"] {
        assert_eq!(run(&module, input)?, run(&reference, input)?);
    }
    assert_eq!(run(&module, "25")?, (EmValue::Int(5), "10 ".to_string()));
    Ok(())
}

#[test]
fn test_callee_locals_are_hoisted_to_caller_entry() -> Result<()> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();

    // void show(int x) { int buf[3]; buf[0] = x; buf[2] = x * x; putarray(3, buf); }
    let show = module.define_function("show", TypeId::VOID, &[TypeId::I32])?;
    let arr_ty = module.types_mut().array_of(TypeId::I32, 3);
    let mut b = FunctionBuilder::new(&mut module, &ctx, show)?;
    let buf = b.alloc(arr_ty);
    b.zero_fill(buf)?;
    let first = b.gep(buf, vec![Value::int(0), Value::int(0)])?;
    b.store(Value::Arg(0), first)?;
    let last = b.gep(buf, vec![Value::int(0), Value::int(2)])?;
    let sq = b.binary(BinaryOp::Mul, Value::Arg(0), Value::Arg(0));
    b.store(sq, last)?;
    b.call_runtime(RuntimeFunction::PutArray, vec![Value::int(3), first]);
    b.ret(None);
    b.finish()?;

    // int main() { int i = 1; while (i < 4) { show(i); i = i + 1; } return 0; }
    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let i = b.alloc(TypeId::I32);
    b.store(Value::int(1), i)?;
    let header = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    b.jump(header);
    b.switch_to(header);
    let iv = b.load(i)?;
    let c = b.icmp(CondCode::Lt, iv, Value::int(4));
    b.branch(c, body, exit);
    b.switch_to(body);
    let iv = b.load(i)?;
    b.call(show, vec![iv]);
    let iv = b.binary(BinaryOp::Add, iv, Value::int(1));
    b.store(iv, i)?;
    b.jump(header);
    b.switch_to(exit);
    b.ret(Some(Value::int(0)));
    b.finish()?;

    let before = run(&module, "")?;
    assert_eq!(before.1, "3: 1 0 1\n3: 2 0 4\n3: 3 0 9\n");
    PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;
    assert_eq!(run(&module, "")?, before);

    let func = module.function(main);
    let entry = func.entry().unwrap();
    for block in func.live_blocks().filter(|&b| b != entry) {
        assert!(func
            .insts(block)
            .all(|i| !matches!(func.kind(i), InstKind::Alloc { .. })));
    }
    assert!(func
        .insts(entry)
        .any(|i| func.kind(i) == &InstKind::Alloc { allocated: arr_ty }));
    Ok(())
}

#[test]
fn test_threshold_keeps_large_callees() -> Result<()> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();
    let f = build_increment(&mut module, &ctx)?;
    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let r = b.call(f, vec![Value::int(3)]);
    b.ret(Some(r));
    b.finish()?;

    let config = PipelineConfig::default().with_inline_threshold(Some(1));
    PassScheduler::new(config).run(&mut module, &ctx)?;
    assert_eq!(calls_to(&module, main, f), 1);
    assert!(!module.function(f).is_deleted());

    let pass = InliningPass::with_threshold(Some(100));
    assert!(pass.is_global());
    assert!(pass.run_global(&mut module, &ctx)?);
    assert_eq!(calls_to(&module, main, f), 0);
    Ok(())
}

#[test]
fn test_callee_scalar_local_is_fresh_on_every_call() -> Result<()> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();

    // int pick(int c) { int x; if (c) x = 5; return x; }
    let pick = module.define_function("pick", TypeId::I32, &[TypeId::I32])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, pick)?;
    let x = b.alloc(TypeId::I32);
    let set = b.create_block();
    let done = b.create_block();
    let c = b.icmp(CondCode::Ne, Value::Arg(0), Value::int(0));
    b.branch(c, set, done);
    b.switch_to(set);
    b.store(Value::int(5), x)?;
    b.jump(done);
    b.switch_to(done);
    let xv = b.load(x)?;
    b.ret(Some(xv));
    b.finish()?;

    // int main() { int i = 0, s = 0; while (i < 2) { s = pick(i == 0); i = i + 1; } return s; }
    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let i = b.alloc(TypeId::I32);
    let s = b.alloc(TypeId::I32);
    b.store(Value::int(0), i)?;
    b.store(Value::int(0), s)?;
    let header = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    b.jump(header);
    b.switch_to(header);
    let iv = b.load(i)?;
    let c = b.icmp(CondCode::Lt, iv, Value::int(2));
    b.branch(c, body, exit);
    b.switch_to(body);
    let iv = b.load(i)?;
    let first = b.icmp(CondCode::Eq, iv, Value::int(0));
    let first = b.cast(CastOp::Zext, first, TypeId::I32);
    let r = b.call(pick, vec![first]);
    b.store(r, s)?;
    let iv = b.binary(BinaryOp::Add, iv, Value::int(1));
    b.store(iv, i)?;
    b.jump(header);
    b.switch_to(exit);
    let sv = b.load(s)?;
    b.ret(Some(sv));
    b.finish()?;

    let before = run(&module, "")?;
    assert_eq!(before.0, EmValue::Int(0));
    PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;
    assert_eq!(calls_to(&module, main, pick), 0);
    assert_eq!(run(&module, "")?, before);
    Ok(())
}

#[test]
fn test_callee_array_local_is_fresh_on_every_call() -> Result<()> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();

    // void mark(int x) { int buf[2]; if (x == 1) buf[1] = 7; buf[0] = x; putarray(2, buf); }
    let mark = module.define_function("mark", TypeId::VOID, &[TypeId::I32])?;
    let arr_ty = module.types_mut().array_of(TypeId::I32, 2);
    let mut b = FunctionBuilder::new(&mut module, &ctx, mark)?;
    let buf = b.alloc(arr_ty);
    let set = b.create_block();
    let done = b.create_block();
    let c = b.icmp(CondCode::Eq, Value::Arg(0), Value::int(1));
    b.branch(c, set, done);
    b.switch_to(set);
    let second = b.gep(buf, vec![Value::int(0), Value::int(1)])?;
    b.store(Value::int(7), second)?;
    b.jump(done);
    b.switch_to(done);
    let first = b.gep(buf, vec![Value::int(0), Value::int(0)])?;
    b.store(Value::Arg(0), first)?;
    b.call_runtime(RuntimeFunction::PutArray, vec![Value::int(2), first]);
    b.ret(None);
    b.finish()?;

    // int main() { mark(1); mark(2); return 0; } with both calls in one loop
    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let i = b.alloc(TypeId::I32);
    b.store(Value::int(1), i)?;
    let header = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    b.jump(header);
    b.switch_to(header);
    let iv = b.load(i)?;
    let c = b.icmp(CondCode::Lt, iv, Value::int(3));
    b.branch(c, body, exit);
    b.switch_to(body);
    let iv = b.load(i)?;
    b.call(mark, vec![iv]);
    let iv = b.binary(BinaryOp::Add, iv, Value::int(1));
    b.store(iv, i)?;
    b.jump(header);
    b.switch_to(exit);
    b.ret(Some(Value::int(0)));
    b.finish()?;

    let before = run(&module, "")?;
    assert_eq!(before.1, "2: 1 7\n2: 2 0\n");
    PassScheduler::new(PipelineConfig::default()).run(&mut module, &ctx)?;
    assert_eq!(calls_to(&module, main, mark), 0);
    assert_eq!(run(&module, "")?, before);
    assert!(emit_to_string(&module)?.contains("call void @memset("));
    Ok(())
}

#[test]
fn test_dead_code_after_return_adds_no_phi() -> Result<()> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();

    // int twice(int x) { return x * 2; putint(x); }
    let twice = module.define_function("twice", TypeId::I32, &[TypeId::I32])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, twice)?;
    let r = b.binary(BinaryOp::Mul, Value::Arg(0), Value::int(2));
    b.ret(Some(r));
    b.call_runtime(RuntimeFunction::PutInt, vec![Value::Arg(0)]);
    b.finish()?;

    // int main() { return twice(getint()); }
    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let v = b.call_runtime(RuntimeFunction::GetInt, vec![]);
    let r = b.call(twice, vec![v]);
    b.ret(Some(r));
    b.finish()?;

    let before = run(&module, "21")?;
    assert!(InliningPass::new().run_global(&mut module, &ctx)?);
    assert_eq!(calls_to(&module, main, twice), 0);

    let func = module.function(main);
    let phis = func
        .live_blocks()
        .flat_map(|b| func.insts(b))
        .filter(|&i| func.kind(i).is_phi())
        .count();
    assert_eq!(phis, 0);
    assert_eq!(run(&module, "21")?, before);
    assert_eq!(before.0, EmValue::Int(42));
    Ok(())
}
