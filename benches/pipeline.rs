#![allow(unused)]
extern crate sysmir;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::hint::black_box;
use sysmir::{
    compiler::{CompilerContext, PassScheduler, PipelineConfig},
    emit::emit_to_string,
    mir::{BinaryOp, CondCode, FuncId, FunctionBuilder, Module, TypeId, Value},
    Result,
};

/// Builds a module of `count` helper functions, each a counting loop over
/// three locals, plus a `main` that calls every helper.
fn synthetic_module(count: usize) -> Result<(Module, CompilerContext)> {
    let ctx = CompilerContext::new();
    let mut module = Module::new();
    let mut helpers: Vec<FuncId> = Vec::with_capacity(count);

    for index in 0..count {
        let f = module.define_function(format!("helper{index}"), TypeId::I32, &[TypeId::I32])?;
        let mut b = FunctionBuilder::new(&mut module, &ctx, f)?;
        let params = b.spill_arguments()?;
        let i = b.alloc(TypeId::I32);
        let acc = b.alloc(TypeId::I32);
        b.store(Value::int(0), i)?;
        b.store(Value::int(0), acc)?;
        let header = b.create_block();
        let body = b.create_block();
        let exit = b.create_block();
        b.jump(header);

        b.switch_to(header);
        let iv = b.load(i)?;
        let limit = b.load(params[0])?;
        let cond = b.icmp(CondCode::Lt, iv, limit);
        b.branch(cond, body, exit);

        b.switch_to(body);
        let iv = b.load(i)?;
        let av = b.load(acc)?;
        let term = b.binary(BinaryOp::Mul, iv, Value::int(index as i32 + 1));
        let av = b.binary(BinaryOp::Add, av, term);
        b.store(av, acc)?;
        let iv = b.binary(BinaryOp::Add, iv, Value::int(1));
        b.store(iv, i)?;
        b.jump(header);

        b.switch_to(exit);
        let result = b.load(acc)?;
        b.ret(Some(result));
        b.finish()?;
        helpers.push(f);
    }

    let main = module.define_function("main", TypeId::I32, &[])?;
    let mut b = FunctionBuilder::new(&mut module, &ctx, main)?;
    let total = b.alloc(TypeId::I32);
    b.store(Value::int(0), total)?;
    for &helper in &helpers {
        let r = b.call(helper, vec![Value::int(10)]);
        let t = b.load(total)?;
        let t = b.binary(BinaryOp::Add, t, r);
        b.store(t, total)?;
    }
    let t = b.load(total)?;
    b.ret(Some(t));
    b.finish()?;

    Ok((module, ctx))
}

fn bench_pipeline(c: &mut Criterion) {
    let (module, _) = synthetic_module(64).unwrap();
    let functions = module.function_count();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(functions as u64));
    for (name, config) in [
        ("serial", PipelineConfig::default()),
        ("parallel", PipelineConfig::default().with_parallel(true)),
        ("no_inline", PipelineConfig::default().with_inline(false)),
    ] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || synthetic_module(64).unwrap(),
                |(mut module, ctx)| {
                    PassScheduler::new(config.clone())
                        .run(&mut module, &ctx)
                        .unwrap();
                    black_box(module)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();

    let (mut optimized, ctx) = synthetic_module(64).unwrap();
    PassScheduler::new(PipelineConfig::default())
        .run(&mut optimized, &ctx)
        .unwrap();
    c.bench_function("emit", |b| {
        b.iter(|| black_box(emit_to_string(black_box(&optimized)).unwrap()));
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
