//! Benchmarks for isolated evaluation.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shadow_eval::prelude::*;
use shadow_eval::GlobalSnapshot;

/// Cost of building a shadow global, snapshot, and scope layers.
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let mut context = Context::default();

    group.bench_function("evaluate_simple", |b| {
        b.iter(|| {
            let callable = evaluate(&mut context, black_box("return 1 + 1"), &JsValue::undefined(), None).unwrap();
            black_box(callable)
        });
    });

    group.bench_function("evaluate_with_params", |b| {
        b.iter(|| {
            let callable = evaluate_with_params(&mut context, ["a", "b"], black_box("return a + b"), None).unwrap();
            black_box(callable)
        });
    });

    group.bench_function("snapshot_ambient_global", |b| {
        let global = context.global_object();
        b.iter(|| black_box(GlobalSnapshot::capture(&global, &mut context).unwrap()));
    });

    group.finish();
}

/// Invocation of an already compiled callable.
fn bench_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution");
    let mut context = Context::default();
    let none = JsValue::undefined();

    let simple = evaluate(&mut context, "return 1 + 1", &none, None).unwrap();
    group.bench_function("simple_return", |b| {
        b.iter(|| black_box(simple.call(&[], &mut context).unwrap()));
    });

    let looping = evaluate(
        &mut context,
        "var sum = 0; for (var i = 0; i < 100; i++) { sum += i; } return sum",
        &none,
        None,
    )
    .unwrap();
    group.bench_function("loop_100", |b| {
        b.iter(|| black_box(looping.call(&[], &mut context).unwrap()));
    });

    let strings = evaluate(
        &mut context,
        "var s = ''; for (var i = 0; i < 100; i++) { s += 'hello'; } return s.length",
        &none,
        None,
    )
    .unwrap();
    group.bench_function("string_ops", |b| {
        b.iter(|| black_box(strings.call(&[], &mut context).unwrap()));
    });

    group.finish();
}

/// Re-entrant sandboxing through the `eval` alias, nested `depth` times.
fn bench_nested_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_eval");
    group.sample_size(20);
    let mut context = Context::default();

    for depth in [1usize, 2, 4].iter() {
        let mut code = "return 1".to_string();
        for _ in 0..*depth {
            code = format!("return eval({code:?})");
        }
        let callable = evaluate(&mut context, &code, &JsValue::undefined(), None).unwrap();
        group.throughput(Throughput::Elements(*depth as u64));
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, _| {
            b.iter(|| black_box(callable.call(&[], &mut context).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_execution, bench_nested_eval);
criterion_main!(benches);
