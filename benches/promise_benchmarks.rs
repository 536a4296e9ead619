//! Performance benchmarks for Quickpromise
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Settling a fresh promise and draining its reaction
//! - Long `then` chains
//! - Thenable flattening depth
//! - Combinator fan-out

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quickpromise::{EventLoop, Function, Runtime, Value};
use std::rc::Rc;

fn setup() -> (Rc<EventLoop>, Runtime) {
    let event_loop = Rc::new(EventLoop::new());
    let runtime = Runtime::new(event_loop.clone());
    (event_loop, runtime)
}

/// Benchmark: one promise, one reaction
fn bench_settle(c: &mut Criterion) {
    c.bench_function("settle_and_react", |b| {
        let (event_loop, runtime) = setup();
        b.iter(|| {
            let derived = runtime.resolve(black_box(1)).then_fn(Ok);
            event_loop.run_until_idle();
            black_box(derived.value())
        })
    });
}

/// Benchmark: chains of `then` links
fn bench_chain_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_depth");

    for depth in [10u64, 100, 1000] {
        group.throughput(Throughput::Elements(depth));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let (event_loop, runtime) = setup();
            b.iter(|| {
                let mut tail = runtime.resolve(0);
                for _ in 0..depth {
                    tail = tail.then_fn(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) + 1.0)));
                }
                event_loop.run_until_idle();
                black_box(tail.value())
            })
        });
    }

    group.finish();
}

/// Benchmark: nested thenables flattened by the resolution procedure
fn bench_thenable_nesting(c: &mut Criterion) {
    fn thenable(inner: Value) -> Value {
        let then = Function::new("then", move |_this, args| match args.first() {
            Some(Value::Function(resolve)) => resolve.call(&Value::Undefined, &[inner.clone()]),
            _ => Ok(Value::Undefined),
        });
        Value::object([("then", Value::from(then))])
    }

    let mut group = c.benchmark_group("thenable_nesting");

    for depth in [4usize, 32, 128] {
        let mut nested = Value::from(42);
        for _ in 0..depth {
            nested = thenable(nested);
        }
        group.bench_with_input(BenchmarkId::from_parameter(depth), &nested, |b, nested| {
            let (event_loop, runtime) = setup();
            b.iter(|| {
                let adopted = runtime.resolve(nested.clone());
                event_loop.run_until_idle();
                black_box(adopted.value())
            })
        });
    }

    group.finish();
}

/// Benchmark: combinators over many inputs
fn bench_combinators(c: &mut Criterion) {
    let mut group = c.benchmark_group("combinators");

    for width in [10u64, 100, 1000] {
        group.throughput(Throughput::Elements(width));

        group.bench_with_input(BenchmarkId::new("all", width), &width, |b, &width| {
            let (event_loop, runtime) = setup();
            b.iter(|| {
                let inputs: Vec<Value> = (0..width).map(|i| Value::from(runtime.resolve(i as f64))).collect();
                let combined = runtime.all(&Value::from(inputs));
                event_loop.run_until_idle();
                black_box(combined.value())
            })
        });

        group.bench_with_input(BenchmarkId::new("all_settled", width), &width, |b, &width| {
            let (event_loop, runtime) = setup();
            b.iter(|| {
                let inputs: Vec<Value> = (0..width)
                    .map(|i| {
                        let promise = if i % 2 == 0 {
                            runtime.resolve(i as f64)
                        } else {
                            runtime.reject(i as f64)
                        };
                        Value::from(promise)
                    })
                    .collect();
                let combined = runtime.all_settled(&Value::from(inputs));
                event_loop.run_until_idle();
                black_box(combined.value())
            })
        });

        group.bench_with_input(BenchmarkId::new("race", width), &width, |b, &width| {
            let (event_loop, runtime) = setup();
            b.iter(|| {
                let inputs: Vec<Value> = (0..width).map(|i| Value::from(runtime.resolve(i as f64))).collect();
                let combined = runtime.race(&Value::from(inputs));
                event_loop.run_until_idle();
                black_box(combined.value())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_settle,
    bench_chain_depth,
    bench_thenable_nesting,
    bench_combinators,
);

criterion_main!(benches);
