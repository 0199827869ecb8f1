//! # Depenetration Solver Benchmark
//!
//! Cost of combining 1..16 contact corrections into one displacement.
//!
//! Run with: `cargo bench --package kcc_core --bench solver_benchmark`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kcc_core::{Resolver, Vec3};

/// Corrections evenly spread over the upper hemisphere.
fn fill(resolver: &mut Resolver, count: usize) {
    resolver.reset();
    for i in 0..count {
        #[allow(clippy::cast_precision_loss)]
        let angle = i as f32 / count as f32 * std::f32::consts::TAU;
        let direction = Vec3::new(angle.cos(), 0.4, angle.sin()).normalize();
        resolver.add_correction(direction, 0.05 + 0.01 * (i % 3) as f32);
    }
}

fn bench_compute_best(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_best");
    let mut resolver = Resolver::new();

    for count in [1, 2, 3, 4, 8, 16] {
        fill(&mut resolver, count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(resolver.compute_best(12, 0.0001)));
        });
    }

    group.finish();
}

fn bench_error_descent_vs_gradient(c: &mut Criterion) {
    let mut resolver = Resolver::new();
    fill(&mut resolver, 6);

    c.bench_function("error_descent_6", |b| {
        b.iter(|| black_box(resolver.compute_error_descent(12, 0.0001)));
    });
    c.bench_function("gradient_descent_6", |b| {
        b.iter(|| black_box(resolver.compute_gradient_descent(12, 0.0001)));
    });
}

criterion_group!(benches, bench_compute_best, bench_error_descent_vs_gradient);
criterion_main!(benches);
