//! Benchmark suite for hsk-algo
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hsk_algo::{Drafter, ReviewOutcome, WeightMap};

fn partition(n: usize) -> WeightMap {
    WeightMap::with_keys((0..n).map(|i| format!("word{:05}", i)))
}

fn bench_draft(c: &mut Criterion) {
    let mut group = c.benchmark_group("Drafter::draft");
    for n in [30, 180, 2_000] {
        let weights = partition(n);
        let mut drafter = Drafter::with_seed(42);
        group.bench_with_input(BenchmarkId::from_parameter(n), &weights, |b, w| {
            b.iter(|| drafter.draft(black_box(w)))
        });
    }
    group.finish();
}

fn bench_reinforce_success(c: &mut Criterion) {
    let mut group = c.benchmark_group("Drafter::reinforce");
    for n in [30, 180, 2_000] {
        let mut weights = partition(n);
        let mut drafter = Drafter::with_seed(42);
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter(|| drafter.reinforce(&mut weights, "word00000", ReviewOutcome::Success))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_draft, bench_reinforce_success);
criterion_main!(benches);
