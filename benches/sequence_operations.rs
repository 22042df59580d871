use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use seqflow::prelude::*;
use tokio::runtime::Runtime;

fn bench_basic_combinators(c: &mut Criterion) {
    let rt = Runtime::new().expect("failed to build runtime");

    let mut group = c.benchmark_group("basic_combinators");

    for size in [1_000u64, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("apply_filter", size), size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let result = range(0, size, 1)
                    .apply(|x| black_box(x * 2))
                    .filter(|x| black_box(x % 4 == 0))
                    .to_vec()
                    .await;
                black_box(result)
            });
        });

        group.bench_with_input(BenchmarkId::new("batch_accumulate", size), size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let result = range(0, size, 1)
                    .accumulate()
                    .batch(100)
                    .apply(|chunk| black_box(chunk.len()))
                    .to_vec()
                    .await;
                black_box(result)
            });
        });

        group.bench_with_input(BenchmarkId::new("drive_early_stop", size), size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let mut seen = 0u64;
                count(0u64, 1)
                    .drive(|x| {
                        seen += black_box(x);
                        x + 1 < size
                    })
                    .await;
                black_box(seen)
            });
        });
    }

    group.finish();
}

fn bench_combinatorics(c: &mut Criterion) {
    let rt = Runtime::new().expect("failed to build runtime");

    let mut group = c.benchmark_group("combinatorics");

    for n in [6usize, 8].iter() {
        group.bench_with_input(BenchmarkId::new("permutations", n), n, |b, &n| {
            b.to_async(&rt).iter(|| async move {
                let result = permutations((0..n).collect::<Vec<_>>(), n / 2).to_vec().await;
                black_box(result.len())
            });
        });

        group.bench_with_input(BenchmarkId::new("combinations", n), n, |b, &n| {
            b.to_async(&rt).iter(|| async move {
                let result = combinations((0..n * 2).collect::<Vec<_>>(), n).to_vec().await;
                black_box(result.len())
            });
        });
    }

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let rt = Runtime::new().expect("failed to build runtime");

    let mut group = c.benchmark_group("concurrent");

    for branches in [2usize, 4].iter() {
        group.bench_with_input(BenchmarkId::new("tee_drain", branches), branches, |b, &branches| {
            b.to_async(&rt).iter(|| async move {
                let mut total = 0;
                for branch in tee(range(0u32, 10_000, 1), branches) {
                    total += branch.to_vec().await.len();
                }
                black_box(total)
            });
        });
    }

    for workers in [1usize, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("pool_map", workers), workers, |b, &workers| {
            b.to_async(&rt).iter(|| async move {
                let result = pool_map(range(0u64, 10_000, 1), workers, |x| async move { black_box(x * x) })
                    .to_vec()
                    .await;
                black_box(result.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_basic_combinators, bench_combinatorics, bench_concurrent);
criterion_main!(benches);
