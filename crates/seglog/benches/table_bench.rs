//! Benchmarks for the segmented metric table.
//!
//! Run with: cargo bench --package seglog
//!
//! ## Benchmark Categories
//!
//! - **Ingest**: add throughput across batch sizes, single producer
//! - **Contended ingest**: several producers appending concurrently
//! - **Consume**: full-prefix read throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seglog::{Metric, Table};
use std::thread;

/// Batches submitted per measured iteration, so one iteration covers
/// multiple publications without growing the table unboundedly.
const BATCHES_PER_ITER: usize = 64;

fn generate_batch(len: usize) -> Vec<Metric> {
    (0..len as u32)
        .map(|i| Metric::new(i, 1_700_000_000 + i, 50.0 + (f64::from(i) * 0.1).sin()))
        .collect()
}

fn bench_add_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");
    for batch_size in [32usize, 64, 128, 500, 1000, 5000] {
        let batch = generate_batch(batch_size);
        group.throughput(Throughput::Elements((batch_size * BATCHES_PER_ITER) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch,
            |b, batch| {
                b.iter_batched(
                    Table::new,
                    |table| {
                        for _ in 0..BATCHES_PER_ITER {
                            table.add(black_box(batch));
                        }
                        table
                    },
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_add_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_contended");
    let batch = generate_batch(500);
    for producers in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(
            (batch.len() * BATCHES_PER_ITER * producers) as u64,
        ));
        group.bench_with_input(
            BenchmarkId::from_parameter(producers),
            &producers,
            |b, &producers| {
                b.iter_batched(
                    Table::new,
                    |table| {
                        thread::scope(|s| {
                            let table = &table;
                            let batch = &batch;
                            for _ in 0..producers {
                                s.spawn(move || {
                                    for _ in 0..BATCHES_PER_ITER {
                                        table.add(black_box(batch));
                                    }
                                });
                            }
                        });
                        table
                    },
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_consume(c: &mut Criterion) {
    let mut group = c.benchmark_group("consume");
    let total = 1_000_000usize;
    let table = Table::new();
    for chunk in generate_batch(total).chunks(10_000) {
        table.add(chunk);
    }

    group.throughput(Throughput::Elements(total as u64));
    group.bench_function("full_prefix_1m", |b| {
        b.iter(|| {
            let mut sum = 0.0f64;
            table
                .consume(0, total as u64, |m| sum += m.value)
                .expect("prefix is published");
            black_box(sum)
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_add_throughput,
    bench_add_contended,
    bench_consume
);
criterion_main!(benches);
