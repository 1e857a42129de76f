//! Keyed store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fchub_bench::random_data;
use fchub_storage::{FileStore, KeyValueStore, MemoryStore, WriteBatch};
use tempfile::TempDir;

fn batch(start: u64, ops: u64, value: &[u8]) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for i in start..start + ops {
        batch.put(i.to_be_bytes().to_vec(), value.to_vec());
    }
    batch
}

/// Benchmark committing batches to a memory store.
fn bench_memory_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_commit");

    for ops in [1u64, 16, 128].iter() {
        group.throughput(Throughput::Elements(*ops));
        group.bench_with_input(BenchmarkId::from_parameter(ops), ops, |b, &ops| {
            let store = MemoryStore::new();
            let value = random_data(128);
            let mut next = 0u64;
            b.iter(|| {
                store.commit(batch(next, ops, &value)).unwrap();
                next += ops;
            });
        });
    }

    group.finish();
}

/// Benchmark committing batches to a file store.
fn bench_file_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_commit");
    group.sample_size(50);

    for ops in [1u64, 16, 128].iter() {
        group.throughput(Throughput::Elements(*ops));
        group.bench_with_input(BenchmarkId::from_parameter(ops), ops, |b, &ops| {
            let temp_dir = TempDir::new().unwrap();
            let store = FileStore::open(&temp_dir.path().join("bench.db"))
                .unwrap()
                .with_sync_on_commit(false);
            let value = random_data(128);
            let mut next = 0u64;
            b.iter(|| {
                store.commit(batch(next, ops, &value)).unwrap();
                next += ops;
            });
        });
    }

    group.finish();
}

/// Benchmark prefix scans over a populated store.
fn bench_prefix_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix_scan");

    let store = MemoryStore::new();
    store.commit(batch(0, 10_000, &random_data(64))).unwrap();

    group.bench_function("count_1k", |b| {
        let prefix = [0u8; 6];
        b.iter(|| {
            let count = store.count_prefix(black_box(&prefix)).unwrap();
            black_box(count);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_memory_commit, bench_file_commit, bench_prefix_scan);

criterion_main!(benches);
