//! Merkle trie benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fchub_bench::random_sync_ids;
use fchub_storage::MemoryStore;
use fchub_trie::{MerkleTrie, TrieConfig};
use std::sync::Arc;

fn open_trie(config: TrieConfig) -> MerkleTrie {
    MerkleTrie::open(Arc::new(MemoryStore::new()), config).unwrap()
}

/// Benchmark inserting batches of sync ids into an empty trie.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("trie_insert");

    for count in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let ids = random_sync_ids(count, 100_000_000);
            b.iter(|| {
                let mut trie = open_trie(TrieConfig::default());
                for id in &ids {
                    black_box(trie.insert(id).unwrap());
                }
                black_box(trie.root_hash());
            });
        });
    }

    group.finish();
}

/// Benchmark inserting with frequent unloading, which forces reloads from the store.
fn bench_insert_with_unload(c: &mut Criterion) {
    let mut group = c.benchmark_group("trie_insert_unload");
    group.sample_size(20);

    let ids = random_sync_ids(5_000, 100_000_000);
    group.throughput(Throughput::Elements(ids.len() as u64));
    group.bench_function("threshold_500", |b| {
        b.iter(|| {
            let mut trie = open_trie(TrieConfig::new().unload_threshold(500));
            for id in &ids {
                black_box(trie.insert(id).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark snapshots and existence checks on a populated trie.
fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("trie_read");

    let ids = random_sync_ids(10_000, 100_000_000);
    let mut trie = open_trie(TrieConfig::default());
    for id in &ids {
        trie.insert(id).unwrap();
    }

    group.bench_function("exists", |b| {
        let mut idx = 0;
        b.iter(|| {
            let result = trie.exists(black_box(&ids[idx])).unwrap();
            idx = (idx + 1) % ids.len();
            black_box(result);
        });
    });

    group.bench_function("snapshot", |b| {
        b.iter(|| {
            let snapshot = trie.get_snapshot(black_box(b"0050000000")).unwrap();
            black_box(snapshot);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_insert_with_unload, bench_reads);

criterion_main!(benches);
