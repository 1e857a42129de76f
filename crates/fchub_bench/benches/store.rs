//! Message merge benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fchub_bench::generate_links;
use fchub_core::{HubConfig, MessageEngine, StoreEventHandler};
use fchub_storage::{KeyValueStore, MemoryStore};
use std::sync::Arc;

/// Benchmark merging follows through the full engine.
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_links");
    group.sample_size(20);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for count in [100usize, 1_000].iter() {
        let messages = generate_links(1, *count).unwrap();
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                runtime.block_on(async {
                    let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
                    let config = HubConfig::default();
                    let events = StoreEventHandler::start(db, &config, Vec::new())
                        .await
                        .unwrap();
                    let engine = MessageEngine::new(events, &config);
                    for message in &messages {
                        black_box(engine.merge_message(message).await.unwrap());
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge);

criterion_main!(benches);
