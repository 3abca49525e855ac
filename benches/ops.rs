//! Micro-operation benchmarks for the cache orchestration layer.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency of the cache over the in-memory store,
//! including the availability check and outcome recording, with the default
//! counters and with a no-op recorder.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use guardcache::builder::CacheBuilder;
use guardcache::cache::{Cache, CoreCache};
use guardcache::metrics::NoopRecorder;
use guardcache::store::HashMapStore;

const ENTRIES: u64 = 16_384;
const OPS: u64 = 100_000;

fn populated(recorder_enabled: bool) -> Cache<u64, u64> {
    let builder: CacheBuilder<u64, u64> = CacheBuilder::new(HashMapStore::new()).name("bench");
    let builder = if recorder_enabled {
        builder
    } else {
        builder.outcome_recorder(Arc::new(NoopRecorder))
    };
    let cache = builder.build();
    cache.init().expect("init");
    cache
        .put_all((0..ENTRIES).map(|i| (i, i)))
        .expect("populate");
    cache
}

// ============================================================================
// Single-key operations (ns/op)
// ============================================================================

fn bench_single_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_key_ns");
    group.throughput(Throughput::Elements(OPS));

    for recorded in [true, false] {
        let label = if recorded { "counters" } else { "noop" };

        group.bench_function(BenchmarkId::new("get_hit", label), |b| {
            let cache = populated(recorded);
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    for i in 0..OPS {
                        black_box(cache.get(&(i % ENTRIES)).ok());
                    }
                }
                start.elapsed()
            })
        });

        group.bench_function(BenchmarkId::new("get_miss", label), |b| {
            let cache = populated(recorded);
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    for i in 0..OPS {
                        black_box(cache.get(&(ENTRIES + i)).ok());
                    }
                }
                start.elapsed()
            })
        });

        group.bench_function(BenchmarkId::new("put", label), |b| {
            let cache = populated(recorded);
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    for i in 0..OPS {
                        black_box(cache.put(i % ENTRIES, i).ok());
                    }
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Bulk operations
// ============================================================================

fn bench_bulk(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk");

    for batch in [8usize, 64, 512] {
        let keys: Vec<u64> = (0..batch as u64).map(|i| i * 3).collect();
        group.throughput(Throughput::Elements(batch as u64));

        group.bench_with_input(BenchmarkId::new("get_all", batch), &keys, |b, keys| {
            let cache = populated(false);
            b.iter(|| black_box(cache.get_all(keys).ok()))
        });

        group.bench_with_input(BenchmarkId::new("load_absent", batch), &keys, |b, keys| {
            let cache = populated(false);
            b.iter(|| {
                black_box(
                    cache
                        .load_all(keys, false, |absent| {
                            Ok(absent.iter().map(|k| (*k, Arc::new(*k))).collect())
                        })
                        .ok(),
                )
            })
        });
    }

    group.finish();
}

// ============================================================================
// Iteration
// ============================================================================

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("iteration");
    group.throughput(Throughput::Elements(ENTRIES));

    group.bench_function("iter_quiet_full", |b| {
        let cache = populated(false);
        b.iter(|| {
            let live = cache
                .iter_quiet()
                .expect("available")
                .filter(Result::is_ok)
                .count();
            black_box(live)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_single_key, bench_bulk, bench_iteration);
criterion_main!(benches);
