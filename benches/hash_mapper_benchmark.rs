//! Performance benchmarks for hashset-cache
//!
//! This benchmark suite measures:
//! - Hash mapper conversion (to_entries / from_entries) across batch sizes
//! - CacheService hash operations over the in-memory backend
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hashset_cache::backend::InMemoryBackend;
use hashset_cache::hash::{from_entries, to_entries};
use hashset_cache::{hash_entity, CacheService, CommandFlags};
use serde::{Deserialize, Serialize};
use std::hint::black_box;

// ============================================================================
// Benchmark Test Fixtures
// ============================================================================

/// Benchmark entity with configurable data size
#[derive(Clone, Serialize, Deserialize)]
struct BenchEntity {
    id: u64,
    name: String,
    data: Vec<u8>,
}

hash_entity!(BenchEntity { id });

fn batch(count: usize, payload: usize) -> Vec<BenchEntity> {
    (0..count as u64)
        .map(|id| BenchEntity {
            id,
            name: format!("entity-{}", id),
            data: vec![7u8; payload],
        })
        .collect()
}

// ============================================================================
// Group 1: Hash Mapper Benchmarks
// ============================================================================

fn mapper_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_mapper");

    for count in [10, 100, 1_000].iter() {
        let entities = batch(*count, 256);
        let entries = to_entries(&entities).expect("Failed to map");

        group
            .throughput(Throughput::Elements(*count as u64))
            .bench_with_input(BenchmarkId::new("to_entries", count), count, |b, _| {
                b.iter(|| to_entries(black_box(&entities)).expect("Failed to map"));
            });

        group
            .throughput(Throughput::Elements(*count as u64))
            .bench_with_input(BenchmarkId::new("from_entries", count), count, |b, _| {
                b.iter(|| {
                    from_entries::<BenchEntity, _>(black_box(entries.clone()))
                        .expect("Failed to decode")
                });
            });
    }

    group.finish();
}

// ============================================================================
// Group 2: CacheService Benchmarks
// ============================================================================

fn service_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_service");

    // Create tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    for count in [10, 100, 1_000].iter() {
        let entities = batch(*count, 256);

        group
            .throughput(Throughput::Elements(*count as u64))
            .bench_with_input(BenchmarkId::new("hash_set", count), count, |b, _| {
                let cache = CacheService::new(InMemoryBackend::new());

                b.to_async(&rt).iter(|| async {
                    cache
                        .hash_set(black_box(&entities), CommandFlags::None)
                        .await
                        .expect("Failed to hash_set")
                });
            });

        group
            .throughput(Throughput::Elements(*count as u64))
            .bench_with_input(BenchmarkId::new("hash_get_all", count), count, |b, _| {
                let cache = CacheService::new(InMemoryBackend::new());
                rt.block_on(async {
                    cache
                        .hash_set(&entities, CommandFlags::None)
                        .await
                        .expect("Failed to hash_set");
                });

                b.to_async(&rt).iter(|| async {
                    cache
                        .hash_get_all::<BenchEntity>(CommandFlags::None)
                        .await
                        .expect("Failed to hash_get_all")
                });
            });
    }

    // Single field lookups - batch size doesn't matter
    group.bench_function("hash_get_hit", |b| {
        let cache = CacheService::new(InMemoryBackend::new());
        rt.block_on(async {
            cache
                .hash_set(&batch(100, 256), CommandFlags::None)
                .await
                .expect("Failed to hash_set");
        });

        b.to_async(&rt).iter(|| async {
            cache
                .hash_get::<BenchEntity>(black_box("42"), CommandFlags::None)
                .await
        });
    });

    group.bench_function("hash_get_miss", |b| {
        let cache = CacheService::new(InMemoryBackend::new());

        b.to_async(&rt).iter(|| async {
            cache
                .hash_get::<BenchEntity>(black_box("missing"), CommandFlags::None)
                .await
        });
    });

    group.finish();
}

criterion_group!(benches, mapper_benchmarks, service_benchmarks);
criterion_main!(benches);
