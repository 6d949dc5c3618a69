//! Module Cache Benchmark Suite
//!
//! Measures the bounded module cache under the access patterns the loader
//! produces:
//! - Repeated hits on a warm cache
//! - Inserts into a full cache (oldest-entry eviction)
//! - Expired-entry sweeps
//!
//! Run with:
//!   cargo bench --bench module_cache

use std::sync::Arc;
use std::time::Duration;

use chtl_modsys::modules::ModuleCache;
use chtl_modsys::ModuleDescriptor;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn module(i: usize) -> Arc<ModuleDescriptor> {
    Arc::new(ModuleDescriptor::new(format!("module{}", i), "1.0.0"))
}

fn key(i: usize) -> String {
    format!("/modules/module{}.chtl", i)
}

fn bench_warm_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_hits");
    for size in [100usize, 1_000] {
        let cache = ModuleCache::new(size, Duration::from_secs(1800));
        for i in 0..size {
            cache.put(key(i), module(i));
        }
        let keys: Vec<_> = (0..size).map(key).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &keys, |b, keys| {
            b.iter(|| {
                for k in keys {
                    black_box(cache.get(k));
                }
            })
        });
    }
    group.finish();
}

fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_eviction");
    for size in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let cache = ModuleCache::new(size, Duration::from_secs(1800));
            let modules: Vec<_> = (0..size * 2).map(module).collect();
            b.iter(|| {
                for (i, m) in modules.iter().enumerate() {
                    cache.put(key(i), Arc::clone(m));
                }
                black_box(cache.len())
            })
        });
    }
    group.finish();
}

fn bench_expired_sweep(c: &mut Criterion) {
    c.bench_function("cache_evict_expired_1000", |b| {
        b.iter_batched(
            || {
                let cache = ModuleCache::new(1_000, Duration::ZERO);
                for i in 0..1_000 {
                    cache.put(key(i), module(i));
                }
                cache
            },
            |cache| black_box(cache.evict_expired()),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_warm_hits, bench_eviction, bench_expired_sweep);
criterion_main!(benches);
