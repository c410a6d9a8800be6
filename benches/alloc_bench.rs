//! Comprehensive benchmarks for the membind library.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use membind::kinds;

const SMALL_SIZE: usize = 64; // cache line
const MEDIUM_SIZE: usize = 4 * 1024; // page
const LARGE_SIZE: usize = 1024 * 1024; // 1MB

fn bench_default_malloc_free(c: &mut Criterion) {
    let kind = kinds::default();
    let mut group = c.benchmark_group("Default Kind malloc/free");

    for &size in &[SMALL_SIZE, MEDIUM_SIZE, LARGE_SIZE] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let ptr = membind::malloc(&kind, black_box(size));
                assert!(!ptr.is_null());
                unsafe { membind::free(&kind, ptr) };
            });
        });
    }

    group.finish();
}

fn bench_arena_routed_malloc_free(c: &mut Criterion) {
    let kind = kinds::hugetlb();
    let mut group = c.benchmark_group("Arena-Routed malloc/free");

    for &size in &[SMALL_SIZE, MEDIUM_SIZE, LARGE_SIZE] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let ptr = membind::malloc(&kind, black_box(size));
                assert!(!ptr.is_null());
                unsafe { membind::free(&kind, ptr) };
            });
        });
    }

    group.finish();
}

fn bench_std_alloc_baseline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Std Alloc Baseline");

    for &size in &[SMALL_SIZE, MEDIUM_SIZE, LARGE_SIZE] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let layout = std::alloc::Layout::from_size_align(size, 8).unwrap();
                let ptr = unsafe { std::alloc::alloc(layout) };
                assert!(!ptr.is_null());
                unsafe { std::alloc::dealloc(black_box(ptr), layout) };
            });
        });
    }

    group.finish();
}

fn bench_arena_resolution(c: &mut Criterion) {
    let kind = kinds::hugetlb();
    // Force the one-time build out of the measured loop.
    kind.arena_for_current_cpu().unwrap();

    c.bench_function("arena resolution (hot)", |b| {
        b.iter(|| black_box(kind.arena_for_current_cpu().unwrap()));
    });
}

fn bench_registry_lookup(c: &mut Criterion) {
    c.bench_function("kind lookup by name", |b| {
        b.iter(|| black_box(membind::get_kind_by_name("membind_hbw").unwrap()));
    });

    c.bench_function("kind lookup by partition", |b| {
        b.iter(|| black_box(membind::get_kind_by_partition(kinds::PARTITION_HBW).unwrap()));
    });
}

fn bench_nodemask_build(c: &mut Criterion) {
    let kind = kinds::default();

    c.bench_function("nodemask build", |b| {
        b.iter(|| black_box(kind.mbind_nodemask(black_box(1024)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_default_malloc_free,
    bench_arena_routed_malloc_free,
    bench_std_alloc_baseline,
    bench_arena_resolution,
    bench_registry_lookup,
    bench_nodemask_build
);
criterion_main!(benches);
