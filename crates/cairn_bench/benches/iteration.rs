//! Read and iteration benchmarks.

use cairn_bench::{generate_entries, ordered_key, populate};
use cairn_core::MARKET_DATA;
use cairn_plugin_api::SegmentedKeyValueStorage;
use cairn_testkit::TestStorage;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

const POPULATION: u64 = 10_000;

fn populated() -> TestStorage {
    let storage = TestStorage::compact();
    let entries = generate_entries(POPULATION, 128);
    populate(&*storage, &MARKET_DATA, &entries, 1000);
    storage
}

/// Benchmark full segment streams.
fn bench_stream(c: &mut Criterion) {
    let storage = populated();
    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Elements(POPULATION));

    group.bench_function("entries", |b| {
        b.iter(|| {
            let count = storage.stream(&MARKET_DATA).unwrap().count();
            black_box(count);
        });
    });

    group.bench_function("keys", |b| {
        b.iter(|| {
            let count = storage.stream_keys(&MARKET_DATA).unwrap().count();
            black_box(count);
        });
    });
    group.finish();
}

/// Benchmark bounded range streams.
fn bench_range(c: &mut Criterion) {
    let storage = populated();
    let mut group = c.benchmark_group("range");

    for width in [10u64, 100, 1000] {
        group.throughput(Throughput::Elements(width));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let start = rng.gen_range(0..POPULATION - width);
                let count = storage
                    .stream_from_key_to(&MARKET_DATA, &ordered_key(start), &ordered_key(start + width - 1))
                    .unwrap()
                    .count();
                black_box(count);
            });
        });
    }
    group.finish();
}

/// Benchmark point and nearest-key lookups.
fn bench_lookup(c: &mut Criterion) {
    let storage = populated();
    let mut group = c.benchmark_group("lookup");

    group.bench_function("get", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let key = ordered_key(rng.gen_range(0..POPULATION));
            black_box(storage.get(&MARKET_DATA, &key).unwrap());
        });
    });

    group.bench_function("nearest", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let key = ordered_key(rng.gen_range(0..POPULATION * 2));
            black_box(storage.get_nearest_to(&MARKET_DATA, &key).unwrap());
        });
    });
    group.finish();
}

/// Benchmark snapshot reads.
fn bench_snapshot(c: &mut Criterion) {
    let storage = populated();
    let snappable = storage.as_snappable().unwrap();

    c.bench_function("snapshot_take_and_read", |b| {
        b.iter(|| {
            let snapshot = snappable.take_snapshot().unwrap();
            black_box(snapshot.get(&MARKET_DATA, &ordered_key(42)).unwrap());
        });
    });
}

criterion_group!(benches, bench_stream, bench_range, bench_lookup, bench_snapshot);

criterion_main!(benches);
