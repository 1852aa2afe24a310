//! Transaction commit benchmarks.

use cairn_bench::{generate_entries, ordered_key, populate, random_data};
use cairn_core::{BLOTTER, MARKET_DATA};
use cairn_plugin_api::DataStorageFormat;
use cairn_testkit::TestStorage;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark single-put commits in both formats.
fn bench_single_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_put");

    for format in DataStorageFormat::ALL {
        for size in [64usize, 1024, 16 * 1024] {
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(format.to_string(), size),
                &size,
                |b, &size| {
                    let storage = TestStorage::open(format);
                    let data = random_data(size);
                    let mut i = 0u64;

                    b.iter(|| {
                        i += 1;
                        let mut txn = storage.start_transaction().unwrap();
                        txn.put(&MARKET_DATA, &ordered_key(i), black_box(&data))
                            .unwrap();
                        txn.commit().unwrap();
                    });
                },
            );
        }
    }
    group.finish();
}

/// Benchmark batched commits.
fn bench_batch_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_commit");

    for batch_size in [10u64, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &batch_size| {
                let storage = TestStorage::compact();
                let entries = generate_entries(batch_size, 256);

                b.iter(|| {
                    populate(&*storage, &BLOTTER, black_box(&entries), entries.len());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark commits spanning several segments.
fn bench_multi_segment_commit(c: &mut Criterion) {
    c.bench_function("multi_segment_commit", |b| {
        let storage = TestStorage::archive();
        let data = random_data(256);
        let mut i = 0u64;

        b.iter(|| {
            i += 1;
            let key = ordered_key(i);
            let mut txn = storage.start_transaction().unwrap();
            txn.put(&MARKET_DATA, &key, &data).unwrap();
            txn.put(&BLOTTER, &key, &data).unwrap();
            txn.commit().unwrap();
        });
    });
}

/// Benchmark rolled back transactions.
fn bench_rollback(c: &mut Criterion) {
    c.bench_function("rollback", |b| {
        let storage = TestStorage::compact();
        let data = random_data(256);

        b.iter(|| {
            let mut txn = storage.start_transaction().unwrap();
            for i in 0..10 {
                txn.put(&MARKET_DATA, &ordered_key(i), &data).unwrap();
            }
            txn.rollback().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_single_put,
    bench_batch_commit,
    bench_multi_segment_commit,
    bench_rollback,
);

criterion_main!(benches);
