//! Merge, CSV round trip and full synchronization benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use edusync_bench::{diverge, generate_tasks};
use edusync_core::{merge, ConflictPolicy, Task};
use edusync_storage::TransactionalFileStore;
use edusync_sync_engine::{
    CsvLocalPort, EntitySynchronizer, LocalDataPort, MemoryRemoteClient, RelationalRemotePort,
    RemoteDataPort, RetryConfig, Synchronizer,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Benchmark merging two diverged record sets.
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for count in [100, 1_000, 10_000].iter() {
        let local = generate_tasks(*count);
        let remote = diverge(&local, 10);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let outcome = merge(black_box(&local), black_box(&remote), ConflictPolicy::RemoteWins);
                black_box(outcome);
            });
        });
    }

    group.finish();
}

/// Benchmark writing then reading a CSV file.
fn bench_csv_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("csv_round_trip");
    group.sample_size(30);

    for count in [100, 1_000].iter() {
        let temp_dir = TempDir::new().unwrap();
        let port = CsvLocalPort::<Task>::new(
            TransactionalFileStore::new(),
            temp_dir.path().join("tasks.csv"),
        );
        let tasks = generate_tasks(*count);

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                port.write_all(black_box(&tasks)).unwrap();
                black_box(port.read_all().unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark one synchronization against the in-memory remote.
fn bench_synchronize(c: &mut Criterion) {
    let mut group = c.benchmark_group("synchronize");
    group.sample_size(20);

    for count in [100, 1_000].iter() {
        let temp_dir = TempDir::new().unwrap();
        let local = Arc::new(CsvLocalPort::<Task>::new(
            TransactionalFileStore::new(),
            temp_dir.path().join("tasks.csv"),
        ));
        let client = Arc::new(MemoryRemoteClient::new());
        let remote = Arc::new(RelationalRemotePort::<Task>::new(
            client,
            "task",
            RetryConfig::new(1),
        ));
        let tasks = generate_tasks(*count);
        local.write_all(&tasks).unwrap();
        remote.write_all(&diverge(&tasks, 10)).unwrap();
        let sync = EntitySynchronizer::<Task>::new(local, remote);

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| black_box(sync.synchronize().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge, bench_csv_round_trip, bench_synchronize);
criterion_main!(benches);
