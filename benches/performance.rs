//! Performance benchmarks for the state cell.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rill::Store;

#[derive(Clone)]
struct Document {
    revision: u64,
    body: String,
}

fn new_store() -> Store<Document> {
    Store::new(Document {
        revision: 0,
        body: "benchmark".to_string(),
    })
}

/// Cost of one read-compute-publish commit with no observers.
fn bench_update_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_commit");

    group.bench_function("increment", |b| {
        let store = new_store();
        b.iter(|| {
            store.update(|doc| doc.revision += 1);
            black_box(store.latest());
        });
    });

    group.finish();
}

/// Commit cost as live selections multiply.
fn bench_selection_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection_fanout");

    for selections in [1, 8, 64] {
        group.bench_with_input(
            BenchmarkId::new("selections", selections),
            &selections,
            |b, &count| {
                let store = new_store();
                let views: Vec<_> = (0..count)
                    .map(|_| store.select(|doc: &Document| doc.revision))
                    .collect();

                b.iter(|| {
                    store.update(|doc| doc.revision += 1);
                    black_box(views[0].latest());
                });
            },
        );
    }

    group.finish();
}

/// Broadcast cost as subscriber queues multiply.
fn bench_broadcast_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_fanout");

    for subscribers in [1, 8, 64] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &count| {
                let store = new_store();
                let handles: Vec<_> = (0..count).map(|_| store.changes()).collect();

                b.iter(|| {
                    store.update(|doc| doc.revision += 1);
                    for handle in &handles {
                        while handle.try_recv().is_ok() {}
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_update_commit,
    bench_selection_fanout,
    bench_broadcast_fanout
);
criterion_main!(benches);
