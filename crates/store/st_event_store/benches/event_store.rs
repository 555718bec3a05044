//! Insert and query throughput for the main planner drivers.

use criterion::{criterion_group, criterion_main, Criterion};

use st_event_store::{EventStore, EventStoreConfig, QueryExpr};
use st_trace_types::{CallSite, TraceEvent};

// ---

const NUM_EVENTS: usize = 100_000;

fn synthetic_event(i: usize) -> TraceEvent {
    let mut event = TraceEvent::new(
        format!("ev-{i:08}"),
        i as i64,
        (i % 64) as u64,
        CallSite::new("bench_mod", "bench_fun", 2),
        "call",
    );
    if i % 4 == 0 {
        event = event.with_correlation_id(format!("corr-{}", i / 100));
    }
    if i % 2 == 0 {
        event = event.with_ast_node_id(format!("node-{}", i % 512));
    }
    event
}

fn prefilled_store() -> EventStore {
    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    store
        .insert_batch((0..NUM_EVENTS).map(synthetic_event))
        .unwrap();
    store
}

fn insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.throughput(criterion::Throughput::Elements(NUM_EVENTS as _));

    group.bench_function("batch", |b| {
        b.iter(|| {
            let mut store = EventStore::new(EventStoreConfig::DEFAULT);
            store
                .insert_batch((0..NUM_EVENTS).map(synthetic_event))
                .unwrap()
        });
    });

    group.finish();
}

fn query(c: &mut Criterion) {
    let store = prefilled_store();

    let mut group = c.benchmark_group("query");

    group.bench_function("by_correlation", |b| {
        let expr = QueryExpr::all().with_correlation_id("corr-42");
        b.iter(|| store.query(&expr).unwrap());
    });

    group.bench_function("by_process", |b| {
        let expr = QueryExpr::all().with_pid(7_u64).with_limit(usize::MAX);
        b.iter(|| store.query(&expr).unwrap());
    });

    group.bench_function("temporal_range", |b| {
        let expr = QueryExpr::all().with_since(1_000).with_until(2_000);
        b.iter(|| store.query(&expr).unwrap());
    });

    group.bench_function("full_scan_with_residual", |b| {
        let expr = QueryExpr::all().with_event_type("call").with_limit(1_000);
        b.iter(|| store.query(&expr).unwrap());
    });

    group.finish();
}

fn prune(c: &mut Criterion) {
    let mut group = c.benchmark_group("prune");
    group.sample_size(10);

    group.bench_function("delete_before_half", |b| {
        b.iter_batched(
            prefilled_store,
            |mut store| store.delete_before((NUM_EVENTS / 2) as i64),
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, insert, query, prune);
criterion_main!(benches);
