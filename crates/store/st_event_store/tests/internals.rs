//! Behavior around corrupt index state: detection, diagnostics, repair.
//!
//! The public write path cannot produce a dangling index entry, so these
//! tests stage one through `test_util` and check the contract: entries that
//! outlive their scan surface as `Internal`, get counted, and are repaired
//! by a sweep.

use st_event_store::test_util::{
    init_logs, inject_dangling_correlation, inject_dangling_temporal, sanity_unwrap, trace_event,
};
use st_event_store::{EventStore, EventStoreConfig, QueryError, QueryExpr};

// ---

fn store_with_events(n: i64) -> EventStore {
    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    for i in 0..n {
        store.insert(trace_event(&format!("ev-{i}"), i)).unwrap();
    }
    store
}

#[test]
fn dangling_entries_surface_as_internal_and_sweeping_repairs() {
    init_logs();

    let mut store = store_with_events(5);
    inject_dangling_temporal(&mut store, 2, "ghost");

    // The invariant suite sees the corruption too.
    assert!(store.sanity_check().is_err());

    // A scan that visits the corrupt entry fails with Internal and bumps
    // the diagnostics counters; no partial results come back.
    let err = store
        .query(&QueryExpr::all().with_since(0))
        .unwrap_err();
    assert!(matches!(err, QueryError::Internal(_)));

    let stats = store.snapshot_stats();
    assert_eq!(stats.num_internal_errors, 1);
    assert!(stats.num_dangling_skipped >= 1);

    // Sweeping removes exactly the planted entry; the store is sane again
    // and the same query now succeeds.
    assert_eq!(store.sweep_dangling(), 1);
    sanity_unwrap(&store);

    let hits = store.query(&QueryExpr::all().with_since(0)).unwrap();
    assert_eq!(hits.len(), 5);
    assert_eq!(store.snapshot_stats().num_internal_errors, 1);
}

#[test]
fn sweep_covers_every_index() {
    init_logs();

    let mut store = store_with_events(3);
    inject_dangling_temporal(&mut store, 1, "ghost-temporal");
    inject_dangling_correlation(&mut store, "corr-x", "ghost-correlation");

    assert_eq!(store.sweep_dangling(), 2);
    sanity_unwrap(&store);

    // Nothing real was harmed.
    assert_eq!(store.num_events(), 3);
    assert_eq!(store.snapshot_stats().index.temporal, 3);
    assert_eq!(store.snapshot_stats().index.correlation, 0);
}

#[test]
fn sweeping_a_healthy_store_is_a_no_op() {
    init_logs();

    let mut store = store_with_events(4);
    assert_eq!(store.sweep_dangling(), 0);
    sanity_unwrap(&store);
    assert_eq!(store.num_events(), 4);
}

#[test]
fn scans_that_avoid_the_corrupt_entry_still_succeed() {
    init_logs();

    let mut store = store_with_events(5);
    inject_dangling_temporal(&mut store, 100, "ghost");

    // The corrupt entry sits outside the scanned range; the query never
    // visits it and no internal error is raised.
    let hits = store
        .query(&QueryExpr::all().with_since(0).with_until(50))
        .unwrap();
    assert_eq!(hits.len(), 5);
    assert_eq!(store.snapshot_stats().num_internal_errors, 0);
}

#[test]
fn prune_sweeps_dangling_temporal_entries_it_trips_over() {
    init_logs();

    let mut store = store_with_events(5);
    inject_dangling_temporal(&mut store, 2, "ghost");

    // The pass removes the five real events and sweeps the ghost.
    assert_eq!(store.delete_before(10), 5);
    sanity_unwrap(&store);
    assert!(store.is_empty());
    assert!(store.snapshot_stats().num_dangling_skipped >= 1);
}
