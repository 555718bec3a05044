//! Straightforward high-level API tests.
//!
//! Testing & demonstrating expected usage of the event store APIs, no funny
//! stuff.

use st_event_store::test_util::{init_logs, sanity_unwrap, trace_event};
use st_event_store::{EventStore, EventStoreConfig, Order, QueryExpr, WriteError};
use st_trace_types::{CallSite, EventId, TraceEvent};

// ---

fn ids(events: &[TraceEvent]) -> Vec<&str> {
    events.iter().map(|event| event.event_id.as_str()).collect()
}

/// The canonical trio: `a` and `c` share a process and an AST node, `a` and
/// `b` share a callsite and a correlation group, `c` has no correlation id.
fn abc() -> [TraceEvent; 3] {
    let a = TraceEvent::new("a", 100, 1, CallSite::new("m", "f", 1), "call")
        .with_correlation_id("c1")
        .with_ast_node_id("n1");
    let b = TraceEvent::new("b", 200, 2, CallSite::new("m", "f", 1), "call")
        .with_correlation_id("c1")
        .with_ast_node_id("n2");
    let c = TraceEvent::new("c", 300, 1, CallSite::new("m", "g", 0), "return")
        .with_ast_node_id("n1");
    [a, b, c]
}

fn store_with_abc() -> EventStore {
    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    for event in abc() {
        store.insert(event).unwrap();
    }
    sanity_unwrap(&store);
    store
}

// ---

#[test]
fn query_by_process_ascending() {
    init_logs();
    let store = store_with_abc();

    let hits = store
        .query(&QueryExpr::all().with_pid(1).with_order(Order::Asc))
        .unwrap();
    assert_eq!(ids(&hits), ["a", "c"]);
}

#[test]
fn query_by_ast_node_descending() {
    init_logs();
    let store = store_with_abc();

    let hits = store
        .query(
            &QueryExpr::all()
                .with_ast_node_id("n1")
                .with_order(Order::Desc),
        )
        .unwrap();
    assert_eq!(ids(&hits), ["c", "a"]);
}

#[test]
fn correlation_results_come_in_insertion_order() {
    init_logs();
    let store = store_with_abc();

    let hits = store
        .query(&QueryExpr::all().with_correlation_id("c1"))
        .unwrap();
    assert_eq!(ids(&hits), ["a", "b"]);
}

#[test]
fn temporal_range_bounds_are_inclusive() {
    init_logs();
    let store = store_with_abc();

    let hits = store
        .query(&QueryExpr::all().with_since(150).with_until(250))
        .unwrap();
    assert_eq!(ids(&hits), ["b"]);

    // Exactly on the bounds:
    let hits = store
        .query(&QueryExpr::all().with_since(100).with_until(300))
        .unwrap();
    assert_eq!(ids(&hits), ["a", "b", "c"]);

    // Unbounded sides:
    let hits = store.query(&QueryExpr::all().with_until(100)).unwrap();
    assert_eq!(ids(&hits), ["a"]);
    let hits = store.query(&QueryExpr::all().with_since(300)).unwrap();
    assert_eq!(ids(&hits), ["c"]);
}

#[test]
fn duplicate_insert_fails_and_leaves_state_alone() {
    init_logs();
    let mut store = store_with_abc();

    let stats_before = store.snapshot_stats();

    let [a, _, _] = abc();
    match store.insert(a) {
        Err(WriteError::DuplicateId(event_id)) => assert_eq!(event_id.as_str(), "a"),
        other => panic!("expected DuplicateId, got {other:?}"),
    }

    sanity_unwrap(&store);
    assert_eq!(store.snapshot_stats(), stats_before);
}

#[test]
fn capacity_prune_evicts_the_oldest() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig {
        max_events: 2,
        ..EventStoreConfig::DEFAULT
    });

    for event in abc() {
        store.insert(event).unwrap();
    }
    sanity_unwrap(&store);

    assert!(store.snapshot_stats().total_events <= 2);
    assert!(store.lookup(&EventId::from("a")).is_none());

    let hits = store
        .query(&QueryExpr::all().with_limit(usize::MAX))
        .unwrap();
    assert!(hits.iter().any(|event| event.event_id.as_str() == "c"));
    assert!(hits.iter().all(|event| event.event_id.as_str() != "a"));
}

#[test]
fn roundtrip_lookup() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    let event = abc()[0].clone();
    store.insert(event.clone()).unwrap();

    similar_asserts::assert_eq!(store.lookup(&event.event_id), Some(&event));
}

#[test]
fn empty_store_returns_empty_results() {
    init_logs();

    let store = EventStore::new(EventStoreConfig::DEFAULT);
    sanity_unwrap(&store);

    assert!(store.query(&QueryExpr::all()).unwrap().is_empty());
    assert!(store
        .query(&QueryExpr::all().with_pid(1))
        .unwrap()
        .is_empty());
    assert!(store.lookup(&EventId::from("nope")).is_none());

    let stats = store.snapshot_stats();
    assert_eq!(stats.total_events, 0);
    assert_eq!(stats.oldest_timestamp, None);
    assert_eq!(stats.newest_timestamp, None);
}

#[test]
fn single_event_is_reachable_via_every_index_it_populates() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    let event = abc()[0].clone();
    store.insert(event.clone()).unwrap();
    sanity_unwrap(&store);

    let exprs = [
        QueryExpr::all().with_pid(1),
        QueryExpr::all().with_callsite(&event.callsite),
        QueryExpr::all().with_correlation_id("c1"),
        QueryExpr::all().with_ast_node_id("n1"),
        QueryExpr::all().with_since(100).with_until(100),
        QueryExpr::all(),
    ];
    for expr in exprs {
        let hits = store.query(&expr).unwrap();
        assert_eq!(ids(&hits), ["a"], "expected to find the event via {expr:?}");
    }
}

#[test]
fn absent_optional_fields_never_match() {
    init_logs();
    let store = store_with_abc();

    // `c` has no correlation id; a correlation filter must not return it.
    let hits = store
        .query(&QueryExpr::all().with_correlation_id("c1"))
        .unwrap();
    assert!(hits.iter().all(|event| event.event_id.as_str() != "c"));

    // And a filter for a correlation id nobody carries returns nothing.
    let hits = store
        .query(&QueryExpr::all().with_correlation_id("nope"))
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn batch_insert_skips_duplicates_and_continues() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    let [a, b, c] = abc();

    store.insert(a.clone()).unwrap();

    let outcome = store.insert_batch([a, b, c]).unwrap();
    assert_eq!(outcome.num_inserted, 2);
    assert_eq!(outcome.skipped, vec![EventId::from("a")]);

    sanity_unwrap(&store);
    assert_eq!(store.num_events(), 3);
}

#[test]
fn batch_insert_reports_in_batch_duplicates() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    let event = trace_event("dup", 1);

    let outcome = store
        .insert_batch([event.clone(), event.clone(), event])
        .unwrap();
    assert_eq!(outcome.num_inserted, 1);
    assert_eq!(outcome.skipped.len(), 2);

    sanity_unwrap(&store);
}

#[test]
fn delete_unindexes_everywhere() {
    init_logs();
    let mut store = store_with_abc();

    let removed = store.delete(&EventId::from("a")).unwrap();
    assert_eq!(removed.event_id.as_str(), "a");
    sanity_unwrap(&store);

    assert!(store.lookup(&EventId::from("a")).is_none());
    for expr in [
        QueryExpr::all().with_pid(1),
        QueryExpr::all().with_correlation_id("c1"),
        QueryExpr::all().with_ast_node_id("n1"),
        QueryExpr::all().with_until(150),
    ] {
        let hits = store.query(&expr).unwrap();
        assert!(
            hits.iter().all(|event| event.event_id.as_str() != "a"),
            "deleted event still visible via {expr:?}"
        );
    }

    // Deleting again is an error.
    assert!(matches!(
        store.delete(&EventId::from("a")),
        Err(WriteError::NotFound(_))
    ));
}

#[test]
fn clear_empties_everything() {
    init_logs();
    let mut store = store_with_abc();

    store.clear();
    sanity_unwrap(&store);

    assert_eq!(store.num_events(), 0);
    assert!(store.query(&QueryExpr::all()).unwrap().is_empty());
    assert_eq!(store.snapshot_stats().memory_bytes_estimate, 0);
    assert_eq!(store.snapshot_stats().index.total(), 0);
}

#[test]
fn limit_bounds_the_result_set() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    for i in 0..10 {
        store.insert(trace_event(&format!("ev-{i}"), i)).unwrap();
    }

    let hits = store
        .query(&QueryExpr::all().with_since(0).with_limit(3))
        .unwrap();
    assert_eq!(ids(&hits), ["ev-0", "ev-1", "ev-2"]);

    // The limit applies after sorting when an explicit order is requested on
    // a non-temporal driver.
    let hits = store
        .query(
            &QueryExpr::all()
                .with_pid(1)
                .with_order(Order::Desc)
                .with_limit(2),
        )
        .unwrap();
    assert_eq!(ids(&hits), ["ev-9", "ev-8"]);
}

#[test]
fn default_limit_comes_from_the_config() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig {
        query_default_limit: 2,
        ..EventStoreConfig::DEFAULT
    });
    for i in 0..10 {
        store.insert(trace_event(&format!("ev-{i}"), i)).unwrap();
    }

    assert_eq!(store.query(&QueryExpr::all()).unwrap().len(), 2);
    assert_eq!(
        store
            .query(&QueryExpr::all().with_limit(usize::MAX))
            .unwrap()
            .len(),
        10
    );
}

#[test]
fn stats_track_writes_and_full_scans() {
    init_logs();
    let mut store = store_with_abc();

    let stats = store.snapshot_stats();
    assert_eq!(stats.total_events, 3);
    assert_eq!(stats.index.temporal, 3);
    assert_eq!(stats.index.process, 3);
    assert_eq!(stats.index.function, 3);
    assert_eq!(stats.index.correlation, 2); // `c` carries none
    assert_eq!(stats.index.ast_node, 3);
    assert_eq!(stats.oldest_timestamp.map(|t| t.as_i64()), Some(100));
    assert_eq!(stats.newest_timestamp.map(|t| t.as_i64()), Some(300));
    assert!(stats.memory_bytes_estimate > 0);
    assert_eq!(stats.full_scan_count, 0);

    store.query(&QueryExpr::all()).unwrap();
    assert_eq!(store.snapshot_stats().full_scan_count, 1);

    // An indexed query is not a full scan.
    store.query(&QueryExpr::all().with_pid(1)).unwrap();
    assert_eq!(store.snapshot_stats().full_scan_count, 1);
}

#[test]
fn incoherent_time_range_is_an_invalid_filter() {
    init_logs();
    let store = store_with_abc();

    let err = store
        .query(&QueryExpr::all().with_since(300).with_until(100))
        .unwrap_err();
    assert!(matches!(
        err,
        st_event_store::QueryError::InvalidFilter(_)
    ));
}

#[test]
fn expired_deadline_times_out_without_partial_results() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    for i in 0..2_000 {
        store.insert(trace_event(&format!("ev-{i}"), i)).unwrap();
    }

    let err = store
        .query_with_deadline(
            &QueryExpr::all().with_limit(usize::MAX),
            Some(web_time::Instant::now()),
        )
        .unwrap_err();
    assert!(matches!(err, st_event_store::QueryError::Timeout { .. }));
}

#[test]
fn equal_timestamps_break_ties_on_event_id() {
    init_logs();

    let mut store = EventStore::new(EventStoreConfig::DEFAULT);
    // Inserted out of lexicographic order on purpose.
    for event_id in ["zz", "aa", "mm"] {
        store.insert(trace_event(event_id, 42)).unwrap();
    }

    let hits = store
        .query(&QueryExpr::all().with_since(0).with_order(Order::Asc))
        .unwrap();
    assert_eq!(ids(&hits), ["aa", "mm", "zz"]);

    let hits = store
        .query(&QueryExpr::all().with_pid(1).with_order(Order::Desc))
        .unwrap();
    assert_eq!(ids(&hits), ["zz", "mm", "aa"]);
}
