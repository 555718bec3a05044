//! Helpers for tests and benchmarks. Not part of the public API.

use st_trace_types::{CallSite, CorrelationId, EventId, TimeInt, TraceEvent};

use crate::{EventStore, EventStoreConfig};

// ---

/// Sets up test logging; honors `RUST_LOG`.
pub fn init_logs() {
    st_log::setup_logging();
}

/// Panics with the full report and a store dump if the store fails its
/// invariant suite.
pub fn sanity_unwrap(store: &EventStore) {
    if let Err(err) = store.sanity_check() {
        panic!("store sanity check failed: {err}\n{store}");
    }
}

/// A minimal event: fixed pid and callsite, no optional fields.
pub fn trace_event(event_id: &str, timestamp: i64) -> TraceEvent {
    trace_event_on(event_id, timestamp, 1)
}

/// A minimal event on a specific process.
pub fn trace_event_on(event_id: &str, timestamp: i64, pid: u64) -> TraceEvent {
    TraceEvent::new(
        event_id,
        timestamp,
        pid,
        CallSite::new("test_mod", "test_fun", 0),
        "call",
    )
}

/// Plants a temporal index entry that references no primary row, staging
/// the corrupt state that `QueryError::Internal` reports.
pub fn inject_dangling_temporal(store: &mut EventStore, timestamp: i64, event_id: &str) {
    store
        .temporal
        .entry(TimeInt::new(timestamp))
        .or_default()
        .push(EventId::from(event_id));
}

/// Same, for the correlation index.
pub fn inject_dangling_correlation(store: &mut EventStore, correlation_id: &str, event_id: &str) {
    store
        .correlation
        .entry(CorrelationId::from(correlation_id))
        .or_default()
        .push(EventId::from(event_id));
}

/// The configurations worth running a test under.
pub fn all_configs() -> impl Iterator<Item = EventStoreConfig> {
    [
        EventStoreConfig::DEFAULT,
        EventStoreConfig {
            max_events: 8,
            ..EventStoreConfig::DEFAULT
        },
        EventStoreConfig {
            max_events: 8,
            low_water_ratio: 0.5,
            ..EventStoreConfig::DEFAULT
        },
        EventStoreConfig {
            query_default_limit: 2,
            ..EventStoreConfig::DEFAULT
        },
    ]
    .into_iter()
}
