//! The ScopeTrace coordinator.
//!
//! [`TraceHub`] is the single public entry point to the event store: it owns
//! the tables, serializes every mutation through one writer gate, runs the
//! periodic age prune on a background thread, and hands read-only views to
//! concurrent queries.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

mod hub;

pub use self::hub::{NowFn, TraceHub, TraceHubConfig};

// Re-exports
#[doc(no_inline)]
pub use st_event_store::{
    BatchInsert, EventStoreConfig, EventStoreStats, Order, QueryError, QueryExpr, WriteError,
};
#[doc(no_inline)]
pub use st_trace_types::{TimeInt, TraceEvent};
