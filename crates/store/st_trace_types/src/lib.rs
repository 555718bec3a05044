//! The basic types of the ScopeTrace trace-event model.
//!
//! A [`TraceEvent`] is an immutable record of a single runtime observation,
//! produced by the instrumentation pipeline and identified by its
//! [`EventId`]. The event store treats the record as opaque: it reads the
//! identifying fields to maintain its indexes, and never interprets
//! [`TraceEvent::payload`].

mod event;
mod size_bytes;
mod time;

pub use self::event::{
    AstNodeId, CallSite, CorrelationId, EventId, EventType, ProcessId, TraceEvent,
};
pub use self::size_bytes::SizeBytes;
pub use self::time::{TimeInt, TimeRange};
