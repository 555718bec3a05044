//! The ScopeTrace in-memory trace-event store.
//!
//! A primary `event id → event` table plus five secondary indexes (temporal,
//! process, function, correlation, AST node), kept mutually consistent under
//! a single-writer discipline, queried through a static planner that picks
//! the most selective index for each filter set, and bounded in memory by an
//! oldest-first pruner.
//!
//! * See [`EventStore`] for an overview of the core datastructures.
//! * See [`EventStore::query`] and [`EventStore::lookup`] for the public
//!   read APIs.
//! * See [`EventStore::insert`] for the public write APIs.
//! * See [`EventStore::prune`] for capacity/age-based eviction.

mod store;
mod store_format;
mod store_gc;
mod store_plan;
mod store_read;
mod store_sanity;
mod store_stats;
mod store_write;

#[doc(hidden)]
pub mod test_util;

pub use self::store::{EventStore, EventStoreConfig, IndexKey, IndexKind};
pub use self::store_gc::{PruneOptions, PruneStats, PruneTarget};
pub use self::store_plan::{plan, Driver, Order, Plan, PlanError, QueryExpr, Residuals};
pub use self::store_read::{QueryError, QueryResult};
pub use self::store_sanity::{SanityError, SanityResult};
pub use self::store_stats::{EventStoreStats, IndexStats};
pub use self::store_write::{BatchInsert, WriteError, WriteResult};

// Re-exports
#[doc(no_inline)]
pub use st_trace_types::{TimeInt, TimeRange, TraceEvent}; // for politeness sake
