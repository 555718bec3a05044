use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;

use ahash::HashMap;
use nohash_hasher::IntMap;
use smallvec::SmallVec;

use st_trace_types::{
    AstNodeId, CallSite, CorrelationId, EventId, ProcessId, TimeInt, TraceEvent,
};

// --- Event store ---

#[derive(Debug, Clone)]
pub struct EventStoreConfig {
    /// The maximum number of events the store will hold.
    ///
    /// An insert that would go past this cap triggers a capacity prune (see
    /// [`Self::low_water_ratio`]) rather than failing; the insert only fails
    /// with `CapacityExceeded` if pruning cannot make room (e.g. a cap of 0).
    pub max_events: u64,

    /// Where a capacity prune stops, as a fraction of [`Self::max_events`],
    /// in `(0.0, 1.0]`.
    ///
    /// Evicting down to a low-water mark instead of exactly to the cap keeps
    /// a sustained stream of inserts from pruning on every single write.
    pub low_water_ratio: f64,

    /// The result-size bound applied to queries that don't carry an explicit
    /// `limit`.
    pub query_default_limit: usize,
}

impl Default for EventStoreConfig {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl EventStoreConfig {
    pub const DEFAULT: Self = Self {
        max_events: 1_000_000,
        low_water_ratio: 0.9,
        query_default_limit: 1_000,
    };
}

// ---

/// The five secondary indexes maintained alongside the primary table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Temporal,
    Process,
    Function,
    Correlation,
    AstNode,
}

/// A concrete key into one of the point-lookup secondary indexes.
///
/// The temporal index is not represented here: it is range-scanned, not
/// point-scanned (see [`crate::EventStore::scan_temporal`]).
#[derive(Clone, Debug, PartialEq)]
pub enum IndexKey {
    Process(ProcessId),
    Function(CallSite),
    Correlation(CorrelationId),
    AstNode(AstNodeId),
}

impl IndexKey {
    #[inline]
    pub fn kind(&self) -> IndexKind {
        match self {
            Self::Process(_) => IndexKind::Process,
            Self::Function(_) => IndexKind::Function,
            Self::Correlation(_) => IndexKind::Correlation,
            Self::AstNode(_) => IndexKind::AstNode,
        }
    }
}

/// Ids sharing one timestamp, in append order. Almost always exactly one.
pub(crate) type TemporalIdList = SmallVec<[EventId; 2]>;

/// The complete event store: the primary table plus every secondary index.
///
/// ## Consistency
///
/// The primary table is the single source of truth; the indexes hold only id
/// references. Writes land in `primary` first and fan out to the indexes
/// second, deletions sweep the indexes first and remove the primary row last,
/// and readers treat an id found in an index but not in `primary` as absent.
/// Under that discipline a concurrent reader sees an event everywhere or
/// nowhere, regardless of how the store is shared (see the hub crate for the
/// writer gate).
///
/// ## Debugging
///
/// `EventStore` implements a `Display` that summarizes every table, and
/// [`Self::sanity_check`] verifies the cross-table invariants; both are
/// worth reaching for before a debugger.
pub struct EventStore {
    pub(crate) config: EventStoreConfig,

    /// The authoritative `event id → event` mapping. Owns the records.
    pub(crate) primary: HashMap<EventId, TraceEvent>,

    /// `timestamp → ids`, ordered and range-scannable.
    pub(crate) temporal: BTreeMap<TimeInt, TemporalIdList>,

    /// `process → ids`, append order.
    pub(crate) process: IntMap<ProcessId, Vec<EventId>>,

    /// `(module, function, arity) → ids`, append order.
    pub(crate) function: HashMap<CallSite, Vec<EventId>>,

    /// `correlation id → ids`, append order. Only events that carry one.
    pub(crate) correlation: HashMap<CorrelationId, Vec<EventId>>,

    /// `AST node id → ids`, append order. Only events that carry one.
    pub(crate) ast_node: HashMap<AstNodeId, Vec<EventId>>,

    /// Advisory; may lag reality by one operation.
    pub(crate) memory_bytes_estimate: u64,

    pub(crate) oldest_timestamp: Option<TimeInt>,
    pub(crate) newest_timestamp: Option<TimeInt>,

    /// Monotonically increasing ID for insertions.
    pub(crate) insert_id: u64,

    /// Monotonically increasing ID for queries. Atomic: queries run on `&self`.
    pub(crate) query_id: AtomicU64,

    /// Monotonically increasing ID for prune passes.
    pub(crate) gc_id: u64,

    /// How many queries had to fall back to a full primary scan.
    pub(crate) full_scan_count: AtomicU64,

    /// How many index entries readers skipped because no primary row existed.
    pub(crate) num_dangling_skipped: AtomicU64,

    /// How many operations failed with an internal invariant violation
    /// (index entries still dangling once their scan completed).
    pub(crate) num_internal_errors: AtomicU64,
}

impl EventStore {
    pub fn new(config: EventStoreConfig) -> Self {
        Self {
            config,
            primary: Default::default(),
            temporal: Default::default(),
            process: Default::default(),
            function: Default::default(),
            correlation: Default::default(),
            ast_node: Default::default(),
            memory_bytes_estimate: 0,
            oldest_timestamp: None,
            newest_timestamp: None,
            insert_id: 0,
            query_id: AtomicU64::new(0),
            gc_id: 0,
            full_scan_count: AtomicU64::new(0),
            num_dangling_skipped: AtomicU64::new(0),
            num_internal_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn config(&self) -> &EventStoreConfig {
        &self.config
    }

    /// The number of events currently stored, i.e. the size of the primary
    /// table.
    #[inline]
    pub fn num_events(&self) -> u64 {
        self.primary.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// The timestamp of the oldest stored event, if any.
    ///
    /// Kept in sync with the temporal index; useful to look at after a prune.
    #[inline]
    pub fn oldest_time(&self) -> Option<TimeInt> {
        self.oldest_timestamp
    }

    /// The timestamp of the newest stored event, if any.
    #[inline]
    pub fn newest_time(&self) -> Option<TimeInt> {
        self.newest_timestamp
    }
}
