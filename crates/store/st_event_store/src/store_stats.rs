use std::sync::atomic::Ordering;

use st_trace_types::TimeInt;

use crate::EventStore;

// ---

/// Per-index entry counts: how many id references each secondary index
/// holds (not how many distinct keys).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub temporal: u64,
    pub process: u64,
    pub function: u64,
    pub correlation: u64,
    pub ast_node: u64,
}

impl IndexStats {
    #[inline]
    pub fn total(&self) -> u64 {
        let Self {
            temporal,
            process,
            function,
            correlation,
            ast_node,
        } = *self;
        temporal + process + function + correlation + ast_node
    }
}

impl std::ops::Add for IndexStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            temporal: self.temporal + rhs.temporal,
            process: self.process + rhs.process,
            function: self.function + rhs.function,
            correlation: self.correlation + rhs.correlation,
            ast_node: self.ast_node + rhs.ast_node,
        }
    }
}

impl std::ops::Sub for IndexStats {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            temporal: self.temporal - rhs.temporal,
            process: self.process - rhs.process,
            function: self.function - rhs.function,
            correlation: self.correlation - rhs.correlation,
            ast_node: self.ast_node - rhs.ast_node,
        }
    }
}

/// A stats snapshot, consistent with the last completed write or prune.
///
/// No guarantee of consistency with operations that are in flight while the
/// snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStoreStats {
    pub total_events: u64,

    /// Advisory; may lag reality by one operation.
    pub memory_bytes_estimate: u64,

    pub index: IndexStats,

    pub oldest_timestamp: Option<TimeInt>,
    pub newest_timestamp: Option<TimeInt>,

    /// How many queries had to fall back to a full primary scan.
    pub full_scan_count: u64,

    /// How many index entries readers skipped because no primary row existed
    /// at the time of access.
    pub num_dangling_skipped: u64,

    /// How many operations failed with an internal invariant violation.
    pub num_internal_errors: u64,
}

impl EventStoreStats {
    pub fn from_store(store: &EventStore) -> Self {
        Self {
            total_events: store.num_events(),
            memory_bytes_estimate: store.memory_bytes_estimate,
            index: IndexStats {
                temporal: store.temporal_entry_count(),
                process: store.process_entry_count(),
                function: store.function_entry_count(),
                correlation: store.correlation_entry_count(),
                ast_node: store.ast_node_entry_count(),
            },
            oldest_timestamp: store.oldest_timestamp,
            newest_timestamp: store.newest_timestamp,
            full_scan_count: store.full_scan_count.load(Ordering::Relaxed),
            num_dangling_skipped: store.num_dangling_skipped.load(Ordering::Relaxed),
            num_internal_errors: store.num_internal_errors.load(Ordering::Relaxed),
        }
    }
}

// --- Event store ---

impl EventStore {
    /// Takes a stats snapshot. See [`EventStoreStats`].
    pub fn snapshot_stats(&self) -> EventStoreStats {
        EventStoreStats::from_store(self)
    }

    /// The number of id references in the temporal index.
    pub fn temporal_entry_count(&self) -> u64 {
        self.temporal.values().map(|ids| ids.len() as u64).sum()
    }

    /// The number of id references in the process index.
    pub fn process_entry_count(&self) -> u64 {
        self.process.values().map(|ids| ids.len() as u64).sum()
    }

    /// The number of id references in the function index.
    pub fn function_entry_count(&self) -> u64 {
        self.function.values().map(|ids| ids.len() as u64).sum()
    }

    /// The number of id references in the correlation index.
    pub fn correlation_entry_count(&self) -> u64 {
        self.correlation.values().map(|ids| ids.len() as u64).sum()
    }

    /// The number of id references in the AST-node index.
    pub fn ast_node_entry_count(&self) -> u64 {
        self.ast_node.values().map(|ids| ids.len() as u64).sum()
    }
}
