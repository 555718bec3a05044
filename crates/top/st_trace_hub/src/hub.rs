use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{bounded, tick, Receiver, Sender};
use parking_lot::RwLock;
use web_time::Instant;

use st_event_store::{
    BatchInsert, EventStore, EventStoreConfig, EventStoreStats, PruneOptions, PruneTarget,
    QueryError, QueryExpr, QueryResult, WriteResult,
};
use st_log::{debug, error, warn};
use st_trace_types::{EventId, TimeInt, TraceEvent};

// ---

/// How many events a batch writes per writer-gate acquisition.
///
/// Batches release the gate between chunks so queued readers (and the prune
/// thread) get a turn mid-batch.
const BATCH_CHUNK_LEN: usize = 512;

/// How long one prune slice may hold the writer gate.
const PRUNE_SLICE_BUDGET: Duration = Duration::from_millis(5);

/// Overrides the pruner's notion of "now", in the producers' clock domain.
pub type NowFn = Arc<dyn Fn() -> TimeInt + Send + Sync>;

#[derive(Clone)]
pub struct TraceHubConfig {
    pub store: EventStoreConfig,

    /// Maximum event age, in the same unit as event timestamps. Events older
    /// than `now − max_age` are dropped by the periodic prune. Absent: no
    /// age-based pruning.
    pub max_age: Option<i64>,

    /// Cadence of the periodic prune.
    pub cleanup_interval: Duration,

    /// Where the periodic prune takes "now" from.
    ///
    /// Defaults to the newest ingested timestamp, which keeps the cutoff in
    /// the same clock domain as the data no matter what clock the producers
    /// use. Embedders whose timestamps are plain wall-clock milliseconds can
    /// supply a system-time closure instead.
    pub now_fn: Option<NowFn>,
}

impl Default for TraceHubConfig {
    fn default() -> Self {
        Self {
            store: EventStoreConfig::DEFAULT,
            max_age: None,
            cleanup_interval: Duration::from_secs(60),
            now_fn: None,
        }
    }
}

impl std::fmt::Debug for TraceHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            store,
            max_age,
            cleanup_interval,
            now_fn,
        } = self;
        f.debug_struct("TraceHubConfig")
            .field("store", store)
            .field("max_age", max_age)
            .field("cleanup_interval", cleanup_interval)
            .field("now_fn", &now_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// ---

/// The process-wide handle to the event store.
///
/// Cheap to share by reference across threads: every mutation goes through
/// the writer half of one `RwLock` (writes are serialized with respect to
/// each other and to the prune thread), while queries and lookups take the
/// read half and run in parallel.
///
/// Dropping the hub (or calling [`Self::stop`]) shuts the prune thread down
/// and drops the tables.
pub struct TraceHub {
    store: Arc<RwLock<EventStore>>,
    prune_thread: Option<std::thread::JoinHandle<()>>,
    shutdown_tx: Option<Sender<()>>,
}

impl TraceHub {
    /// Creates the tables and, if an age bound is configured, spawns the
    /// periodic prune thread.
    pub fn spawn(config: TraceHubConfig) -> Self {
        let store = Arc::new(RwLock::new(EventStore::new(config.store.clone())));

        let (shutdown_tx, shutdown_rx) = bounded(1);

        let prune_thread = if config.max_age.is_some() {
            let store = Arc::clone(&store);
            let config = config.clone();
            std::thread::Builder::new()
                .name("st_trace_hub_prune".into())
                .spawn(move || prune_loop(&store, &config, &shutdown_rx))
                .map_err(|err| error!("couldn't spawn the prune thread: {err}"))
                .ok()
        } else {
            None
        };

        debug!(kind = "hub", ?config, "trace hub started");

        Self {
            store,
            prune_thread,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    // --- Producer interface ---

    /// Stores one event. See [`EventStore::insert`].
    pub fn store(&self, event: TraceEvent) -> WriteResult<()> {
        self.store.write().insert(event)
    }

    /// Stores a batch of events, skipping duplicates.
    ///
    /// The batch is written in chunks, releasing the writer gate in between;
    /// a hard error stops the batch at that element and everything inserted
    /// up to that point stays inserted.
    pub fn store_batch(
        &self,
        events: impl IntoIterator<Item = TraceEvent>,
    ) -> WriteResult<BatchInsert> {
        let mut outcome = BatchInsert::default();

        let mut events = events.into_iter();
        loop {
            let chunk: Vec<TraceEvent> = events.by_ref().take(BATCH_CHUNK_LEN).collect();
            if chunk.is_empty() {
                break;
            }

            let chunk_outcome = self.store.write().insert_batch(chunk)?;
            outcome.num_inserted += chunk_outcome.num_inserted;
            outcome.skipped.extend(chunk_outcome.skipped);
        }

        Ok(outcome)
    }

    // --- Consumer interface ---

    /// Runs a filter-based query. See [`EventStore::query`].
    ///
    /// If the store reports an internal invariant violation (a corrupt index
    /// entry), the hub sweeps the offending entries and retries the query
    /// once; a second failure is surfaced to the caller.
    pub fn query(&self, expr: &QueryExpr) -> QueryResult<Vec<TraceEvent>> {
        self.query_with_repair(expr, None)
    }

    /// Same as [`Self::query`], abandoning the scan with
    /// [`QueryError::Timeout`] once `timeout` has passed. Partial results are
    /// never returned.
    pub fn query_with_timeout(
        &self,
        expr: &QueryExpr,
        timeout: Duration,
    ) -> QueryResult<Vec<TraceEvent>> {
        let deadline = Instant::now() + timeout;
        self.query_with_repair(expr, Some(deadline))
    }

    /// The sweep-and-retry-once policy around [`EventStore::query_with_deadline`].
    fn query_with_repair(
        &self,
        expr: &QueryExpr,
        deadline: Option<Instant>,
    ) -> QueryResult<Vec<TraceEvent>> {
        let first = self.store.read().query_with_deadline(expr, deadline);

        match first {
            Err(QueryError::Internal(reason)) => {
                warn!(
                    kind = "repair",
                    %reason,
                    "query failed on corrupt index state; sweeping and retrying once"
                );
                let num_swept = self.store.write().sweep_dangling();
                debug!(kind = "repair", num_swept, "sweep done, retrying query");
                self.store.read().query_with_deadline(expr, deadline)
            }
            other => other,
        }
    }

    /// Fetches one event by id.
    pub fn get(&self, event_id: &EventId) -> QueryResult<TraceEvent> {
        self.store
            .read()
            .lookup(event_id)
            .cloned()
            .ok_or_else(|| QueryError::NotFound(event_id.clone()))
    }

    /// A stats snapshot, consistent with the last completed write or prune.
    pub fn stats(&self) -> EventStoreStats {
        self.store.read().snapshot_stats()
    }

    // --- Admin interface ---

    /// Removes every event strictly older than `cutoff`. Returns how many
    /// were removed.
    ///
    /// Runs in bounded slices so the writer gate is released periodically.
    pub fn cleanup(&self, cutoff: impl Into<TimeInt>) -> u64 {
        chunked_prune(&self.store, PruneTarget::Before(cutoff.into()))
    }

    /// Drops every stored event.
    pub fn clear(&self) {
        self.store.write().clear();
    }

    /// Shuts the prune thread down and drops the tables.
    ///
    /// Dropping the hub does the same; `stop` just makes the point explicit
    /// at call sites that care about when it happens.
    pub fn stop(self) {
        // Drop does the work.
    }

    /// Runs `f` with exclusive access to the underlying store.
    ///
    /// Do _not_ use this to try and assert the internal state of the store;
    /// it exists so tests can stage states the public API cannot produce.
    #[doc(hidden)]
    pub fn with_store_mut<R>(&self, f: impl FnOnce(&mut EventStore) -> R) -> R {
        f(&mut self.store.write())
    }

    fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            shutdown_tx.send(()).ok();
        }
        if let Some(prune_thread) = self.prune_thread.take() {
            prune_thread.join().ok();
        }
    }
}

impl Drop for TraceHub {
    fn drop(&mut self) {
        self.shutdown();
        debug!(kind = "hub", "trace hub stopped");
    }
}

// ---

/// Prunes toward `target` in bounded slices, releasing the writer gate
/// between slices.
fn chunked_prune(store: &RwLock<EventStore>, target: PruneTarget) -> u64 {
    let mut num_removed = 0;
    loop {
        let stats = store.write().prune(&PruneOptions {
            target,
            time_budget: PRUNE_SLICE_BUDGET,
        });
        num_removed += stats.num_removed;

        if !stats.budget_exhausted {
            return num_removed;
        }

        // The gate is released here; give queued readers and writers a turn.
        std::thread::yield_now();
    }
}

/// The periodic age prune: every `cleanup_interval`, drop everything older
/// than `now − max_age`.
fn prune_loop(store: &RwLock<EventStore>, config: &TraceHubConfig, shutdown_rx: &Receiver<()>) {
    let Some(max_age) = config.max_age else {
        return;
    };

    let ticker = tick(config.cleanup_interval);

    loop {
        crossbeam::select! {
            recv(shutdown_rx) -> _ => return,

            recv(ticker) -> _ => {
                let now = match &config.now_fn {
                    Some(now_fn) => Some(now_fn()),
                    None => store.read().newest_time(),
                };
                let Some(now) = now else {
                    continue; // empty store, nothing to age out
                };

                let cutoff = now.saturating_sub(max_age);
                let num_removed = chunked_prune(store, PruneTarget::Before(cutoff));
                if num_removed > 0 {
                    debug!(
                        kind = "gc",
                        cutoff = %cutoff,
                        num_removed,
                        "periodic age prune"
                    );
                }
            }
        }
    }
}
