use std::collections::btree_map::Entry as BTreeMapEntry;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;

use st_log::trace;
use st_trace_types::{EventId, SizeBytes as _, TimeInt, TraceEvent};

use crate::store_gc::{PruneOptions, PruneTarget};
use crate::EventStore;

// --- Event store ---

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("an event with id '{0}' is already stored")]
    DuplicateId(EventId),

    #[error("the store is capped at {max_events} events and pruning could not make room")]
    CapacityExceeded { max_events: u64 },

    #[error("no stored event has id '{0}'")]
    NotFound(EventId),
}

pub type WriteResult<T> = ::std::result::Result<T, WriteError>;

/// The outcome of [`EventStore::insert_batch`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchInsert {
    pub num_inserted: u64,

    /// Ids that were already present; their events were skipped, the rest of
    /// the batch went through.
    pub skipped: Vec<EventId>,
}

impl EventStore {
    /// Inserts a single event.
    ///
    /// If the store is full, the oldest events are evicted first (see
    /// [`crate::EventStoreConfig::max_events`]); the insert itself only fails
    /// when even eviction cannot make room, or when `event_id` is already
    /// present.
    pub fn insert(&mut self, event: TraceEvent) -> WriteResult<()> {
        self.insert_id += 1;

        if self.primary.contains_key(&event.event_id) {
            return Err(WriteError::DuplicateId(event.event_id));
        }

        self.make_room_for_one()?;

        trace!(
            kind = "insert",
            id = self.insert_id,
            event_id = %event.event_id,
            timestamp = %event.timestamp,
            pid = %event.pid,
            callsite = %event.callsite,
            "inserting event"
        );

        self.insert_unchecked(event);

        Ok(())
    }

    /// Inserts a batch of events, skipping duplicates.
    ///
    /// Ids already present (or repeated within the batch) are skipped and
    /// accumulated in [`BatchInsert::skipped`]; the remainder of the batch
    /// still goes through. A hard error (`CapacityExceeded`) stops the batch
    /// at that element; everything inserted up to that point stays inserted.
    pub fn insert_batch(
        &mut self,
        events: impl IntoIterator<Item = TraceEvent>,
    ) -> WriteResult<BatchInsert> {
        let mut outcome = BatchInsert::default();

        for event in events {
            match self.insert(event) {
                Ok(()) => outcome.num_inserted += 1,
                Err(WriteError::DuplicateId(event_id)) => outcome.skipped.push(event_id),
                Err(err) => return Err(err),
            }
        }

        Ok(outcome)
    }

    /// Deletes one event, removing it from the primary table and from every
    /// index it participates in. Returns the removed record.
    pub fn delete(&mut self, event_id: &EventId) -> WriteResult<TraceEvent> {
        let removed = self
            .remove_event(event_id)
            .ok_or_else(|| WriteError::NotFound(event_id.clone()))?;

        trace!(
            kind = "delete",
            event_id = %event_id,
            timestamp = %removed.timestamp,
            "deleted event"
        );

        Ok(removed)
    }

    /// Drops every event and resets the data stats.
    ///
    /// The diagnostics counters (`insert_id`, `full_scan_count`, …) keep
    /// running: they describe the process, not the data.
    pub fn clear(&mut self) {
        let Self {
            config: _,
            primary,
            temporal,
            process,
            function,
            correlation,
            ast_node,
            memory_bytes_estimate,
            oldest_timestamp,
            newest_timestamp,
            insert_id: _,
            query_id: _,
            gc_id: _,
            full_scan_count: _,
            num_dangling_skipped: _,
            num_internal_errors: _,
        } = self;

        primary.clear();
        temporal.clear();
        process.clear();
        function.clear();
        correlation.clear();
        ast_node.clear();

        *memory_bytes_estimate = 0;
        *oldest_timestamp = None;
        *newest_timestamp = None;
    }

    // ---

    /// The capacity policy: a write that would go past `max_events` evicts
    /// oldest-first down to the low-water mark instead of failing.
    fn make_room_for_one(&mut self) -> WriteResult<()> {
        let max_events = self.config.max_events;

        if self.num_events() + 1 <= max_events {
            return Ok(());
        }

        self.prune(&PruneOptions::unbounded(PruneTarget::Capacity {
            max_events,
            low_water_ratio: self.config.low_water_ratio,
        }));

        if self.num_events() + 1 > max_events {
            return Err(WriteError::CapacityExceeded { max_events });
        }

        Ok(())
    }

    /// The write fan-out: primary first, indexes second, stats last, so that
    /// no reader can find an id in an index before the primary row exists.
    fn insert_unchecked(&mut self, event: TraceEvent) {
        let event_id = event.event_id.clone();
        let timestamp = event.timestamp;
        let pid = event.pid;
        let callsite = event.callsite.clone();
        let correlation_id = event.correlation_id.clone();
        let ast_node_id = event.ast_node_id.clone();
        let size_bytes = event.total_size_bytes();

        self.primary.insert(event_id.clone(), event);

        self.temporal
            .entry(timestamp)
            .or_default()
            .push(event_id.clone());
        self.process.entry(pid).or_default().push(event_id.clone());
        self.function
            .entry(callsite)
            .or_default()
            .push(event_id.clone());
        if let Some(correlation_id) = correlation_id {
            self.correlation
                .entry(correlation_id)
                .or_default()
                .push(event_id.clone());
        }
        if let Some(ast_node_id) = ast_node_id {
            self.ast_node.entry(ast_node_id).or_default().push(event_id);
        }

        self.memory_bytes_estimate += size_bytes;
        self.newest_timestamp = Some(
            self.newest_timestamp
                .map_or(timestamp, |newest| newest.max(timestamp)),
        );
        self.oldest_timestamp = Some(
            self.oldest_timestamp
                .map_or(timestamp, |oldest| oldest.min(timestamp)),
        );
    }

    /// The delete fan-out, in the reverse order of the insert one: indexes
    /// first, primary last, stats after that.
    ///
    /// Which indexes the event participated in is reconstructed from the
    /// primary record: the store does not keep per-event membership books.
    pub(crate) fn remove_event(&mut self, event_id: &EventId) -> Option<TraceEvent> {
        let (timestamp, pid, callsite, correlation_id, ast_node_id) = {
            let event = self.primary.get(event_id)?;
            (
                event.timestamp,
                event.pid,
                event.callsite.clone(),
                event.correlation_id.clone(),
                event.ast_node_id.clone(),
            )
        };

        if let BTreeMapEntry::Occupied(mut entry) = self.temporal.entry(timestamp) {
            entry.get_mut().retain(|id| id != event_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }

        remove_id(&mut self.process, &pid, event_id);
        remove_id(&mut self.function, &callsite, event_id);
        if let Some(correlation_id) = correlation_id {
            remove_id(&mut self.correlation, &correlation_id, event_id);
        }
        if let Some(ast_node_id) = ast_node_id {
            remove_id(&mut self.ast_node, &ast_node_id, event_id);
        }

        let event = self.primary.remove(event_id)?;

        self.memory_bytes_estimate = self
            .memory_bytes_estimate
            .saturating_sub(event.total_size_bytes());
        self.refresh_time_bounds();

        Some(event)
    }

    /// Re-derives the oldest/newest stats from the temporal index.
    pub(crate) fn refresh_time_bounds(&mut self) {
        self.oldest_timestamp = self.temporal.keys().next().copied();
        self.newest_timestamp = self.temporal.keys().next_back().copied();
    }

    /// Drops a temporal index entry that has no primary row.
    ///
    /// Reconstruction via [`Self::remove_event`] cannot reach these, so the
    /// prune path sweeps them explicitly when it trips over one.
    pub(crate) fn sweep_dangling_temporal(&mut self, timestamp: TimeInt, event_id: &EventId) {
        if let BTreeMapEntry::Occupied(mut entry) = self.temporal.entry(timestamp) {
            entry.get_mut().retain(|id| id != event_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        self.num_dangling_skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Removes one id from a `key → ids` index, dropping the key once its id
/// list runs empty.
fn remove_id<K, S>(
    index: &mut std::collections::HashMap<K, Vec<EventId>, S>,
    key: &K,
    event_id: &EventId,
) where
    K: Eq + Hash,
    S: BuildHasher,
{
    if let Some(ids) = index.get_mut(key) {
        ids.retain(|id| id != event_id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}
