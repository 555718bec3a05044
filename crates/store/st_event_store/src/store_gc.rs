use std::time::Duration;

use web_time::Instant;

use st_log::debug;
use st_trace_types::{SizeBytes as _, TimeInt};

use crate::EventStore;

// ---

/// What a prune pass is trying to achieve.
#[derive(Debug, Clone, Copy)]
pub enum PruneTarget {
    /// Remove every event whose timestamp is strictly less than the cutoff.
    ///
    /// This is both the explicit `cleanup` operation and the periodic
    /// age-based prune (`cutoff = now − max_age`).
    Before(TimeInt),

    /// Evict oldest-first until the event count is back under the low-water
    /// mark, `min(max_events − 1, ⌊max_events × low_water_ratio⌋)`.
    ///
    /// Capping the mark at `max_events − 1` guarantees the insert that
    /// triggered the prune still fits under `max_events` afterwards.
    Capacity {
        max_events: u64,
        low_water_ratio: f64,
    },

    /// Remove everything.
    Everything,
}

impl std::fmt::Display for PruneTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Before(cutoff) => write!(f, "Before({cutoff})"),
            Self::Capacity {
                max_events,
                low_water_ratio,
            } => write!(
                f,
                "Capacity({} × {})",
                st_format::format_uint(*max_events),
                st_format::format_f64(*low_water_ratio),
            ),
            Self::Everything => f.write_str("Everything"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PruneOptions {
    pub target: PruneTarget,

    /// How long the pass may run for.
    ///
    /// Trades off latency for throughput: the owner of the store holds the
    /// writer gate for the whole pass, so a bounded budget keeps concurrent
    /// queries responsive at the cost of more passes. On exhaustion the pass
    /// stops early and reports [`PruneStats::budget_exhausted`]; calling
    /// again resumes where it left off.
    pub time_budget: Duration,
}

impl PruneOptions {
    /// A pass that runs to completion, no matter how long it takes.
    pub fn unbounded(target: PruneTarget) -> Self {
        Self {
            target,
            time_budget: Duration::MAX,
        }
    }

    /// Removes everything strictly older than `cutoff`, in one go.
    pub fn before(cutoff: impl Into<TimeInt>) -> Self {
        Self::unbounded(PruneTarget::Before(cutoff.into()))
    }

    /// Empties the store, in one go.
    pub fn everything() -> Self {
        Self::unbounded(PruneTarget::Everything)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub num_removed: u64,
    pub num_bytes_removed: u64,

    /// Set when the pass stopped on its time budget with work remaining.
    pub budget_exhausted: bool,
}

impl EventStore {
    /// Evicts events according to `options`, always in ascending timestamp
    /// order, removing each event from the primary table and every index it
    /// participates in.
    ///
    /// Afterwards `oldest_timestamp`/`newest_timestamp` are re-derived from
    /// the temporal index.
    pub fn prune(&mut self, options: &PruneOptions) -> PruneStats {
        self.gc_id += 1;
        let start = Instant::now();

        let num_events_before = self.num_events();
        let num_bytes_before = self.memory_bytes_estimate;

        debug!(
            kind = "gc",
            id = self.gc_id,
            target = %options.target,
            num_events_before = %st_format::format_uint(num_events_before),
            num_bytes_before = %st_format::format_bytes(num_bytes_before as _),
            "starting prune pass"
        );

        let target_len = match options.target {
            PruneTarget::Before(_) => 0, // driven by the cutoff, not by a count
            PruneTarget::Capacity {
                max_events,
                low_water_ratio,
            } => {
                let low_water = (max_events as f64 * low_water_ratio.clamp(0.0, 1.0)).floor() as u64;
                low_water.min(max_events.saturating_sub(1))
            }
            PruneTarget::Everything => 0,
        };

        let mut stats = PruneStats::default();

        'pass: loop {
            // Oldest timestamp still indexed; eviction order follows from
            // always draining the first temporal entry.
            let Some((timestamp, ids)) = self
                .temporal
                .iter()
                .next()
                .map(|(timestamp, ids)| (*timestamp, ids.clone()))
            else {
                break 'pass;
            };

            if let PruneTarget::Before(cutoff) = options.target {
                if timestamp >= cutoff {
                    break 'pass;
                }
            }

            for event_id in &ids {
                if matches!(options.target, PruneTarget::Capacity { .. })
                    && self.num_events() <= target_len
                {
                    break 'pass;
                }

                match self.remove_event(event_id) {
                    Some(event) => {
                        stats.num_removed += 1;
                        stats.num_bytes_removed += event.total_size_bytes();
                    }
                    None => {
                        // A temporal entry with no primary row; sweep it so
                        // the pass cannot spin on it forever.
                        self.sweep_dangling_temporal(timestamp, event_id);
                    }
                }
            }

            if start.elapsed() >= options.time_budget {
                stats.budget_exhausted = true;
                break 'pass;
            }
        }

        debug!(
            kind = "gc",
            id = self.gc_id,
            target = %options.target,
            num_removed = %st_format::format_uint(stats.num_removed),
            num_bytes_removed = %st_format::format_bytes(stats.num_bytes_removed as _),
            num_events_after = %st_format::format_uint(self.num_events()),
            budget_exhausted = stats.budget_exhausted,
            "prune pass done"
        );

        stats
    }

    /// Removes every event whose timestamp is strictly less than `cutoff`,
    /// as one logical operation. Returns how many were removed.
    pub fn delete_before(&mut self, cutoff: impl Into<TimeInt>) -> u64 {
        self.prune(&PruneOptions::before(cutoff)).num_removed
    }
}
