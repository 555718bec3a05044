use std::sync::atomic::Ordering;
use std::time::Duration;

use itertools::Itertools as _;
use web_time::Instant;

use st_log::{debug, error, trace};
use st_trace_types::{EventId, TimeRange, TraceEvent};

use crate::store_plan::{self, Driver, Order, Plan, PlanError, QueryExpr};
use crate::{EventStore, IndexKey};

// ---

/// How many candidates a scan visits between two deadline checks.
///
/// `Instant::now` is not free; amortize it.
const DEADLINE_CHECK_MASK: usize = 0xFF;

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    InvalidFilter(#[from] PlanError),

    #[error("query deadline exceeded after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("no stored event has id '{0}'")]
    NotFound(EventId),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type QueryResult<T> = ::std::result::Result<T, QueryError>;

impl EventStore {
    /// Fetches one event by id, straight from the primary table.
    #[inline]
    pub fn lookup(&self, event_id: &EventId) -> Option<&TraceEvent> {
        self.primary.get(event_id)
    }

    /// All ids with `range.min <= timestamp <= range.max`, in ascending
    /// timestamp order; within one timestamp, in append order.
    pub fn scan_temporal(&self, range: TimeRange) -> impl Iterator<Item = &EventId> {
        self.temporal
            .range(range.min..=range.max)
            .flat_map(|(_, ids)| ids.iter())
    }

    /// All ids under `key` in its secondary index, in the order they were
    /// appended (i.e. insertion order).
    pub fn scan_by<'a>(&'a self, key: &IndexKey) -> impl Iterator<Item = &'a EventId> + 'a {
        let ids = match key {
            IndexKey::Process(pid) => self.process.get(pid),
            IndexKey::Function(callsite) => self.function.get(callsite),
            IndexKey::Correlation(correlation_id) => self.correlation.get(correlation_id),
            IndexKey::AstNode(ast_node_id) => self.ast_node.get(ast_node_id),
        };
        ids.map(Vec::as_slice).unwrap_or(&[]).iter()
    }

    /// Runs a query with no deadline. See [`Self::query_with_deadline`].
    pub fn query(&self, expr: &QueryExpr) -> QueryResult<Vec<TraceEvent>> {
        self.query_with_deadline(expr, None)
    }

    /// Plans and executes a filter-based query.
    ///
    /// The planner picks the most selective index as the driver (see
    /// [`store_plan::plan`]); every candidate it enumerates is resolved
    /// through the primary table and checked against the residual predicates.
    ///
    /// Ids found in an index but missing from `primary` are skipped
    /// mid-scan: they may belong to an insert or delete that has not
    /// finished fanning out. Once the scan completes they get a second look,
    /// and any id still missing its primary row is not a fan-out race but a
    /// corrupt index entry: the query fails with [`QueryError::Internal`]
    /// after logging and bumping the internal-error counter. The owner is
    /// expected to sweep the offending entries and retry once (see
    /// [`Self::sweep_dangling`]).
    ///
    /// If `deadline` passes mid-scan the whole query fails with
    /// [`QueryError::Timeout`]; partial results are never returned.
    pub fn query_with_deadline(
        &self,
        expr: &QueryExpr,
        deadline: Option<Instant>,
    ) -> QueryResult<Vec<TraceEvent>> {
        let query_id = self.query_id.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();

        let Plan {
            driver,
            residuals,
            order,
            limit,
        } = store_plan::plan(expr, self.config.query_default_limit)?;

        debug!(
            kind = "query",
            id = query_id,
            driver = %driver,
            limit,
            "query started"
        );

        // The temporal index yields timestamp order for free (in either
        // direction); any other driver needs an explicit sort when the caller
        // asked for one, which also means the scan cannot short-circuit on
        // `limit`.
        let needs_sort = order.is_some() && !matches!(driver, Driver::Temporal(_));

        let candidates: Box<dyn Iterator<Item = &EventId> + '_> = match (&driver, order) {
            (Driver::Index(key), _) => Box::new(self.scan_by(key)),

            (Driver::Temporal(range), None) => Box::new(self.scan_temporal(*range)),

            // An explicitly ordered temporal scan additionally keeps
            // equal-timestamp ids in (reverse-)lexicographic order, matching
            // the `(timestamp, event_id)` comparator used everywhere else.
            (Driver::Temporal(range), Some(Order::Asc)) => Box::new(
                self.temporal
                    .range(range.min..=range.max)
                    .flat_map(|(_, ids)| ids.iter().sorted_unstable()),
            ),
            (Driver::Temporal(range), Some(Order::Desc)) => Box::new(
                self.temporal
                    .range(range.min..=range.max)
                    .rev()
                    .flat_map(|(_, ids)| ids.iter().sorted_unstable().rev()),
            ),

            (Driver::FullScan, _) => {
                self.full_scan_count.fetch_add(1, Ordering::Relaxed);
                Box::new(self.primary.keys())
            }
        };

        let mut hits: Vec<TraceEvent> = Vec::new();
        let mut dangling: Vec<EventId> = Vec::new();
        let mut num_visited = 0usize;

        for event_id in candidates {
            num_visited += 1;
            if num_visited & DEADLINE_CHECK_MASK == 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(QueryError::Timeout {
                            elapsed: start.elapsed(),
                        });
                    }
                }
            }

            let Some(event) = self.primary.get(event_id) else {
                // Index entry with no primary row: possibly an insert or
                // delete that has not finished fanning out. Treat as absent
                // for now; re-examined once the scan completes.
                self.num_dangling_skipped.fetch_add(1, Ordering::Relaxed);
                dangling.push(event_id.clone());
                trace!(
                    kind = "query",
                    id = query_id,
                    event_id = %event_id,
                    "skipping dangling index entry"
                );
                continue;
            };

            if !residuals.matches(event) {
                continue;
            }

            hits.push(event.clone());

            if !needs_sort && hits.len() >= limit {
                break;
            }
        }

        // Second look at the skipped ids. An entry that is still dangling
        // after the scan cannot be a fan-out race: completed writes leave no
        // window in which an index references an id without a primary row.
        let still_dangling: Vec<&EventId> = dangling
            .iter()
            .filter(|event_id| !self.primary.contains_key(*event_id))
            .collect();
        if let Some(first) = still_dangling.first() {
            self.num_internal_errors.fetch_add(1, Ordering::Relaxed);
            error!(
                kind = "query",
                id = query_id,
                event_id = %first,
                num_dangling = still_dangling.len(),
                "index entries reference ids with no primary row"
            );
            return Err(QueryError::Internal(format!(
                "{} index entries reference ids with no primary row (e.g. '{first}')",
                still_dangling.len(),
            )));
        }

        if needs_sort {
            let ascending =
                |a: &TraceEvent, b: &TraceEvent| (a.timestamp, &a.event_id).cmp(&(b.timestamp, &b.event_id));
            match order {
                Some(Order::Asc) | None => hits.sort_unstable_by(ascending),
                Some(Order::Desc) => hits.sort_unstable_by(|a, b| ascending(b, a)),
            }
            hits.truncate(limit);
        }

        debug!(
            kind = "query",
            id = query_id,
            num_visited,
            num_results = hits.len(),
            "query done"
        );

        Ok(hits)
    }
}
