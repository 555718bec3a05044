use std::sync::Arc;

use st_trace_types::{
    AstNodeId, CallSite, CorrelationId, EventType, ProcessId, TimeInt, TimeRange, TraceEvent,
};

use crate::IndexKey;

// --- Filters ---

/// The direction results are sorted in, by `(timestamp, event_id)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// A filter set, as handed in by consumers.
///
/// Every field is optional; an empty expression matches every stored event
/// (bounded by `limit`). Being a typed struct, there is no such thing as an
/// unrecognized filter key; the only way to hand in an invalid expression is
/// an incoherent time range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryExpr {
    pub pid: Option<ProcessId>,
    pub event_type: Option<EventType>,
    pub since: Option<TimeInt>,
    pub until: Option<TimeInt>,
    pub correlation_id: Option<CorrelationId>,
    pub ast_node_id: Option<AstNodeId>,
    pub module: Option<Arc<str>>,
    pub function: Option<Arc<str>>,
    pub arity: Option<u32>,

    /// Upper bound on the number of returned events. Falls back to the
    /// store's `query_default_limit` when absent.
    pub limit: Option<usize>,

    /// When absent, results come back in the driving index's natural order
    /// (ascending for the temporal index, append order everywhere else).
    pub order: Option<Order>,
}

impl QueryExpr {
    /// Matches everything; combine with the builder methods below.
    #[inline]
    pub fn all() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_pid(mut self, pid: impl Into<ProcessId>) -> Self {
        self.pid = Some(pid.into());
        self
    }

    #[inline]
    pub fn with_event_type(mut self, event_type: impl Into<EventType>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    #[inline]
    pub fn with_since(mut self, since: impl Into<TimeInt>) -> Self {
        self.since = Some(since.into());
        self
    }

    #[inline]
    pub fn with_until(mut self, until: impl Into<TimeInt>) -> Self {
        self.until = Some(until.into());
        self
    }

    #[inline]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[inline]
    pub fn with_ast_node_id(mut self, ast_node_id: impl Into<AstNodeId>) -> Self {
        self.ast_node_id = Some(ast_node_id.into());
        self
    }

    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    #[inline]
    pub fn with_function(mut self, function: impl Into<Arc<str>>) -> Self {
        self.function = Some(function.into());
        self
    }

    #[inline]
    pub fn with_arity(mut self, arity: u32) -> Self {
        self.arity = Some(arity);
        self
    }

    /// Sets the full `(module, function, arity)` triple at once, making the
    /// function index eligible as the driver.
    #[inline]
    pub fn with_callsite(mut self, callsite: &CallSite) -> Self {
        self.module = Some(callsite.module.clone());
        self.function = Some(callsite.function.clone());
        self.arity = Some(callsite.arity);
        self
    }

    #[inline]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[inline]
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("incoherent time range: since ({since}) is greater than until ({until})")]
    InvalidRange { since: TimeInt, until: TimeInt },
}

// --- Plans ---

/// How candidates get enumerated for a query.
#[derive(Clone, Debug, PartialEq)]
pub enum Driver {
    /// Point-scan one secondary index.
    Index(IndexKey),

    /// Range-scan the temporal index.
    Temporal(TimeRange),

    /// Walk the entire primary table. Allowed, but tracked in
    /// `full_scan_count` so operators notice queries that can't use an index.
    FullScan,
}

/// The filters the driver did not satisfy, evaluated against each candidate
/// after its primary lookup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Residuals {
    pub pid: Option<ProcessId>,
    pub event_type: Option<EventType>,
    pub time: Option<TimeRange>,
    pub correlation_id: Option<CorrelationId>,
    pub ast_node_id: Option<AstNodeId>,
    pub module: Option<Arc<str>>,
    pub function: Option<Arc<str>>,
    pub arity: Option<u32>,
}

impl Residuals {
    /// Whether `event` passes every residual predicate.
    ///
    /// An event that lacks an optional field never matches a filter on that
    /// field.
    pub fn matches(&self, event: &TraceEvent) -> bool {
        let Self {
            pid,
            event_type,
            time,
            correlation_id,
            ast_node_id,
            module,
            function,
            arity,
        } = self;

        if pid.is_some_and(|pid| event.pid != pid) {
            return false;
        }
        if event_type
            .as_ref()
            .is_some_and(|event_type| event.event_type != *event_type)
        {
            return false;
        }
        if time.is_some_and(|time| !time.contains(event.timestamp)) {
            return false;
        }
        if correlation_id
            .as_ref()
            .is_some_and(|correlation_id| event.correlation_id.as_ref() != Some(correlation_id))
        {
            return false;
        }
        if ast_node_id
            .as_ref()
            .is_some_and(|ast_node_id| event.ast_node_id.as_ref() != Some(ast_node_id))
        {
            return false;
        }
        if module
            .as_ref()
            .is_some_and(|module| event.callsite.module != *module)
        {
            return false;
        }
        if function
            .as_ref()
            .is_some_and(|function| event.callsite.function != *function)
        {
            return false;
        }
        if arity.is_some_and(|arity| event.callsite.arity != arity) {
            return false;
        }

        true
    }
}

/// An executable query plan: a driver to enumerate candidates, residual
/// predicates to keep or drop them, and the requested order and bound.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub driver: Driver,
    pub residuals: Residuals,
    pub order: Option<Order>,
    pub limit: usize,
}

/// Picks the most selective driver for a filter set.
///
/// The cascade is static, no runtime statistics involved:
///
/// 1. `correlation_id` (correlation groups are typically small).
/// 2. `ast_node_id`.
/// 3. the full `(module, function, arity)` triple.
/// 4. `pid`.
/// 5. a time bound (`since`/`until`), range-scanning the temporal index.
/// 6. a full primary scan.
///
/// Whatever the chosen driver does not satisfy becomes a residual predicate;
/// in particular a partial function filter (say, `module` alone) always
/// degrades to residuals.
pub fn plan(expr: &QueryExpr, default_limit: usize) -> Result<Plan, PlanError> {
    let QueryExpr {
        pid,
        event_type,
        since,
        until,
        correlation_id,
        ast_node_id,
        module,
        function,
        arity,
        limit,
        order,
    } = expr.clone();

    if let (Some(since), Some(until)) = (since, until) {
        if since > until {
            return Err(PlanError::InvalidRange { since, until });
        }
    }

    let time = if since.is_some() || until.is_some() {
        Some(TimeRange::new(
            since.unwrap_or(TimeInt::MIN),
            until.unwrap_or(TimeInt::MAX),
        ))
    } else {
        None
    };

    let mut residuals = Residuals {
        pid,
        event_type,
        time,
        correlation_id,
        ast_node_id,
        module,
        function,
        arity,
    };

    let driver = if let Some(correlation_id) = residuals.correlation_id.take() {
        Driver::Index(IndexKey::Correlation(correlation_id))
    } else if let Some(ast_node_id) = residuals.ast_node_id.take() {
        Driver::Index(IndexKey::AstNode(ast_node_id))
    } else if let (Some(module), Some(function), Some(arity)) = (
        residuals.module.clone(),
        residuals.function.clone(),
        residuals.arity,
    ) {
        residuals.module = None;
        residuals.function = None;
        residuals.arity = None;
        Driver::Index(IndexKey::Function(CallSite {
            module,
            function,
            arity,
        }))
    } else if let Some(pid) = residuals.pid.take() {
        Driver::Index(IndexKey::Process(pid))
    } else if let Some(time) = residuals.time.take() {
        Driver::Temporal(time)
    } else {
        Driver::FullScan
    };

    Ok(Plan {
        driver,
        residuals,
        order,
        limit: limit.unwrap_or(default_limit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(plan: &Plan) -> &'static str {
        match &plan.driver {
            Driver::Index(IndexKey::Process(_)) => "process",
            Driver::Index(IndexKey::Function(_)) => "function",
            Driver::Index(IndexKey::Correlation(_)) => "correlation",
            Driver::Index(IndexKey::AstNode(_)) => "ast_node",
            Driver::Temporal(_) => "temporal",
            Driver::FullScan => "full_scan",
        }
    }

    #[test]
    fn selectivity_cascade() {
        let everything = QueryExpr::all()
            .with_pid(1)
            .with_since(0)
            .with_until(10)
            .with_correlation_id("c")
            .with_ast_node_id("n")
            .with_module("m")
            .with_function("f")
            .with_arity(2);

        let p = plan(&everything, 100).unwrap();
        assert_eq!(kind_of(&p), "correlation");
        // Everything else is residual, including the other optional-id filter.
        assert!(p.residuals.ast_node_id.is_some());
        assert!(p.residuals.pid.is_some());
        assert!(p.residuals.time.is_some());
        assert!(p.residuals.module.is_some());

        let p = plan(&QueryExpr::all().with_ast_node_id("n").with_pid(1), 100).unwrap();
        assert_eq!(kind_of(&p), "ast_node");

        let p = plan(
            &QueryExpr::all()
                .with_module("m")
                .with_function("f")
                .with_arity(0),
            100,
        )
        .unwrap();
        assert_eq!(kind_of(&p), "function");
        assert!(p.residuals.module.is_none());

        // A partial function filter cannot drive; it degrades to residuals.
        let p = plan(&QueryExpr::all().with_module("m").with_pid(1), 100).unwrap();
        assert_eq!(kind_of(&p), "process");
        assert!(p.residuals.module.is_some());

        let p = plan(&QueryExpr::all().with_since(5), 100).unwrap();
        assert_eq!(kind_of(&p), "temporal");
        assert_eq!(
            p.driver,
            Driver::Temporal(TimeRange::new(5, TimeInt::MAX))
        );

        let p = plan(&QueryExpr::all(), 100).unwrap();
        assert_eq!(kind_of(&p), "full_scan");
        assert_eq!(p.limit, 100);
    }

    #[test]
    fn incoherent_range_is_rejected() {
        let expr = QueryExpr::all().with_since(10).with_until(5);
        assert_eq!(
            plan(&expr, 100),
            Err(PlanError::InvalidRange {
                since: TimeInt::new(10),
                until: TimeInt::new(5),
            })
        );
    }
}
