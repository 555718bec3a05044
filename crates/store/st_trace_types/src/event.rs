use std::sync::Arc;

use crate::{SizeBytes, TimeInt};

// --- Identifiers ---

/// Declares a cheap-to-clone, opaque string identifier newtype.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Debug,
            Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            serde::Serialize,
        )]
        pub struct $name(Arc<str>);

        impl $name {
            #[inline]
            pub fn new(id: impl Into<Arc<str>>) -> Self {
                Self(id.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(id: &str) -> Self {
                Self(id.into())
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(id: String) -> Self {
                Self(id.into())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl SizeBytes for $name {
            #[inline]
            fn heap_size_bytes(&self) -> u64 {
                self.0.len() as u64
            }
        }
    };
}

string_id!(
    /// The unique identifier of a [`TraceEvent`], assumed unique across the
    /// traced process' lifetime.
    ///
    /// `Ord` so that equal-timestamp query results can break ties
    /// deterministically.
    EventId
);

string_id!(
    /// An opaque value grouping causally related events.
    CorrelationId
);

string_id!(
    /// An opaque string linking a runtime event to a static code-structure
    /// node.
    AstNodeId
);

string_id!(
    /// An opaque tag describing what kind of observation an event records
    /// (`call`, `return`, `spawn`, …). Never interpreted by the store; only
    /// ever compared for equality.
    EventType
);

/// An opaque handle to the process (or lightweight task) an event was
/// observed on.
///
/// Only ever compared and hashed, which is why it is represented as the
/// producer-side handle value itself.
#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct ProcessId(u64);

impl ProcessId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ProcessId {
    #[inline]
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<u32> for ProcessId {
    #[inline]
    fn from(raw: u32) -> Self {
        Self(raw as u64)
    }
}

impl From<i32> for ProcessId {
    #[inline]
    fn from(raw: i32) -> Self {
        Self(raw as u64)
    }
}

// Single `u64` wrapped, hashed with a single `write_u64`: safe to skip the
// hasher entirely.
impl nohash_hasher::IsEnabled for ProcessId {}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

// ---

/// The code location an event was observed at: a `(module, function, arity)`
/// triple.
#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct CallSite {
    pub module: Arc<str>,
    pub function: Arc<str>,
    pub arity: u32,
}

impl CallSite {
    #[inline]
    pub fn new(module: impl Into<Arc<str>>, function: impl Into<Arc<str>>, arity: u32) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            arity,
        }
    }
}

impl std::fmt::Display for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            module,
            function,
            arity,
        } = self;
        write!(f, "{module}:{function}/{arity}")
    }
}

impl SizeBytes for CallSite {
    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        (self.module.len() + self.function.len()) as u64
    }
}

// --- Events ---

/// An immutable record of a single runtime observation.
///
/// Created by the instrumentation pipeline, inserted into the event store
/// exactly once, never mutated, and destroyed only by pruning or an explicit
/// clear.
///
/// The store reads the identifying fields to maintain its indexes;
/// [`Self::payload`] is carried around untouched.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TraceEvent {
    pub event_id: EventId,

    /// Producer-side timestamp; see [`TimeInt`] for ordering caveats.
    pub timestamp: TimeInt,

    pub pid: ProcessId,

    pub callsite: CallSite,

    pub event_type: EventType,

    /// Present only for events that participate in a correlation group.
    pub correlation_id: Option<CorrelationId>,

    /// Present only for events linked to a static code node.
    pub ast_node_id: Option<AstNodeId>,

    /// Arbitrary producer data. Never inspected.
    pub payload: serde_json::Value,
}

impl TraceEvent {
    pub fn new(
        event_id: impl Into<EventId>,
        timestamp: impl Into<TimeInt>,
        pid: impl Into<ProcessId>,
        callsite: CallSite,
        event_type: impl Into<EventType>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp: timestamp.into(),
            pid: pid.into(),
            callsite,
            event_type: event_type.into(),
            correlation_id: None,
            ast_node_id: None,
            payload: serde_json::Value::Null,
        }
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
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

impl SizeBytes for TraceEvent {
    fn heap_size_bytes(&self) -> u64 {
        let Self {
            event_id,
            timestamp: _,
            pid: _,
            callsite,
            event_type,
            correlation_id,
            ast_node_id,
            payload,
        } = self;

        event_id.heap_size_bytes()
            + callsite.heap_size_bytes()
            + event_type.heap_size_bytes()
            + correlation_id.heap_size_bytes()
            + ast_node_id.heap_size_bytes()
            + payload.heap_size_bytes()
    }
}
