//! Text logging for the ScopeTrace crates.
//!
//! * `trace`: spammy things (individual inserts, per-candidate query steps)
//! * `debug`: things that might be useful when debugging (plans, prune passes)
//! * `info`: things that we want to show to users
//! * `warn`: problems that we can recover from
//! * `error`: problems that lead to loss of functionality or data

// The tracing macros support structured fields, which we rely on for the
// `kind = "insert"` / `kind = "query"` / `kind = "gc"` log lines:
pub use tracing::{debug, error, info, trace, warn};

mod setup;

pub use setup::setup_logging;
