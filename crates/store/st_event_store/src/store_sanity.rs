use std::hash::{BuildHasher, Hash};

use st_log::warn;
use st_trace_types::{EventId, TimeInt, TraceEvent};

use crate::{EventStore, IndexKind};

// ---

#[derive(thiserror::Error, Debug)]
pub enum SanityError {
    #[error("the {index} index is missing an entry for event '{event_id}'")]
    MissingIndexEntry { index: IndexKind, event_id: EventId },

    #[error("the {index} index references '{event_id}', which has no primary row")]
    DanglingIndexEntry { index: IndexKind, event_id: EventId },

    #[error("the {index} index references '{event_id}' under a key that doesn't match the event")]
    MisfiledIndexEntry { index: IndexKind, event_id: EventId },

    #[error("the {index} index holds {got} entries, expected {expected}")]
    EntryCountMismatch {
        index: IndexKind,
        expected: u64,
        got: u64,
    },

    #[error("the {stat} stat is out of sync: expected {expected:?}, got {got:?}")]
    TimeBoundMismatch {
        stat: &'static str,
        expected: Option<TimeInt>,
        got: Option<TimeInt>,
    },
}

pub type SanityResult<T> = ::std::result::Result<T, SanityError>;

// --- Event store ---

impl EventStore {
    /// Runs the sanity check suite for the entire store.
    ///
    /// Verifies that every primary row is reachable through each index it
    /// should participate in, that no index references an id without a
    /// primary row, that no index holds duplicate references, and that the
    /// cached time bounds agree with the temporal index.
    ///
    /// Returns an error if anything looks wrong.
    pub fn sanity_check(&self) -> SanityResult<()> {
        let mut num_with_correlation = 0u64;
        let mut num_with_ast_node = 0u64;

        // Every primary row must be indexed everywhere it belongs.
        for (event_id, event) in &self.primary {
            let in_temporal = self
                .temporal
                .get(&event.timestamp)
                .is_some_and(|ids| ids.contains(event_id));
            if !in_temporal {
                return Err(SanityError::MissingIndexEntry {
                    index: IndexKind::Temporal,
                    event_id: event_id.clone(),
                });
            }

            let in_process = self
                .process
                .get(&event.pid)
                .is_some_and(|ids| ids.contains(event_id));
            if !in_process {
                return Err(SanityError::MissingIndexEntry {
                    index: IndexKind::Process,
                    event_id: event_id.clone(),
                });
            }

            let in_function = self
                .function
                .get(&event.callsite)
                .is_some_and(|ids| ids.contains(event_id));
            if !in_function {
                return Err(SanityError::MissingIndexEntry {
                    index: IndexKind::Function,
                    event_id: event_id.clone(),
                });
            }

            if let Some(correlation_id) = &event.correlation_id {
                num_with_correlation += 1;
                let in_correlation = self
                    .correlation
                    .get(correlation_id)
                    .is_some_and(|ids| ids.contains(event_id));
                if !in_correlation {
                    return Err(SanityError::MissingIndexEntry {
                        index: IndexKind::Correlation,
                        event_id: event_id.clone(),
                    });
                }
            }

            if let Some(ast_node_id) = &event.ast_node_id {
                num_with_ast_node += 1;
                let in_ast_node = self
                    .ast_node
                    .get(ast_node_id)
                    .is_some_and(|ids| ids.contains(event_id));
                if !in_ast_node {
                    return Err(SanityError::MissingIndexEntry {
                        index: IndexKind::AstNode,
                        event_id: event_id.clone(),
                    });
                }
            }
        }

        // No index may reference an id without a primary row, nor file an id
        // under a key that doesn't match the event's own fields.
        for (timestamp, ids) in &self.temporal {
            for event_id in ids {
                let event = self.primary.get(event_id).ok_or_else(|| {
                    SanityError::DanglingIndexEntry {
                        index: IndexKind::Temporal,
                        event_id: event_id.clone(),
                    }
                })?;
                if event.timestamp != *timestamp {
                    return Err(SanityError::MisfiledIndexEntry {
                        index: IndexKind::Temporal,
                        event_id: event_id.clone(),
                    });
                }
            }
        }

        for (pid, ids) in &self.process {
            for event_id in ids {
                let event = self.primary.get(event_id).ok_or_else(|| {
                    SanityError::DanglingIndexEntry {
                        index: IndexKind::Process,
                        event_id: event_id.clone(),
                    }
                })?;
                if event.pid != *pid {
                    return Err(SanityError::MisfiledIndexEntry {
                        index: IndexKind::Process,
                        event_id: event_id.clone(),
                    });
                }
            }
        }

        for (callsite, ids) in &self.function {
            for event_id in ids {
                let event = self.primary.get(event_id).ok_or_else(|| {
                    SanityError::DanglingIndexEntry {
                        index: IndexKind::Function,
                        event_id: event_id.clone(),
                    }
                })?;
                if event.callsite != *callsite {
                    return Err(SanityError::MisfiledIndexEntry {
                        index: IndexKind::Function,
                        event_id: event_id.clone(),
                    });
                }
            }
        }

        for (correlation_id, ids) in &self.correlation {
            for event_id in ids {
                let event = self.primary.get(event_id).ok_or_else(|| {
                    SanityError::DanglingIndexEntry {
                        index: IndexKind::Correlation,
                        event_id: event_id.clone(),
                    }
                })?;
                if event.correlation_id.as_ref() != Some(correlation_id) {
                    return Err(SanityError::MisfiledIndexEntry {
                        index: IndexKind::Correlation,
                        event_id: event_id.clone(),
                    });
                }
            }
        }

        for (ast_node_id, ids) in &self.ast_node {
            for event_id in ids {
                let event = self.primary.get(event_id).ok_or_else(|| {
                    SanityError::DanglingIndexEntry {
                        index: IndexKind::AstNode,
                        event_id: event_id.clone(),
                    }
                })?;
                if event.ast_node_id.as_ref() != Some(ast_node_id) {
                    return Err(SanityError::MisfiledIndexEntry {
                        index: IndexKind::AstNode,
                        event_id: event_id.clone(),
                    });
                }
            }
        }

        // Entry counts: exactly one reference per participating event.
        // Together with the membership checks above this rules out duplicate
        // references.
        let expectations = [
            (IndexKind::Temporal, self.num_events(), self.temporal_entry_count()),
            (IndexKind::Process, self.num_events(), self.process_entry_count()),
            (IndexKind::Function, self.num_events(), self.function_entry_count()),
            (
                IndexKind::Correlation,
                num_with_correlation,
                self.correlation_entry_count(),
            ),
            (
                IndexKind::AstNode,
                num_with_ast_node,
                self.ast_node_entry_count(),
            ),
        ];
        for (index, expected, got) in expectations {
            if expected != got {
                return Err(SanityError::EntryCountMismatch {
                    index,
                    expected,
                    got,
                });
            }
        }

        // The cached time bounds must agree with the temporal index.
        let oldest = self.temporal.keys().next().copied();
        if self.oldest_timestamp != oldest {
            return Err(SanityError::TimeBoundMismatch {
                stat: "oldest_timestamp",
                expected: oldest,
                got: self.oldest_timestamp,
            });
        }
        let newest = self.temporal.keys().next_back().copied();
        if self.newest_timestamp != newest {
            return Err(SanityError::TimeBoundMismatch {
                stat: "newest_timestamp",
                expected: newest,
                got: self.newest_timestamp,
            });
        }

        Ok(())
    }

    /// Removes every index entry that references an id with no primary row,
    /// dropping keys whose id lists run empty.
    ///
    /// The repair companion to [`Self::sanity_check`]: the coordinator calls
    /// this after a query fails with [`crate::QueryError::Internal`], then
    /// retries the query once. Returns how many entries were swept.
    pub fn sweep_dangling(&mut self) -> u64 {
        let mut num_swept = 0u64;

        {
            let Self {
                primary,
                temporal,
                process,
                function,
                correlation,
                ast_node,
                ..
            } = self;

            temporal.retain(|_, ids| {
                ids.retain(|id| {
                    let keep = primary.contains_key(id);
                    if !keep {
                        num_swept += 1;
                    }
                    keep
                });
                !ids.is_empty()
            });

            sweep_index(process, primary, &mut num_swept);
            sweep_index(function, primary, &mut num_swept);
            sweep_index(correlation, primary, &mut num_swept);
            sweep_index(ast_node, primary, &mut num_swept);
        }

        self.refresh_time_bounds();

        if num_swept > 0 {
            warn!(kind = "repair", num_swept, "swept dangling index entries");
        }

        num_swept
    }
}

/// Sweeps one `key → ids` index, dropping keys whose id lists run empty.
fn sweep_index<K, S>(
    index: &mut std::collections::HashMap<K, Vec<EventId>, S>,
    primary: &ahash::HashMap<EventId, TraceEvent>,
    num_swept: &mut u64,
) where
    K: Eq + Hash,
    S: BuildHasher,
{
    index.retain(|_, ids| {
        ids.retain(|id| {
            let keep = primary.contains_key(id);
            if !keep {
                *num_swept += 1;
            }
            keep
        });
        !ids.is_empty()
    });
}
