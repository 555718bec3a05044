use st_format::{format_bytes, format_uint};

use crate::{Driver, EventStore, IndexKey, IndexKind};

// --- Indexes ---

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Temporal => "temporal",
            Self::Process => "process",
            Self::Function => "function",
            Self::Correlation => "correlation",
            Self::AstNode => "ast_node",
        })
    }
}

impl std::fmt::Display for IndexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process(pid) => write!(f, "process:{pid}"),
            Self::Function(callsite) => write!(f, "function:{callsite}"),
            Self::Correlation(correlation_id) => write!(f, "correlation:{correlation_id}"),
            Self::AstNode(ast_node_id) => write!(f, "ast_node:{ast_node_id}"),
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(key) => write!(f, "Index({key})"),
            Self::Temporal(range) => write!(f, "Temporal({range})"),
            Self::FullScan => f.write_str("FullScan"),
        }
    }
}

// --- Event store ---

impl std::fmt::Display for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            config,
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

        f.write_str("EventStore {\n")?;

        f.write_str(&indent::indent_all_by(4, format!("config: {config:?}\n")))?;

        f.write_str(&indent::indent_all_by(
            4,
            format!(
                "primary: {} events, ~{}\n",
                format_uint(primary.len() as _),
                format_bytes(*memory_bytes_estimate as _),
            ),
        ))?;

        f.write_str(&indent::indent_all_by(
            4,
            format!(
                "time bounds: {} → {}\n",
                oldest_timestamp.map_or_else(|| "-".to_owned(), |t| t.to_string()),
                newest_timestamp.map_or_else(|| "-".to_owned(), |t| t.to_string()),
            ),
        ))?;

        f.write_str(&indent::indent_all_by(4, "indexes: [\n"))?;
        for (kind, num_keys, num_entries) in [
            (
                IndexKind::Temporal,
                temporal.len() as u64,
                self.temporal_entry_count(),
            ),
            (
                IndexKind::Process,
                process.len() as u64,
                self.process_entry_count(),
            ),
            (
                IndexKind::Function,
                function.len() as u64,
                self.function_entry_count(),
            ),
            (
                IndexKind::Correlation,
                correlation.len() as u64,
                self.correlation_entry_count(),
            ),
            (
                IndexKind::AstNode,
                ast_node.len() as u64,
                self.ast_node_entry_count(),
            ),
        ] {
            f.write_str(&indent::indent_all_by(
                8,
                format!(
                    "{kind}: {} keys, {} entries\n",
                    format_uint(num_keys),
                    format_uint(num_entries),
                ),
            ))?;
        }
        f.write_str(&indent::indent_all_by(4, "]\n"))?;

        f.write_str("}")
    }
}
