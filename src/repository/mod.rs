//! Repositories over the shared database
//!
//! One trait per ledger; collaborators depend on the trait, never on the
//! SQLite struct behind it. Per-workspace JSON documents live in `storage`.

use rusqlite::types::Value;
use std::collections::HashMap;

use crate::database::{CodegraphStatus, EmbeddingStatus, EventType};
use crate::error::{IndexerError, Result};

mod codegraph_state;
mod embedding_state;
mod event;
pub mod storage;
mod workspace;

pub use codegraph_state::{CodegraphStateRepository, SqliteCodegraphStateRepository};
pub use embedding_state::{EmbeddingStateRepository, SqliteEmbeddingStateRepository};
pub use event::{EventFilter, EventRepository, SqliteEventRepository};
pub use storage::{
    CodebaseConfig, CodebaseEmbeddingConfig, EmbeddingFileRepository, StorageManager,
};
pub use workspace::{SqliteWorkspaceRepository, WorkspaceRepository};

/// Pass as `limit` to fetch every matching row (paged internally).
pub const NO_LIMIT: i64 = -1;

/// Rows per page for unbounded reads and rows per statement for batch writes.
pub const PAGE_SIZE: usize = 1000;

/// Column -> value map for the dynamic partial-update path.
pub type UpdateMap = HashMap<String, Value>;

/// Declared type of a column writable through an update map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Text,
    Integer,
    /// Stored as 0/1.
    Bool,
    EventType,
    EmbeddingStatus,
    CodegraphStatus,
}

impl ColumnKind {
    /// Convert `value` to what the column stores, or `None` when it cannot be
    /// represented without corrupting the row.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ColumnKind::Text, Value::Text(s)) => Some(Value::Text(s.clone())),
            (ColumnKind::Text, Value::Integer(i)) => Some(Value::Text(i.to_string())),
            (ColumnKind::Integer, Value::Integer(i)) => Some(Value::Integer(*i)),
            (ColumnKind::Integer, Value::Text(s)) => s.trim().parse().ok().map(Value::Integer),
            (ColumnKind::Bool, Value::Integer(i @ (0 | 1))) => Some(Value::Integer(*i)),
            (ColumnKind::Bool, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Integer(1)),
                "false" | "0" => Some(Value::Integer(0)),
                _ => None,
            },
            (ColumnKind::EventType, Value::Text(s)) => {
                let parsed = EventType::from_string(s);
                (parsed.as_str() == s).then(|| Value::Text(s.clone()))
            }
            (ColumnKind::EmbeddingStatus, raw) => {
                let status = EmbeddingStatus::from_i64(ordinal(raw)?)?;
                Some(Value::Integer(status.as_i64()))
            }
            (ColumnKind::CodegraphStatus, raw) => {
                let status = CodegraphStatus::from_i64(ordinal(raw)?)?;
                Some(Value::Integer(status.as_i64()))
            }
            _ => None,
        }
    }
}

fn ordinal(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => format!("'{}'", s),
        Value::Blob(b) => format!("<{} byte blob>", b.len()),
    }
}

/// Turn an update map into `SET` fragments.
///
/// Columns outside `allowed` are rejected, and every value is coerced to the
/// column's declared type before any SQL runs. Keys are sorted so the
/// generated SQL is stable.
pub(crate) fn build_set_clauses(
    table: &'static str,
    updates: &UpdateMap,
    allowed: &[(&str, ColumnKind)],
) -> Result<(Vec<String>, Vec<Value>)> {
    let mut keys: Vec<&String> = updates.keys().collect();
    keys.sort();

    let mut clauses = Vec::with_capacity(keys.len());
    let mut args = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(&(_, kind)) = allowed.iter().find(|(column, _)| *column == key.as_str()) else {
            return Err(IndexerError::InvalidColumn {
                table,
                column: key.clone(),
            });
        };

        let raw = &updates[key];
        let value = kind.coerce(raw).ok_or_else(|| IndexerError::InvalidValue {
            table,
            column: key.clone(),
            value: describe(raw),
        })?;

        clauses.push(format!("{} = ?", key));
        args.push(value);
    }
    Ok((clauses, args))
}
