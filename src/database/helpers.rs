// Helper functions and utilities

use rusqlite::{Connection, Row};
use std::ops::Deref;
use tracing::warn;

use super::pool::PooledConnection;
use super::types::{CodegraphState, EmbeddingState, Event, Workspace};
use crate::error::Result;

/// Standard SELECT column list for Event queries
/// Keep in sync with row_to_event()
pub(crate) const EVENT_COLUMNS: &str = "id, workspace_path, event_type, source_file_path, \
     target_file_path, sync_id, file_hash, embedding_status, codegraph_status, \
     created_at, updated_at";

pub(crate) const EMBEDDING_STATE_COLUMNS: &str =
    "sync_id, workspace_path, file_path, status, message, created_at, updated_at";

pub(crate) const CODEGRAPH_STATE_COLUMNS: &str =
    "workspace_path, file_path, status, message, created_at, updated_at";

pub(crate) const WORKSPACE_COLUMNS: &str = "id, workspace_name, workspace_path, active, file_num, \
     embedding_file_num, embedding_ts, embedding_message, embedding_failed_file_paths, \
     codegraph_file_num, codegraph_ts, codegraph_message, codegraph_failed_file_paths, \
     deepwiki_file_num, deepwiki_ts, deepwiki_message, deepwiki_failed_file_paths, \
     created_at, updated_at";

/// An open write transaction on a pooled connection.
///
/// Rolls back on drop unless `commit` succeeded. Deref gives the underlying
/// connection so statements run inside the transaction.
pub struct Transaction {
    conn: PooledConnection,
    finished: bool,
}

impl Transaction {
    pub(crate) fn begin(conn: PooledConnection) -> Result<Self> {
        // IMMEDIATE takes the write lock up front so two writers never
        // deadlock upgrading from a read lock.
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// Commit the current transaction
    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    /// Rollback the current transaction
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Deref for Transaction {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back abandoned transaction: {}", e);
            }
        }
    }
}

/// `?, ?, ?` for an IN list of `count` items.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get("id")?,
        workspace_path: row.get("workspace_path")?,
        event_type: row.get("event_type")?,
        source_file_path: row.get("source_file_path")?,
        target_file_path: row.get("target_file_path")?,
        sync_id: row.get("sync_id")?,
        file_hash: row.get("file_hash")?,
        embedding_status: row.get("embedding_status")?,
        codegraph_status: row.get("codegraph_status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn row_to_embedding_state(row: &Row) -> rusqlite::Result<EmbeddingState> {
    Ok(EmbeddingState {
        sync_id: row.get("sync_id")?,
        workspace_path: row.get("workspace_path")?,
        file_path: row.get("file_path")?,
        status: row.get("status")?,
        message: row.get("message")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn row_to_codegraph_state(row: &Row) -> rusqlite::Result<CodegraphState> {
    Ok(CodegraphState {
        workspace_path: row.get("workspace_path")?,
        file_path: row.get("file_path")?,
        status: row.get("status")?,
        message: row.get("message")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn row_to_workspace(row: &Row) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: row.get("id")?,
        workspace_name: row.get("workspace_name")?,
        workspace_path: row.get("workspace_path")?,
        active: row.get("active")?,
        file_num: row.get("file_num")?,
        embedding_file_num: row.get("embedding_file_num")?,
        embedding_ts: row.get("embedding_ts")?,
        embedding_message: row.get("embedding_message")?,
        embedding_failed_file_paths: row.get("embedding_failed_file_paths")?,
        codegraph_file_num: row.get("codegraph_file_num")?,
        codegraph_ts: row.get("codegraph_ts")?,
        codegraph_message: row.get("codegraph_message")?,
        codegraph_failed_file_paths: row.get("codegraph_failed_file_paths")?,
        deepwiki_file_num: row.get("deepwiki_file_num")?,
        deepwiki_ts: row.get("deepwiki_ts")?,
        deepwiki_message: row.get("deepwiki_message")?,
        deepwiki_failed_file_paths: row.get("deepwiki_failed_file_paths")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
