// Database schema initialization and table creation

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Create every table and index. Idempotent.
pub(super) fn initialize_schema(conn: &Connection) -> Result<()> {
    debug!("Creating database schema");

    create_workspaces_table(conn)?;
    create_events_table(conn)?;
    create_embedding_states_table(conn)?;
    create_codegraph_states_table(conn)?;

    debug!("Database schema created successfully");
    Ok(())
}

/// One row per tracked directory; `workspace_path` is the natural key.
fn create_workspaces_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS workspaces (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_name TEXT NOT NULL,
            workspace_path TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 1,
            file_num INTEGER NOT NULL DEFAULT 0,
            embedding_file_num INTEGER NOT NULL DEFAULT 0,
            embedding_ts INTEGER NOT NULL DEFAULT 0,
            embedding_message TEXT NOT NULL DEFAULT '',
            embedding_failed_file_paths TEXT NOT NULL DEFAULT '',
            codegraph_file_num INTEGER NOT NULL DEFAULT 0,
            codegraph_ts INTEGER NOT NULL DEFAULT 0,
            codegraph_message TEXT NOT NULL DEFAULT '',
            codegraph_failed_file_paths TEXT NOT NULL DEFAULT '',
            deepwiki_file_num INTEGER NOT NULL DEFAULT 0,
            deepwiki_ts INTEGER NOT NULL DEFAULT 0,
            deepwiki_message TEXT NOT NULL DEFAULT '',
            deepwiki_failed_file_paths TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_workspaces_active ON workspaces(active)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_workspaces_created_at ON workspaces(created_at)",
        [],
    )?;

    debug!("Created workspaces table and indexes");
    Ok(())
}

fn create_events_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_path TEXT NOT NULL,
            event_type TEXT NOT NULL,
            source_file_path TEXT NOT NULL DEFAULT '',
            target_file_path TEXT NOT NULL DEFAULT '',
            sync_id TEXT NOT NULL DEFAULT '',
            file_hash TEXT NOT NULL DEFAULT '',
            embedding_status INTEGER NOT NULL DEFAULT 1,
            codegraph_status INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    for sql in [
        "CREATE INDEX IF NOT EXISTS idx_events_workspace ON events(workspace_path)",
        "CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type)",
        "CREATE INDEX IF NOT EXISTS idx_events_embedding_status ON events(embedding_status)",
        "CREATE INDEX IF NOT EXISTS idx_events_codegraph_status ON events(codegraph_status)",
        "CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_events_updated_at ON events(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_events_workspace_type ON events(workspace_path, event_type)",
        "CREATE INDEX IF NOT EXISTS idx_events_workspace_embedding ON events(workspace_path, embedding_status)",
        "CREATE INDEX IF NOT EXISTS idx_events_workspace_source ON events(workspace_path, source_file_path, created_at)",
    ] {
        conn.execute(sql, [])?;
    }

    debug!("Created events table and indexes");
    Ok(())
}

/// `sync_id` is unique. When the caller has none, the AUTOINCREMENT rowid
/// becomes the externally visible sync_id.
fn create_embedding_states_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS embedding_states (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sync_id TEXT NOT NULL DEFAULT '',
            workspace_path TEXT NOT NULL,
            file_path TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 1,
            message TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    for sql in [
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_embedding_states_sync_id_unique ON embedding_states(sync_id)",
        "CREATE INDEX IF NOT EXISTS idx_embedding_states_workspace ON embedding_states(workspace_path)",
        "CREATE INDEX IF NOT EXISTS idx_embedding_states_status ON embedding_states(status)",
        "CREATE INDEX IF NOT EXISTS idx_embedding_states_created_at ON embedding_states(created_at)",
    ] {
        conn.execute(sql, [])?;
    }

    debug!("Created embedding_states table and indexes");
    Ok(())
}

fn create_codegraph_states_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS codegraph_states (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_path TEXT NOT NULL,
            file_path TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 1,
            message TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(workspace_path, file_path)
        )",
        [],
    )?;

    for sql in [
        "CREATE INDEX IF NOT EXISTS idx_codegraph_states_workspace ON codegraph_states(workspace_path)",
        "CREATE INDEX IF NOT EXISTS idx_codegraph_states_status ON codegraph_states(status)",
        "CREATE INDEX IF NOT EXISTS idx_codegraph_states_created_at ON codegraph_states(created_at)",
    ] {
        conn.execute(sql, [])?;
    }

    debug!("Created codegraph_states table and indexes");
    Ok(())
}
