// Schema migration system for database versioning

use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::error::{IndexerError, Result};

/// Current schema version - increment when adding migrations
pub const LATEST_SCHEMA_VERSION: i32 = 3;

/// Run all pending schema migrations, then make sure every table exists.
pub(super) fn run_migrations(conn: &Connection) -> Result<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;
    let target_version = LATEST_SCHEMA_VERSION;

    if current_version >= target_version {
        debug!(
            "Database schema is up-to-date at version {}",
            current_version
        );
    } else {
        info!(
            "Running schema migrations: version {} -> {}",
            current_version, target_version
        );

        for version in (current_version + 1)..=target_version {
            info!("Applying migration to version {}", version);
            apply_migration(conn, version)?;
            record_migration(conn, version)?;
            info!("✅ Migration to version {} completed", version);
        }
    }

    super::schema::initialize_schema(conn)
}

fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version (0 for a fresh database)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migration_001_initial_schema(conn)?,
        2 => migration_002_add_deepwiki_columns(conn)?,
        3 => migration_003_unique_sync_id(conn)?,
        _ => {
            return Err(IndexerError::Config(format!(
                "Unknown migration version: {}",
                version
            )));
        }
    }
    Ok(())
}

fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    let description = match version {
        1 => "Initial schema",
        2 => "Add deepwiki tracking columns to workspaces",
        3 => "Make embedding_states.sync_id unique",
        _ => "Unknown migration",
    };

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version, applied_at, description)
         VALUES (?1, ?2, ?3)",
        params![version, Utc::now().timestamp(), description],
    )?;

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Check if a column exists in a table
pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;

    let columns: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(columns.iter().any(|c| c == column))
}

/// Migration 001: initial tables. The DDL itself lives in `schema` and is
/// applied after migrations, so this only marks the version.
fn migration_001_initial_schema(_conn: &Connection) -> Result<()> {
    Ok(())
}

/// Migration 002: deepwiki pipeline counters on workspaces
fn migration_002_add_deepwiki_columns(conn: &Connection) -> Result<()> {
    info!("Migration 002: Adding deepwiki columns to workspaces table");

    if !table_exists(conn, "workspaces")? {
        debug!("Workspaces table doesn't exist yet (fresh database), skipping migration");
        return Ok(());
    }

    let columns = [
        ("deepwiki_file_num", "INTEGER NOT NULL DEFAULT 0"),
        ("deepwiki_ts", "INTEGER NOT NULL DEFAULT 0"),
        ("deepwiki_message", "TEXT NOT NULL DEFAULT ''"),
        ("deepwiki_failed_file_paths", "TEXT NOT NULL DEFAULT ''"),
    ];

    for (column, definition) in columns {
        if has_column(conn, "workspaces", column)? {
            warn!("Column {} already exists, skipping", column);
            continue;
        }
        conn.execute(
            &format!("ALTER TABLE workspaces ADD COLUMN {} {}", column, definition),
            [],
        )?;
    }

    info!("✅ Deepwiki columns added to workspaces table");
    Ok(())
}

/// Migration 003: `sync_id` becomes a unique key. Older databases may hold
/// duplicates; the newest row per sync_id wins.
fn migration_003_unique_sync_id(conn: &Connection) -> Result<()> {
    info!("Migration 003: Making embedding_states.sync_id unique");

    if !table_exists(conn, "embedding_states")? {
        debug!("Embedding states table doesn't exist yet (fresh database), skipping migration");
        return Ok(());
    }

    let removed = conn.execute(
        "DELETE FROM embedding_states
         WHERE id NOT IN (SELECT MAX(id) FROM embedding_states GROUP BY sync_id)",
        [],
    )?;
    if removed > 0 {
        warn!("Removed {} embedding states with a duplicate sync_id", removed);
    }

    conn.execute("DROP INDEX IF EXISTS idx_embedding_states_sync_id", [])?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_embedding_states_sync_id_unique
         ON embedding_states(sync_id)",
        [],
    )?;

    info!("✅ embedding_states.sync_id is now unique");
    Ok(())
}
