// SQLite connection pool
//
// r2d2 owns checkout, lifetime and idle expiry. `ConnectionOptions` applies
// the per-connection pragmas whenever r2d2 opens a new connection.

use r2d2::CustomizeConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::Result;

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

/// A checked-out connection; goes back to the pool on drop.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pragmas every pooled connection starts with.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub enable_wal: bool,
    pub enable_foreign_keys: bool,
    pub busy_timeout: Duration,
}

impl CustomizeConnection<Connection, rusqlite::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)?;

        if self.enable_wal {
            // journal_mode answers with the resulting mode, so it cannot go through execute
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        if self.enable_foreign_keys {
            conn.pragma_update(None, "foreign_keys", "ON")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub path: PathBuf,
    pub max_open: u32,
    /// Connections r2d2 keeps warm. Never above `max_open`.
    pub min_idle: u32,
    pub max_lifetime: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub checkout_timeout: Duration,
    pub options: ConnectionOptions,
}

impl PoolConfig {
    pub fn from_database_config(config: &DatabaseConfig) -> Self {
        let max_open = u32::try_from(config.max_open_conns.max(1)).unwrap_or(u32::MAX);
        let min_idle = u32::try_from(config.max_idle_conns)
            .unwrap_or(u32::MAX)
            .min(max_open);

        Self {
            path: config.database_path(),
            max_open,
            min_idle,
            max_lifetime: non_zero(config.conn_max_lifetime()),
            idle_timeout: non_zero(config.conn_max_idle_time()),
            checkout_timeout: Duration::from_secs(30),
            options: ConnectionOptions {
                enable_wal: config.enable_wal,
                enable_foreign_keys: config.enable_foreign_keys,
                busy_timeout: Duration::from_millis(5000),
            },
        }
    }
}

/// Zero disables the limit.
fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

/// Build the pool. r2d2 opens `min_idle` connections up front, so a bad path
/// fails here rather than on the first query.
pub fn open_pool(config: &PoolConfig) -> Result<SqlitePool> {
    let manager = SqliteConnectionManager::file(&config.path);
    let pool = r2d2::Pool::builder()
        .max_size(config.max_open)
        .min_idle(Some(config.min_idle))
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connection_timeout(config.checkout_timeout)
        .connection_customizer(Box::new(config.options))
        .build(manager)?;

    debug!(
        "Connection pool ready for {} (max_open={}, min_idle={})",
        config.path.display(),
        config.max_open,
        config.min_idle
    );
    Ok(pool)
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub open: usize,
    pub idle: usize,
}

impl From<r2d2::State> for PoolStats {
    fn from(state: r2d2::State) -> Self {
        Self {
            open: state.connections as usize,
            idle: state.idle_connections as usize,
        }
    }
}
