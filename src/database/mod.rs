//! Database layer - single embedded SQLite file behind an r2d2 pool
//!
//! `SqliteManager` owns the pool. Repositories hold an `Arc<dyn DatabaseManager>`
//! and check a connection out per call; they never cache connections.

use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::{IndexerError, Result, ResultExt};

// Module declarations
mod bulk_operations;
mod helpers;
mod migrations;
mod pool;
mod schema;
pub mod status;
pub mod types;

// Re-export public types
pub use helpers::Transaction;
pub(crate) use helpers::{
    CODEGRAPH_STATE_COLUMNS, EMBEDDING_STATE_COLUMNS, EVENT_COLUMNS, WORKSPACE_COLUMNS,
    placeholders, row_to_codegraph_state, row_to_embedding_state, row_to_event, row_to_workspace,
};
pub use migrations::{LATEST_SCHEMA_VERSION, get_schema_version};
pub use pool::{ConnectionOptions, PoolConfig, PoolStats, PooledConnection, SqlitePool};
pub use status::*;
pub use types::*;

/// Tables `clear_table` may touch. Never interpolate anything else.
pub const CLEARABLE_TABLES: [&str; 2] = ["workspaces", "events"];

/// What repositories need from the storage layer.
pub trait DatabaseManager: Send + Sync {
    /// Open the pool, apply pragmas and bring the schema up to date.
    fn initialize(&self) -> Result<()>;

    fn close(&self) -> Result<()>;

    /// Check out a pooled connection.
    fn get_conn(&self) -> Result<PooledConnection>;

    /// Start an IMMEDIATE transaction; rolls back when dropped uncommitted.
    fn begin_transaction(&self) -> Result<Transaction>;

    /// Batched delete of every row using the configured batch size and delay.
    fn clear_table(&self, table: &str) -> Result<ClearTableStats>;

    fn clear_table_with_options(
        &self,
        table: &str,
        options: &ClearTableOptions,
    ) -> Result<ClearTableStats>;

    /// Run a SQL script in a single transaction.
    fn execute_sql_file(&self, path: &Path) -> Result<()>;
}

pub struct SqliteManager {
    config: DatabaseConfig,
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
        }
    }

    /// Build and initialize in one step.
    pub fn open(config: DatabaseConfig) -> Result<Arc<Self>> {
        let manager = Arc::new(Self::new(config));
        manager.initialize()?;
        Ok(manager)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.current_pool().ok().map(|pool| pool.state().into())
    }

    fn current_pool(&self) -> Result<SqlitePool> {
        let guard = self.pool.read().map_err(|_| IndexerError::PoolClosed)?;
        guard.as_ref().cloned().ok_or(IndexerError::PoolClosed)
    }
}

impl DatabaseManager for SqliteManager {
    fn initialize(&self) -> Result<()> {
        let mut guard = self.pool.write().map_err(|_| IndexerError::PoolClosed)?;
        if guard.is_some() {
            warn!("Database already initialized, skipping");
            return Ok(());
        }

        if !self.config.data_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.config.data_dir)
                .context("failed to create database directory")?;
        }

        let db_path = self.config.database_path();
        info!("Initializing SQLite database at: {}", db_path.display());

        let pool = pool::open_pool(&PoolConfig::from_database_config(&self.config))
            .context("failed to open database")?;

        {
            let conn = pool.get()?;
            migrations::run_migrations(&conn).context("failed to migrate database")?;
        }

        *guard = Some(pool);
        info!("✅ Database initialized successfully");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.pool.write().map_err(|_| IndexerError::PoolClosed)?;
        if let Some(pool) = guard.take() {
            // Checked-out connections close when their holders drop them.
            let stats = PoolStats::from(pool.state());
            drop(pool);
            info!("Database connection closed ({} idle released)", stats.idle);
        }
        Ok(())
    }

    fn get_conn(&self) -> Result<PooledConnection> {
        // Lifecycle lock is released before checkout so queries never hold it.
        let pool = self.current_pool()?;
        Ok(pool.get()?)
    }

    fn begin_transaction(&self) -> Result<Transaction> {
        let conn = self.get_conn()?;
        Transaction::begin(conn).context("failed to begin transaction")
    }

    fn clear_table(&self, table: &str) -> Result<ClearTableStats> {
        self.clear_table_with_options(table, &ClearTableOptions::default())
    }

    fn clear_table_with_options(
        &self,
        table: &str,
        options: &ClearTableOptions,
    ) -> Result<ClearTableStats> {
        self.clear_table_batched(table, options)
    }

    fn execute_sql_file(&self, path: &Path) -> Result<()> {
        let sql = std::fs::read_to_string(path)?;
        let tx = self.begin_transaction()?;
        tx.execute_batch(&sql)
            .context("failed to execute SQL file")?;
        tx.commit()?;
        info!("Executed SQL file {}", path.display());
        Ok(())
    }
}
