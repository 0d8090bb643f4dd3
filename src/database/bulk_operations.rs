// Batched destructive operations

use rusqlite::params;
use std::time::Instant;
use tracing::{debug, info};

use super::{CLEARABLE_TABLES, ClearTableOptions, ClearTableStats, DatabaseManager, SqliteManager};
use crate::error::{IndexerError, Result, ResultExt};

impl SqliteManager {
    /// Delete every row of `table` in id-ordered batches inside one
    /// transaction, then reset its AUTOINCREMENT sequence.
    ///
    /// Batching bounds statement size and lock hold time; it does not create
    /// checkpoints. Any failure rolls the whole clear back.
    pub(super) fn clear_table_batched(
        &self,
        table: &str,
        options: &ClearTableOptions,
    ) -> Result<ClearTableStats> {
        if !CLEARABLE_TABLES.contains(&table) {
            return Err(IndexerError::InvalidTable(table.to_string()));
        }

        let batch_size = options
            .batch_size
            .unwrap_or(self.config().batch_delete_size)
            .max(1);
        let batch_delay = options
            .batch_delay
            .unwrap_or_else(|| self.config().batch_delete_delay());
        let progress = options.enable_progress_log;

        let total: i64 = {
            let conn = self.get_conn()?;
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .context("failed to get table row count")?
        };

        if total == 0 {
            info!("Table {} is already empty", table);
            return Ok(ClearTableStats::default());
        }

        if progress {
            info!(
                "🗑️ Starting to clear table {} with {} records (batch size: {})",
                table, total, batch_size
            );
        }

        let start_time = Instant::now();
        let tx = self.begin_transaction()?;
        let delete_sql = format!(
            "DELETE FROM {table} WHERE id IN (SELECT id FROM {table} ORDER BY id LIMIT ?1)"
        );

        let mut stats = ClearTableStats::default();
        while stats.rows_deleted < total {
            let current = (total - stats.rows_deleted).min(batch_size as i64);
            let affected = tx
                .execute(&delete_sql, params![current])
                .context("failed to delete batch")?;

            stats.batches += 1;
            stats.rows_deleted += affected as i64;

            if progress {
                let percent = stats.rows_deleted as f64 / total as f64 * 100.0;
                info!(
                    "Cleared {}/{} rows from {} ({:.1}%)",
                    stats.rows_deleted, total, table, percent
                );
            }

            // Rows removed by someone else since the count; nothing left to do.
            if affected == 0 {
                break;
            }

            if stats.rows_deleted < total && !batch_delay.is_zero() {
                std::thread::sleep(batch_delay);
            }
        }

        tx.execute("DELETE FROM sqlite_sequence WHERE name = ?1", params![table])
            .context("failed to reset auto increment")?;
        tx.commit().context("failed to commit transaction")?;

        debug!(
            "Cleared {} in {} batches ({:.2}ms)",
            table,
            stats.batches,
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        info!(
            "✅ Table {} cleared ({} records deleted)",
            table, stats.rows_deleted
        );
        Ok(stats)
    }
}
