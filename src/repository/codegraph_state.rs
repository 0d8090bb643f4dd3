// Codegraph pipeline state, one live row per (workspace_path, file_path)

use chrono::Utc;
use rusqlite::{Connection, Params, ToSql, params};
use std::sync::Arc;

use crate::database::{
    CODEGRAPH_STATE_COLUMNS, CodegraphState, CodegraphStatus, DatabaseManager, placeholders,
    row_to_codegraph_state,
};
use crate::error::{IndexerError, Result, ResultExt};

pub trait CodegraphStateRepository: Send + Sync {
    /// Insert or overwrite the record for the file.
    fn create_codegraph_state(&self, state: &mut CodegraphState) -> Result<()>;

    fn get_codegraph_state_by_file(
        &self,
        workspace_path: &str,
        file_path: &str,
    ) -> Result<CodegraphState>;

    fn get_codegraph_states_by_workspace(&self, workspace_path: &str)
    -> Result<Vec<CodegraphState>>;

    fn get_codegraph_states_by_status(&self, status: CodegraphStatus)
    -> Result<Vec<CodegraphState>>;

    fn update_codegraph_state(&self, state: &CodegraphState) -> Result<()>;

    fn update_codegraph_state_status(
        &self,
        workspace_path: &str,
        file_path: &str,
        status: CodegraphStatus,
        message: &str,
    ) -> Result<()>;

    fn delete_codegraph_state(&self, workspace_path: &str, file_path: &str) -> Result<()>;

    fn delete_codegraph_states_by_workspace(&self, workspace_path: &str) -> Result<usize>;

    /// Files still building, oldest first.
    fn get_pending_codegraph_states(&self, limit: i64) -> Result<Vec<CodegraphState>>;
}

pub struct SqliteCodegraphStateRepository {
    db: Arc<dyn DatabaseManager>,
}

impl SqliteCodegraphStateRepository {
    pub fn new(db: Arc<dyn DatabaseManager>) -> Self {
        Self { db }
    }

    fn query_states<P: Params>(
        conn: &Connection,
        filter: &str,
        params: P,
    ) -> Result<Vec<CodegraphState>> {
        let query = format!(
            "SELECT {} FROM codegraph_states {}",
            CODEGRAPH_STATE_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params, row_to_codegraph_state)?;

        let mut states = Vec::new();
        for row in rows {
            states.push(row?);
        }
        Ok(states)
    }
}

impl CodegraphStateRepository for SqliteCodegraphStateRepository {
    fn create_codegraph_state(&self, state: &mut CodegraphState) -> Result<()> {
        let now = Utc::now();
        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT INTO codegraph_states (workspace_path, file_path, status, message,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(workspace_path, file_path) DO UPDATE SET
                status = excluded.status,
                message = excluded.message,
                updated_at = excluded.updated_at",
            params![
                state.workspace_path,
                state.file_path,
                state.status,
                state.message,
                now,
                now
            ],
        )
        .context("failed to create codegraph state")?;

        state.updated_at = now;
        Ok(())
    }

    fn get_codegraph_state_by_file(
        &self,
        workspace_path: &str,
        file_path: &str,
    ) -> Result<CodegraphState> {
        let conn = self.db.get_conn()?;
        Self::query_states(
            &conn,
            "WHERE workspace_path = ? AND file_path = ?",
            params![workspace_path, file_path],
        )
        .context("failed to get codegraph state")?
        .into_iter()
        .next()
        .ok_or_else(|| {
            IndexerError::not_found("codegraph state", format!("{}:{}", workspace_path, file_path))
        })
    }

    fn get_codegraph_states_by_workspace(
        &self,
        workspace_path: &str,
    ) -> Result<Vec<CodegraphState>> {
        let conn = self.db.get_conn()?;
        Self::query_states(
            &conn,
            "WHERE workspace_path = ? ORDER BY created_at DESC, id DESC",
            params![workspace_path],
        )
        .context("failed to get codegraph states by workspace")
    }

    fn get_codegraph_states_by_status(
        &self,
        status: CodegraphStatus,
    ) -> Result<Vec<CodegraphState>> {
        let conn = self.db.get_conn()?;
        Self::query_states(
            &conn,
            "WHERE status = ? ORDER BY created_at DESC, id DESC",
            params![status],
        )
        .context("failed to get codegraph states by status")
    }

    fn update_codegraph_state(&self, state: &CodegraphState) -> Result<()> {
        self.update_codegraph_state_status(
            &state.workspace_path,
            &state.file_path,
            state.status,
            &state.message,
        )
    }

    fn update_codegraph_state_status(
        &self,
        workspace_path: &str,
        file_path: &str,
        status: CodegraphStatus,
        message: &str,
    ) -> Result<()> {
        let conn = self.db.get_conn()?;
        let affected = conn
            .execute(
                "UPDATE codegraph_states SET status = ?1, message = ?2, updated_at = ?3
                 WHERE workspace_path = ?4 AND file_path = ?5",
                params![status, message, Utc::now(), workspace_path, file_path],
            )
            .context("failed to update codegraph state")?;

        if affected == 0 {
            return Err(IndexerError::not_found(
                "codegraph state",
                format!("{}:{}", workspace_path, file_path),
            ));
        }
        Ok(())
    }

    fn delete_codegraph_state(&self, workspace_path: &str, file_path: &str) -> Result<()> {
        let conn = self.db.get_conn()?;
        let affected = conn
            .execute(
                "DELETE FROM codegraph_states WHERE workspace_path = ?1 AND file_path = ?2",
                params![workspace_path, file_path],
            )
            .context("failed to delete codegraph state")?;

        if affected == 0 {
            return Err(IndexerError::not_found(
                "codegraph state",
                format!("{}:{}", workspace_path, file_path),
            ));
        }
        Ok(())
    }

    fn delete_codegraph_states_by_workspace(&self, workspace_path: &str) -> Result<usize> {
        let conn = self.db.get_conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM codegraph_states WHERE workspace_path = ?1",
                params![workspace_path],
            )
            .context("failed to delete codegraph states by workspace")?;
        Ok(deleted)
    }

    fn get_pending_codegraph_states(&self, limit: i64) -> Result<Vec<CodegraphState>> {
        let statuses = CodegraphStatus::PENDING;
        let filter = format!(
            "WHERE status IN ({}) ORDER BY created_at ASC, id ASC LIMIT ?",
            placeholders(statuses.len())
        );

        let mut param_refs: Vec<&dyn ToSql> =
            statuses.iter().map(|s| s as &dyn ToSql).collect();
        param_refs.push(&limit);

        let conn = self.db.get_conn()?;
        Self::query_states(&conn, &filter, &param_refs[..])
            .context("failed to get pending codegraph states")
    }
}
