// Embedding pipeline submissions, one row per upload keyed by sync_id

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Params, ToSql, params};
use std::sync::Arc;
use tracing::debug;

use crate::database::{
    DatabaseManager, EMBEDDING_STATE_COLUMNS, EmbeddingState, EmbeddingStatus, placeholders,
    row_to_embedding_state,
};
use crate::error::{IndexerError, Result, ResultExt, is_unique_violation};

pub trait EmbeddingStateRepository: Send + Sync {
    /// Insert a submission. An empty `sync_id` is replaced by the new row id;
    /// a sync_id that is already taken is `AlreadyExists`.
    fn create_embedding_state(&self, state: &mut EmbeddingState) -> Result<()>;

    fn get_embedding_state_by_sync_id(&self, sync_id: &str) -> Result<EmbeddingState>;

    /// Most recent submission for a file.
    fn get_embedding_state_by_file(
        &self,
        workspace_path: &str,
        file_path: &str,
    ) -> Result<EmbeddingState>;

    fn get_embedding_states_by_workspace(&self, workspace_path: &str)
    -> Result<Vec<EmbeddingState>>;

    fn get_embedding_states_by_status(&self, status: EmbeddingStatus)
    -> Result<Vec<EmbeddingState>>;

    /// Overwrite status and message of the record with `state.sync_id`.
    fn update_embedding_state(&self, state: &EmbeddingState) -> Result<()>;

    fn update_embedding_state_status(
        &self,
        sync_id: &str,
        status: EmbeddingStatus,
        message: &str,
    ) -> Result<()>;

    fn delete_embedding_state(&self, sync_id: &str) -> Result<()>;

    fn delete_embedding_states_by_workspace(&self, workspace_path: &str) -> Result<usize>;

    /// Uploading, building and failed submissions, oldest first.
    fn get_pending_embedding_states(&self, limit: i64) -> Result<Vec<EmbeddingState>>;
}

pub struct SqliteEmbeddingStateRepository {
    db: Arc<dyn DatabaseManager>,
}

impl SqliteEmbeddingStateRepository {
    pub fn new(db: Arc<dyn DatabaseManager>) -> Self {
        Self { db }
    }

    fn query_states<P: Params>(
        conn: &Connection,
        filter: &str,
        params: P,
    ) -> Result<Vec<EmbeddingState>> {
        let query = format!(
            "SELECT {} FROM embedding_states {}",
            EMBEDDING_STATE_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params, row_to_embedding_state)?;

        let mut states = Vec::new();
        for row in rows {
            states.push(row?);
        }
        Ok(states)
    }

    fn insert_row(
        conn: &Connection,
        id: Option<i64>,
        sync_id: &str,
        state: &EmbeddingState,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO embedding_states (id, sync_id, workspace_path, file_path, status, message,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                sync_id,
                state.workspace_path,
                state.file_path,
                state.status,
                state.message,
                now,
                now
            ],
        )?;
        Ok(())
    }

    /// The row id AUTOINCREMENT would hand out next, skipped forward past any
    /// value a caller already claimed as an explicit sync_id. Must run inside
    /// the write transaction that inserts the row.
    fn next_free_row_id(conn: &Connection) -> Result<i64> {
        let mut candidate: i64 = conn.query_row(
            "SELECT MAX(
                COALESCE((SELECT seq FROM sqlite_sequence WHERE name = 'embedding_states'), 0),
                COALESCE((SELECT MAX(id) FROM embedding_states), 0)
             ) + 1",
            [],
            |row| row.get(0),
        )?;

        loop {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM embedding_states WHERE sync_id = ?1)",
                params![candidate.to_string()],
                |row| row.get(0),
            )?;
            if !taken {
                return Ok(candidate);
            }
            candidate += 1;
        }
    }

    fn first_or_not_found(states: Vec<EmbeddingState>, key: &str) -> Result<EmbeddingState> {
        states
            .into_iter()
            .next()
            .ok_or_else(|| IndexerError::not_found("embedding state", key))
    }
}

impl EmbeddingStateRepository for SqliteEmbeddingStateRepository {
    fn create_embedding_state(&self, state: &mut EmbeddingState) -> Result<()> {
        let now = Utc::now();
        let tx = self.db.begin_transaction()?;

        if state.sync_id.is_empty() {
            let id = Self::next_free_row_id(&tx).context("failed to assign sync id")?;
            Self::insert_row(&tx, Some(id), &id.to_string(), state, now)
                .context("failed to create embedding state")?;
            state.sync_id = id.to_string();
        } else {
            match Self::insert_row(&tx, None, &state.sync_id, state, now) {
                Ok(()) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(IndexerError::AlreadyExists {
                        entity: "embedding state",
                        key: state.sync_id.clone(),
                    });
                }
                Err(e) => return Err(e).context("failed to create embedding state"),
            }
        }

        tx.commit().context("failed to commit embedding state")?;
        state.created_at = now;
        state.updated_at = now;
        Ok(())
    }

    fn get_embedding_state_by_sync_id(&self, sync_id: &str) -> Result<EmbeddingState> {
        let conn = self.db.get_conn()?;
        let states = Self::query_states(&conn, "WHERE sync_id = ? LIMIT 1", params![sync_id])
            .context("failed to get embedding state")?;
        Self::first_or_not_found(states, sync_id)
    }

    fn get_embedding_state_by_file(
        &self,
        workspace_path: &str,
        file_path: &str,
    ) -> Result<EmbeddingState> {
        let conn = self.db.get_conn()?;
        let states = Self::query_states(
            &conn,
            "WHERE workspace_path = ? AND file_path = ? ORDER BY created_at DESC, id DESC LIMIT 1",
            params![workspace_path, file_path],
        )
        .context("failed to get embedding state by file")?;
        Self::first_or_not_found(states, &format!("{}:{}", workspace_path, file_path))
    }

    fn get_embedding_states_by_workspace(
        &self,
        workspace_path: &str,
    ) -> Result<Vec<EmbeddingState>> {
        let conn = self.db.get_conn()?;
        Self::query_states(
            &conn,
            "WHERE workspace_path = ? ORDER BY created_at DESC, id DESC",
            params![workspace_path],
        )
        .context("failed to get embedding states by workspace")
    }

    fn get_embedding_states_by_status(
        &self,
        status: EmbeddingStatus,
    ) -> Result<Vec<EmbeddingState>> {
        let conn = self.db.get_conn()?;
        Self::query_states(
            &conn,
            "WHERE status = ? ORDER BY created_at DESC, id DESC",
            params![status],
        )
        .context("failed to get embedding states by status")
    }

    fn update_embedding_state(&self, state: &EmbeddingState) -> Result<()> {
        let conn = self.db.get_conn()?;
        let affected = conn
            .execute(
                "UPDATE embedding_states
                 SET workspace_path = ?1, file_path = ?2, status = ?3, message = ?4, updated_at = ?5
                 WHERE sync_id = ?6",
                params![
                    state.workspace_path,
                    state.file_path,
                    state.status,
                    state.message,
                    Utc::now(),
                    state.sync_id
                ],
            )
            .context("failed to update embedding state")?;

        if affected == 0 {
            return Err(IndexerError::not_found("embedding state", &state.sync_id));
        }
        Ok(())
    }

    fn update_embedding_state_status(
        &self,
        sync_id: &str,
        status: EmbeddingStatus,
        message: &str,
    ) -> Result<()> {
        let conn = self.db.get_conn()?;
        let affected = conn
            .execute(
                "UPDATE embedding_states SET status = ?1, message = ?2, updated_at = ?3
                 WHERE sync_id = ?4",
                params![status, message, Utc::now(), sync_id],
            )
            .context("failed to update embedding state status")?;

        if affected == 0 {
            return Err(IndexerError::not_found("embedding state", sync_id));
        }
        debug!("Embedding state {} -> {}", sync_id, status);
        Ok(())
    }

    fn delete_embedding_state(&self, sync_id: &str) -> Result<()> {
        let conn = self.db.get_conn()?;
        let affected = conn
            .execute(
                "DELETE FROM embedding_states WHERE sync_id = ?1",
                params![sync_id],
            )
            .context("failed to delete embedding state")?;

        if affected == 0 {
            return Err(IndexerError::not_found("embedding state", sync_id));
        }
        Ok(())
    }

    fn delete_embedding_states_by_workspace(&self, workspace_path: &str) -> Result<usize> {
        let conn = self.db.get_conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM embedding_states WHERE workspace_path = ?1",
                params![workspace_path],
            )
            .context("failed to delete embedding states by workspace")?;
        Ok(deleted)
    }

    fn get_pending_embedding_states(&self, limit: i64) -> Result<Vec<EmbeddingState>> {
        let statuses = EmbeddingStatus::PENDING;
        let filter = format!(
            "WHERE status IN ({}) ORDER BY created_at ASC, id ASC LIMIT ?",
            placeholders(statuses.len())
        );

        let mut param_refs: Vec<&dyn ToSql> =
            statuses.iter().map(|s| s as &dyn ToSql).collect();
        param_refs.push(&limit);

        let conn = self.db.get_conn()?;
        Self::query_states(&conn, &filter, &param_refs[..])
            .context("failed to get pending embedding states")
    }
}
