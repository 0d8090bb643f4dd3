// Workspace registry

use chrono::Utc;
use rusqlite::{Connection, Params, ToSql, params};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ColumnKind, UpdateMap, build_set_clauses};
use crate::database::{
    ClearTableStats, DatabaseManager, WORKSPACE_COLUMNS, Workspace, WorkspaceUpdate,
    row_to_workspace,
};
use crate::error::{IndexerError, Result, ResultExt};

const UPDATABLE_COLUMNS: [(&str, ColumnKind); 15] = [
    ("workspace_name", ColumnKind::Text),
    ("active", ColumnKind::Bool),
    ("file_num", ColumnKind::Integer),
    ("embedding_file_num", ColumnKind::Integer),
    ("embedding_ts", ColumnKind::Integer),
    ("embedding_message", ColumnKind::Text),
    ("embedding_failed_file_paths", ColumnKind::Text),
    ("codegraph_file_num", ColumnKind::Integer),
    ("codegraph_ts", ColumnKind::Integer),
    ("codegraph_message", ColumnKind::Text),
    ("codegraph_failed_file_paths", ColumnKind::Text),
    ("deepwiki_file_num", ColumnKind::Integer),
    ("deepwiki_ts", ColumnKind::Integer),
    ("deepwiki_message", ColumnKind::Text),
    ("deepwiki_failed_file_paths", ColumnKind::Text),
];

pub trait WorkspaceRepository: Send + Sync {
    fn create_workspace(&self, workspace: &mut Workspace) -> Result<()>;

    fn get_workspace_by_path(&self, path: &str) -> Result<Workspace>;

    fn get_workspace_by_id(&self, id: i64) -> Result<Workspace>;

    /// Apply the fields that are `Some`. Nothing set is a no-op.
    fn update_workspace(&self, path: &str, update: &WorkspaceUpdate) -> Result<()>;

    fn update_workspace_by_map(&self, path: &str, updates: &UpdateMap) -> Result<()>;

    /// Remove a workspace. A missing row only logs a warning.
    fn delete_workspace(&self, path: &str) -> Result<()>;

    /// All workspaces, newest first.
    fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    fn get_active_workspaces(&self) -> Result<Vec<Workspace>>;

    fn update_embedding_info(
        &self,
        path: &str,
        file_num: i64,
        timestamp: i64,
        message: &str,
        failed_file_paths: &str,
    ) -> Result<()>;

    fn update_codegraph_info(&self, path: &str, file_num: i64, timestamp: i64) -> Result<()>;

    fn update_deepwiki_info(
        &self,
        path: &str,
        file_num: i64,
        timestamp: i64,
        message: &str,
        failed_file_paths: &str,
    ) -> Result<()>;

    fn clear_table(&self) -> Result<ClearTableStats>;
}

pub struct SqliteWorkspaceRepository {
    db: Arc<dyn DatabaseManager>,
}

impl SqliteWorkspaceRepository {
    pub fn new(db: Arc<dyn DatabaseManager>) -> Self {
        Self { db }
    }

    fn query_workspaces<P: Params>(
        conn: &Connection,
        filter: &str,
        params: P,
    ) -> Result<Vec<Workspace>> {
        let query = format!("SELECT {} FROM workspaces {}", WORKSPACE_COLUMNS, filter);
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params, row_to_workspace)?;

        let mut workspaces = Vec::new();
        for row in rows {
            workspaces.push(row?);
        }
        Ok(workspaces)
    }

    fn execute_update(
        &self,
        path: &str,
        mut clauses: Vec<String>,
        mut params: Vec<Box<dyn ToSql>>,
        context: &str,
    ) -> Result<()> {
        if clauses.is_empty() {
            return Ok(());
        }

        clauses.push("updated_at = ?".to_string());
        params.push(Box::new(Utc::now()));
        params.push(Box::new(path.to_string()));

        let query = format!(
            "UPDATE workspaces SET {} WHERE workspace_path = ?",
            clauses.join(", ")
        );
        let param_refs: Vec<&dyn ToSql> =
            params.iter().map(|p| p.as_ref() as &dyn ToSql).collect();

        let conn = self.db.get_conn()?;
        let affected = conn.execute(&query, &param_refs[..]).context(context)?;
        if affected == 0 {
            return Err(IndexerError::not_found("workspace", path));
        }
        Ok(())
    }

    fn pipeline_info_update(
        prefix: &str,
        file_num: i64,
        timestamp: i64,
        message: Option<&str>,
        failed_file_paths: Option<&str>,
    ) -> (Vec<String>, Vec<Box<dyn ToSql>>) {
        let mut clauses = vec![
            format!("{}_file_num = ?", prefix),
            format!("{}_ts = ?", prefix),
        ];
        let mut params: Vec<Box<dyn ToSql>> = Vec::with_capacity(4);
        params.push(Box::new(file_num));
        params.push(Box::new(timestamp));
        if let Some(message) = message {
            clauses.push(format!("{}_message = ?", prefix));
            params.push(Box::new(message.to_string()));
        }
        if let Some(paths) = failed_file_paths {
            clauses.push(format!("{}_failed_file_paths = ?", prefix));
            params.push(Box::new(paths.to_string()));
        }
        (clauses, params)
    }
}

/// Collects `column = ?` fragments for the `Some` fields of an update.
struct SetBuilder {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl SetBuilder {
    fn new() -> Self {
        Self {
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    fn set<T: ToSql + Clone + 'static>(&mut self, column: &str, value: &Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} = ?", column));
            self.params.push(Box::new(v.clone()));
        }
        self
    }
}

impl WorkspaceRepository for SqliteWorkspaceRepository {
    fn create_workspace(&self, workspace: &mut Workspace) -> Result<()> {
        if workspace.workspace_path.trim().is_empty() {
            return Err(IndexerError::invalid_param("workspace_path", "<empty>"));
        }

        let now = Utc::now();
        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT INTO workspaces (workspace_name, workspace_path, active, file_num,
                embedding_file_num, embedding_ts, embedding_message, embedding_failed_file_paths,
                codegraph_file_num, codegraph_ts, codegraph_message, codegraph_failed_file_paths,
                deepwiki_file_num, deepwiki_ts, deepwiki_message, deepwiki_failed_file_paths,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                workspace.workspace_name,
                workspace.workspace_path,
                workspace.active,
                workspace.file_num,
                workspace.embedding_file_num,
                workspace.embedding_ts,
                workspace.embedding_message,
                workspace.embedding_failed_file_paths,
                workspace.codegraph_file_num,
                workspace.codegraph_ts,
                workspace.codegraph_message,
                workspace.codegraph_failed_file_paths,
                workspace.deepwiki_file_num,
                workspace.deepwiki_ts,
                workspace.deepwiki_message,
                workspace.deepwiki_failed_file_paths,
                now,
                now,
            ],
        )
        .context("failed to create workspace")?;

        workspace.id = conn.last_insert_rowid();
        workspace.created_at = now;
        workspace.updated_at = now;
        info!(
            "📁 Registered workspace {} ({})",
            workspace.workspace_name, workspace.workspace_path
        );
        Ok(())
    }

    fn get_workspace_by_path(&self, path: &str) -> Result<Workspace> {
        let conn = self.db.get_conn()?;
        Self::query_workspaces(&conn, "WHERE workspace_path = ?", params![path])
            .context("failed to get workspace by path")?
            .into_iter()
            .next()
            .ok_or_else(|| IndexerError::not_found("workspace", path))
    }

    fn get_workspace_by_id(&self, id: i64) -> Result<Workspace> {
        let conn = self.db.get_conn()?;
        Self::query_workspaces(&conn, "WHERE id = ?", params![id])
            .context("failed to get workspace by id")?
            .into_iter()
            .next()
            .ok_or_else(|| IndexerError::not_found("workspace", id))
    }

    fn update_workspace(&self, path: &str, update: &WorkspaceUpdate) -> Result<()> {
        let mut builder = SetBuilder::new();
        builder
            .set("workspace_name", &update.workspace_name)
            .set("active", &update.active)
            .set("file_num", &update.file_num)
            .set("embedding_file_num", &update.embedding_file_num)
            .set("embedding_ts", &update.embedding_ts)
            .set("embedding_message", &update.embedding_message)
            .set(
                "embedding_failed_file_paths",
                &update.embedding_failed_file_paths,
            )
            .set("codegraph_file_num", &update.codegraph_file_num)
            .set("codegraph_ts", &update.codegraph_ts)
            .set("codegraph_message", &update.codegraph_message)
            .set(
                "codegraph_failed_file_paths",
                &update.codegraph_failed_file_paths,
            )
            .set("deepwiki_file_num", &update.deepwiki_file_num)
            .set("deepwiki_ts", &update.deepwiki_ts)
            .set("deepwiki_message", &update.deepwiki_message)
            .set(
                "deepwiki_failed_file_paths",
                &update.deepwiki_failed_file_paths,
            );

        self.execute_update(
            path,
            builder.clauses,
            builder.params,
            "failed to update workspace",
        )
    }

    fn update_workspace_by_map(&self, path: &str, updates: &UpdateMap) -> Result<()> {
        let (clauses, values) = build_set_clauses("workspaces", updates, &UPDATABLE_COLUMNS)?;
        let params: Vec<Box<dyn ToSql>> = values
            .into_iter()
            .map(|v| Box::new(v) as Box<dyn ToSql>)
            .collect();
        self.execute_update(path, clauses, params, "failed to update workspace")
    }

    fn delete_workspace(&self, path: &str) -> Result<()> {
        let conn = self.db.get_conn()?;
        let affected = conn
            .execute(
                "DELETE FROM workspaces WHERE workspace_path = ?1",
                params![path],
            )
            .context("failed to delete workspace")?;

        if affected == 0 {
            warn!("Workspace not found, nothing to delete: {}", path);
        } else {
            info!("🗑️ Unregistered workspace {}", path);
        }
        Ok(())
    }

    fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let conn = self.db.get_conn()?;
        Self::query_workspaces(&conn, "ORDER BY created_at DESC, id DESC", [])
            .context("failed to list workspaces")
    }

    fn get_active_workspaces(&self) -> Result<Vec<Workspace>> {
        let conn = self.db.get_conn()?;
        let workspaces = Self::query_workspaces(
            &conn,
            "WHERE active = 1 ORDER BY created_at DESC, id DESC",
            [],
        )
        .context("failed to get active workspaces")?;
        debug!("Found {} active workspaces", workspaces.len());
        Ok(workspaces)
    }

    fn update_embedding_info(
        &self,
        path: &str,
        file_num: i64,
        timestamp: i64,
        message: &str,
        failed_file_paths: &str,
    ) -> Result<()> {
        let (clauses, params) = Self::pipeline_info_update(
            "embedding",
            file_num,
            timestamp,
            Some(message),
            Some(failed_file_paths),
        );
        self.execute_update(path, clauses, params, "failed to update embedding info")
    }

    fn update_codegraph_info(&self, path: &str, file_num: i64, timestamp: i64) -> Result<()> {
        let (clauses, params) =
            Self::pipeline_info_update("codegraph", file_num, timestamp, None, None);
        self.execute_update(path, clauses, params, "failed to update codegraph info")
    }

    fn update_deepwiki_info(
        &self,
        path: &str,
        file_num: i64,
        timestamp: i64,
        message: &str,
        failed_file_paths: &str,
    ) -> Result<()> {
        let (clauses, params) = Self::pipeline_info_update(
            "deepwiki",
            file_num,
            timestamp,
            Some(message),
            Some(failed_file_paths),
        );
        self.execute_update(path, clauses, params, "failed to update deepwiki info")
    }

    fn clear_table(&self) -> Result<ClearTableStats> {
        self.db.clear_table("workspaces")
    }
}
