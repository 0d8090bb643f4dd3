// Event ledger: append-only history of file-level changes

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ToSql, params};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{ColumnKind, NO_LIMIT, PAGE_SIZE, UpdateMap, build_set_clauses};
use crate::database::{
    ClearTableStats, CodegraphStatus, DatabaseManager, EVENT_COLUMNS, EmbeddingStatus, Event,
    EventEmbeddingUpdate, EventType, EventUpdate, SortOrder, placeholders, row_to_event,
};
use crate::error::{IndexerError, Result, ResultExt};

/// Columns `update_event_by_map` may write, with the type each must hold.
const UPDATABLE_COLUMNS: [(&str, ColumnKind); 8] = [
    ("workspace_path", ColumnKind::Text),
    ("event_type", ColumnKind::EventType),
    ("source_file_path", ColumnKind::Text),
    ("target_file_path", ColumnKind::Text),
    ("sync_id", ColumnKind::Text),
    ("file_hash", ColumnKind::Text),
    ("embedding_status", ColumnKind::EmbeddingStatus),
    ("codegraph_status", ColumnKind::CodegraphStatus),
];

pub trait EventRepository: Send + Sync {
    /// Insert one event; assigns `id` and both timestamps on the record.
    fn create_event(&self, event: &mut Event) -> Result<()>;

    /// Insert many events in one transaction, assigning ids back onto `events`.
    fn batch_create_events(&self, events: &mut [Event]) -> Result<()>;

    fn get_event_by_id(&self, id: i64) -> Result<Event>;

    fn get_events_by_workspace(
        &self,
        workspace_path: &str,
        limit: i64,
        order: SortOrder,
    ) -> Result<Vec<Event>>;

    fn get_events_by_type(
        &self,
        event_type: EventType,
        limit: i64,
        order: SortOrder,
    ) -> Result<Vec<Event>>;

    fn get_events_by_workspace_and_type(
        &self,
        workspace_path: &str,
        event_type: EventType,
        limit: i64,
        order: SortOrder,
    ) -> Result<Vec<Event>>;

    fn get_events_by_workspace_and_embedding_status(
        &self,
        workspace_path: &str,
        limit: i64,
        order: SortOrder,
        statuses: &[EmbeddingStatus],
    ) -> Result<Vec<Event>>;

    fn get_events_by_type_and_embedding_status(
        &self,
        event_type: EventType,
        limit: i64,
        order: SortOrder,
        statuses: &[EmbeddingStatus],
    ) -> Result<Vec<Event>>;

    fn get_events_by_type_and_status_and_workspaces(
        &self,
        event_type: EventType,
        workspace_paths: &[String],
        limit: i64,
        order: SortOrder,
        embedding_statuses: &[EmbeddingStatus],
        codegraph_statuses: &[CodegraphStatus],
    ) -> Result<Vec<Event>>;

    /// General query; every empty filter field is ignored.
    fn query_events(&self, filter: &EventFilter, limit: i64, order: SortOrder)
    -> Result<Vec<Event>>;

    fn update_event(&self, id: i64, update: &EventUpdate) -> Result<()>;

    fn update_event_by_map(&self, id: i64, updates: &UpdateMap) -> Result<()>;

    /// Set the embedding status of every id; returns rows updated.
    fn update_events_embedding_status(&self, ids: &[i64], status: EmbeddingStatus)
    -> Result<usize>;

    /// Write status, sync id and hash for each item. All or nothing.
    fn update_events_embedding(&self, updates: &[EventEmbeddingUpdate]) -> Result<()>;

    fn delete_event(&self, id: i64) -> Result<()>;

    /// Delete the given ids in one transaction; returns rows deleted.
    fn batch_delete_events(&self, ids: &[i64]) -> Result<usize>;

    fn delete_events_by_workspace(&self, workspace_path: &str) -> Result<usize>;

    fn get_recent_events(&self, workspace_path: &str, limit: i64) -> Result<Vec<Event>>;

    /// Every event of the workspace, newest first. Reduction to one event per
    /// path is left to the caller.
    fn get_events_by_workspace_for_deduplication(&self, workspace_path: &str)
    -> Result<Vec<Event>>;

    fn get_events_count_by_type(&self, event_types: &[EventType]) -> Result<i64>;

    fn get_events_count_by_workspace_and_status(
        &self,
        workspace_paths: &[String],
        embedding_statuses: &[EmbeddingStatus],
        codegraph_statuses: &[CodegraphStatus],
    ) -> Result<i64>;

    /// Ids of events whose `updated_at` is older than `cutoff`, oldest first.
    fn get_expired_event_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<i64>>;

    fn get_latest_event_by_workspace_and_source_path(
        &self,
        workspace_path: &str,
        source_file_path: &str,
    ) -> Result<Event>;

    fn clear_table(&self) -> Result<ClearTableStats>;
}

/// Filter for `query_events`. Empty sets mean "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub event_types: Vec<EventType>,
    pub workspace_paths: Vec<String>,
    pub embedding_statuses: Vec<EmbeddingStatus>,
    pub codegraph_statuses: Vec<CodegraphStatus>,
    pub source_file_path: Option<String>,
}

impl EventFilter {
    pub fn workspace(workspace_path: &str) -> Self {
        Self {
            workspace_paths: vec![workspace_path.to_string()],
            ..Self::default()
        }
    }

    fn to_where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if !self.event_types.is_empty() {
            conditions.push(format!(
                "event_type IN ({})",
                placeholders(self.event_types.len())
            ));
            for t in &self.event_types {
                params.push(Box::new(*t));
            }
        }
        if !self.workspace_paths.is_empty() {
            conditions.push(format!(
                "workspace_path IN ({})",
                placeholders(self.workspace_paths.len())
            ));
            for p in &self.workspace_paths {
                params.push(Box::new(p.clone()));
            }
        }
        if !self.embedding_statuses.is_empty() {
            conditions.push(format!(
                "embedding_status IN ({})",
                placeholders(self.embedding_statuses.len())
            ));
            for s in &self.embedding_statuses {
                params.push(Box::new(*s));
            }
        }
        if !self.codegraph_statuses.is_empty() {
            conditions.push(format!(
                "codegraph_status IN ({})",
                placeholders(self.codegraph_statuses.len())
            ));
            for s in &self.codegraph_statuses {
                params.push(Box::new(*s));
            }
        }
        if let Some(path) = &self.source_file_path {
            conditions.push("source_file_path = ?".to_string());
            params.push(Box::new(path.clone()));
        }

        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

pub struct SqliteEventRepository {
    db: Arc<dyn DatabaseManager>,
}

impl SqliteEventRepository {
    pub fn new(db: Arc<dyn DatabaseManager>) -> Self {
        Self { db }
    }

    /// One page ordered by `(created_at, id)`. With `after`, only rows strictly
    /// past that key in the requested direction are returned, so rows inserted
    /// between calls never shift the window.
    fn select_page(
        conn: &Connection,
        filter: &EventFilter,
        order: SortOrder,
        after: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> Result<Vec<Event>> {
        let (mut where_clause, mut params) = filter.to_where_clause();
        if let Some((created_at, id)) = after {
            let cmp = match order {
                SortOrder::Asc => ">",
                SortOrder::Desc => "<",
            };
            let keyset = format!("(created_at, id) {} (?, ?)", cmp);
            where_clause = if where_clause.is_empty() {
                format!("WHERE {}", keyset)
            } else {
                format!("{} AND {}", where_clause, keyset)
            };
            params.push(Box::new(created_at));
            params.push(Box::new(id));
        }

        let query = format!(
            "SELECT {} FROM events {} ORDER BY created_at {dir}, id {dir} LIMIT ?",
            EVENT_COLUMNS,
            where_clause,
            dir = order.as_sql()
        );

        let mut param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
        param_refs.push(&limit);

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(&param_refs[..], row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Fetch up to `limit` events that sort after `after` (or from the start).
    /// Feed the last event of a page back in to get the next one.
    pub fn query_events_page(
        &self,
        filter: &EventFilter,
        order: SortOrder,
        after: Option<&Event>,
        limit: i64,
    ) -> Result<Vec<Event>> {
        let conn = self.db.get_conn()?;
        Self::select_page(
            &conn,
            filter,
            order,
            after.map(|e| (e.created_at, e.id)),
            limit,
        )
        .context("failed to query events page")
    }

    fn count_where(&self, filter: &EventFilter) -> Result<i64> {
        let (where_clause, params) = filter.to_where_clause();
        let query = format!("SELECT COUNT(*) FROM events {}", where_clause);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref() as &dyn ToSql).collect();

        let conn = self.db.get_conn()?;
        let count = conn.query_row(&query, &param_refs[..], |row| row.get(0))?;
        Ok(count)
    }

    fn insert_chunk(conn: &Connection, chunk: &mut [Event], now: DateTime<Utc>) -> Result<()> {
        let row_placeholders = vec!["(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"; chunk.len()].join(", ");
        let query = format!(
            "INSERT INTO events (workspace_path, event_type, source_file_path, target_file_path,
                sync_id, file_hash, embedding_status, codegraph_status, created_at, updated_at)
             VALUES {}",
            row_placeholders
        );

        let mut param_refs: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * 10);
        for event in chunk.iter() {
            param_refs.push(&event.workspace_path);
            param_refs.push(&event.event_type);
            param_refs.push(&event.source_file_path);
            param_refs.push(&event.target_file_path);
            param_refs.push(&event.sync_id);
            param_refs.push(&event.file_hash);
            param_refs.push(&event.embedding_status);
            param_refs.push(&event.codegraph_status);
            param_refs.push(&now);
            param_refs.push(&now);
        }

        conn.execute(&query, &param_refs[..])?;

        // A single multi-row INSERT gets contiguous AUTOINCREMENT ids.
        let last_id = conn.last_insert_rowid();
        let first_id = last_id - chunk.len() as i64 + 1;
        for (i, event) in chunk.iter_mut().enumerate() {
            event.id = first_id + i as i64;
            event.created_at = now;
            event.updated_at = now;
        }
        Ok(())
    }

    fn execute_update(
        &self,
        id: i64,
        mut clauses: Vec<String>,
        mut params: Vec<Box<dyn ToSql>>,
    ) -> Result<()> {
        if clauses.is_empty() {
            return Ok(());
        }

        clauses.push("updated_at = ?".to_string());
        params.push(Box::new(Utc::now()));
        params.push(Box::new(id));

        let query = format!("UPDATE events SET {} WHERE id = ?", clauses.join(", "));
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref() as &dyn ToSql).collect();

        let conn = self.db.get_conn()?;
        let affected = conn
            .execute(&query, &param_refs[..])
            .context("failed to update event")?;

        if affected == 0 {
            return Err(IndexerError::not_found("event", id));
        }
        Ok(())
    }
}

impl EventRepository for SqliteEventRepository {
    fn create_event(&self, event: &mut Event) -> Result<()> {
        let now = Utc::now();
        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT INTO events (workspace_path, event_type, source_file_path, target_file_path,
                sync_id, file_hash, embedding_status, codegraph_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.workspace_path,
                event.event_type,
                event.source_file_path,
                event.target_file_path,
                event.sync_id,
                event.file_hash,
                event.embedding_status,
                event.codegraph_status,
                now,
                now,
            ],
        )
        .map_err(|e| {
            error!("Failed to create event: {}", e);
            e
        })
        .context("failed to create event")?;

        event.id = conn.last_insert_rowid();
        event.created_at = now;
        event.updated_at = now;
        Ok(())
    }

    fn batch_create_events(&self, events: &mut [Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let tx = self.db.begin_transaction()?;
        for chunk in events.chunks_mut(PAGE_SIZE) {
            Self::insert_chunk(&tx, chunk, now).context("failed to batch create events")?;
        }
        tx.commit().context("failed to commit batch create")?;

        debug!("Created {} events", events.len());
        Ok(())
    }

    fn get_event_by_id(&self, id: i64) -> Result<Event> {
        let conn = self.db.get_conn()?;
        let query = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        match conn.query_row(&query, params![id], row_to_event) {
            Ok(event) => Ok(event),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(IndexerError::not_found("event", id)),
            Err(e) => Err(e).context("failed to get event"),
        }
    }

    fn get_events_by_workspace(
        &self,
        workspace_path: &str,
        limit: i64,
        order: SortOrder,
    ) -> Result<Vec<Event>> {
        self.query_events(&EventFilter::workspace(workspace_path), limit, order)
    }

    fn get_events_by_type(
        &self,
        event_type: EventType,
        limit: i64,
        order: SortOrder,
    ) -> Result<Vec<Event>> {
        let filter = EventFilter {
            event_types: vec![event_type],
            ..EventFilter::default()
        };
        self.query_events(&filter, limit, order)
    }

    fn get_events_by_workspace_and_type(
        &self,
        workspace_path: &str,
        event_type: EventType,
        limit: i64,
        order: SortOrder,
    ) -> Result<Vec<Event>> {
        let filter = EventFilter {
            event_types: vec![event_type],
            ..EventFilter::workspace(workspace_path)
        };
        self.query_events(&filter, limit, order)
    }

    fn get_events_by_workspace_and_embedding_status(
        &self,
        workspace_path: &str,
        limit: i64,
        order: SortOrder,
        statuses: &[EmbeddingStatus],
    ) -> Result<Vec<Event>> {
        let filter = EventFilter {
            embedding_statuses: statuses.to_vec(),
            ..EventFilter::workspace(workspace_path)
        };
        self.query_events(&filter, limit, order)
    }

    fn get_events_by_type_and_embedding_status(
        &self,
        event_type: EventType,
        limit: i64,
        order: SortOrder,
        statuses: &[EmbeddingStatus],
    ) -> Result<Vec<Event>> {
        let filter = EventFilter {
            event_types: vec![event_type],
            embedding_statuses: statuses.to_vec(),
            ..EventFilter::default()
        };
        self.query_events(&filter, limit, order)
    }

    fn get_events_by_type_and_status_and_workspaces(
        &self,
        event_type: EventType,
        workspace_paths: &[String],
        limit: i64,
        order: SortOrder,
        embedding_statuses: &[EmbeddingStatus],
        codegraph_statuses: &[CodegraphStatus],
    ) -> Result<Vec<Event>> {
        let filter = EventFilter {
            event_types: vec![event_type],
            workspace_paths: workspace_paths.to_vec(),
            embedding_statuses: embedding_statuses.to_vec(),
            codegraph_statuses: codegraph_statuses.to_vec(),
            source_file_path: None,
        };
        self.query_events(&filter, limit, order)
    }

    fn query_events(
        &self,
        filter: &EventFilter,
        limit: i64,
        order: SortOrder,
    ) -> Result<Vec<Event>> {
        let conn = self.db.get_conn()?;

        if limit >= 0 {
            return Self::select_page(&conn, filter, order, None, limit)
                .context("failed to query events");
        }

        // Unbounded: walk the keyset so a huge ledger never lands in one statement.
        let page = PAGE_SIZE as i64;
        let mut all: Vec<Event> = Vec::new();
        loop {
            let cursor = all.last().map(|e| (e.created_at, e.id));
            let batch = Self::select_page(&conn, filter, order, cursor, page)
                .context("failed to query events batch")?;
            let fetched = batch.len() as i64;
            all.extend(batch);
            if fetched < page {
                break;
            }
        }
        Ok(all)
    }

    fn update_event(&self, id: i64, update: &EventUpdate) -> Result<()> {
        let mut clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(v) = update.event_type {
            clauses.push("event_type = ?".to_string());
            params.push(Box::new(v));
        }
        if let Some(v) = &update.source_file_path {
            clauses.push("source_file_path = ?".to_string());
            params.push(Box::new(v.clone()));
        }
        if let Some(v) = &update.target_file_path {
            clauses.push("target_file_path = ?".to_string());
            params.push(Box::new(v.clone()));
        }
        if let Some(v) = &update.sync_id {
            clauses.push("sync_id = ?".to_string());
            params.push(Box::new(v.clone()));
        }
        if let Some(v) = &update.file_hash {
            clauses.push("file_hash = ?".to_string());
            params.push(Box::new(v.clone()));
        }
        if let Some(v) = update.embedding_status {
            clauses.push("embedding_status = ?".to_string());
            params.push(Box::new(v));
        }
        if let Some(v) = update.codegraph_status {
            clauses.push("codegraph_status = ?".to_string());
            params.push(Box::new(v));
        }

        self.execute_update(id, clauses, params)
    }

    fn update_event_by_map(&self, id: i64, updates: &UpdateMap) -> Result<()> {
        let (clauses, values) = build_set_clauses("events", updates, &UPDATABLE_COLUMNS)?;
        let params: Vec<Box<dyn ToSql>> = values
            .into_iter()
            .map(|v| Box::new(v) as Box<dyn ToSql>)
            .collect();
        self.execute_update(id, clauses, params)
    }

    fn update_events_embedding_status(
        &self,
        ids: &[i64],
        status: EmbeddingStatus,
    ) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let tx = self.db.begin_transaction()?;
        let mut updated = 0;
        for chunk in ids.chunks(PAGE_SIZE) {
            let query = format!(
                "UPDATE events SET embedding_status = ?, updated_at = ? WHERE id IN ({})",
                placeholders(chunk.len())
            );
            let mut param_refs: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() + 2);
            param_refs.push(&status);
            param_refs.push(&now);
            param_refs.extend(chunk.iter().map(|id| id as &dyn ToSql));
            updated += tx
                .execute(&query, &param_refs[..])
                .context("failed to update events embedding status")?;
        }
        tx.commit().context("failed to commit embedding status update")?;

        debug!(
            "Updated embedding status to {} for {}/{} events",
            status,
            updated,
            ids.len()
        );
        Ok(updated)
    }

    fn update_events_embedding(&self, updates: &[EventEmbeddingUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let tx = self.db.begin_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE events SET embedding_status = ?1, sync_id = ?2, file_hash = ?3, updated_at = ?4
                 WHERE id = ?5",
            )?;
            for update in updates {
                let affected = stmt
                    .execute(params![
                        update.embedding_status,
                        update.sync_id,
                        update.file_hash,
                        now,
                        update.id
                    ])
                    .context("failed to update event embedding")?;
                if affected == 0 {
                    // Dropping `tx` rolls back the rows already written.
                    return Err(IndexerError::not_found("event", update.id));
                }
            }
        }
        tx.commit().context("failed to commit event embedding update")?;
        Ok(())
    }

    fn delete_event(&self, id: i64) -> Result<()> {
        let conn = self.db.get_conn()?;
        let affected = conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])
            .context("failed to delete event")?;
        if affected == 0 {
            return Err(IndexerError::not_found("event", id));
        }
        Ok(())
    }

    fn batch_delete_events(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.db.begin_transaction()?;
        let mut deleted = 0;
        for chunk in ids.chunks(PAGE_SIZE) {
            let query = format!(
                "DELETE FROM events WHERE id IN ({})",
                placeholders(chunk.len())
            );
            let param_refs: Vec<&dyn ToSql> = chunk.iter().map(|id| id as &dyn ToSql).collect();
            deleted += tx
                .execute(&query, &param_refs[..])
                .context("failed to batch delete events")?;
        }
        tx.commit().context("failed to commit batch delete")?;

        if deleted < ids.len() {
            warn!(
                "Batch delete removed {} of {} requested events",
                deleted,
                ids.len()
            );
        }
        Ok(deleted)
    }

    fn delete_events_by_workspace(&self, workspace_path: &str) -> Result<usize> {
        let conn = self.db.get_conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM events WHERE workspace_path = ?1",
                params![workspace_path],
            )
            .context("failed to delete events by workspace")?;
        info!(
            "Deleted {} events for workspace {}",
            deleted, workspace_path
        );
        Ok(deleted)
    }

    fn get_recent_events(&self, workspace_path: &str, limit: i64) -> Result<Vec<Event>> {
        self.query_events(
            &EventFilter::workspace(workspace_path),
            limit,
            SortOrder::Desc,
        )
    }

    fn get_events_by_workspace_for_deduplication(
        &self,
        workspace_path: &str,
    ) -> Result<Vec<Event>> {
        let events = self.query_events(
            &EventFilter::workspace(workspace_path),
            NO_LIMIT,
            SortOrder::Desc,
        )?;
        debug!(
            "Loaded {} events for deduplication in {}",
            events.len(),
            workspace_path
        );
        Ok(events)
    }

    fn get_events_count_by_type(&self, event_types: &[EventType]) -> Result<i64> {
        let filter = EventFilter {
            event_types: event_types.to_vec(),
            ..EventFilter::default()
        };
        self.count_where(&filter)
            .context("failed to count events by type")
    }

    fn get_events_count_by_workspace_and_status(
        &self,
        workspace_paths: &[String],
        embedding_statuses: &[EmbeddingStatus],
        codegraph_statuses: &[CodegraphStatus],
    ) -> Result<i64> {
        let filter = EventFilter {
            workspace_paths: workspace_paths.to_vec(),
            embedding_statuses: embedding_statuses.to_vec(),
            codegraph_statuses: codegraph_statuses.to_vec(),
            ..EventFilter::default()
        };
        self.count_where(&filter)
            .context("failed to count events by workspace and status")
    }

    fn get_expired_event_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<i64>> {
        let conn = self.db.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id FROM events WHERE updated_at < ?1 ORDER BY id ASC")?;
        let rows = stmt.query_map(params![cutoff], |row| row.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn get_latest_event_by_workspace_and_source_path(
        &self,
        workspace_path: &str,
        source_file_path: &str,
    ) -> Result<Event> {
        let filter = EventFilter {
            source_file_path: Some(source_file_path.to_string()),
            ..EventFilter::workspace(workspace_path)
        };
        self.query_events(&filter, 1, SortOrder::Desc)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                IndexerError::not_found("event", format!("{}:{}", workspace_path, source_file_path))
            })
    }

    fn clear_table(&self) -> Result<ClearTableStats> {
        self.db.clear_table("events")
    }
}
