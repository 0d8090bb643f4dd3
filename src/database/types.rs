// Database record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::status::{CodegraphStatus, EmbeddingStatus, EventType};

/// One detected file-level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub workspace_path: String,
    pub event_type: EventType,
    pub source_file_path: String,
    pub target_file_path: String,
    pub sync_id: String,
    pub file_hash: String,
    pub embedding_status: EmbeddingStatus,
    pub codegraph_status: CodegraphStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// A fresh, not-yet-persisted event with both pipelines at `Init`.
    pub fn new(
        workspace_path: impl Into<String>,
        event_type: EventType,
        source_file_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            workspace_path: workspace_path.into(),
            event_type,
            source_file_path: source_file_path.into(),
            target_file_path: String::new(),
            sync_id: String::new(),
            file_hash: String::new(),
            embedding_status: EmbeddingStatus::Init,
            codegraph_status: CodegraphStatus::Init,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_target(mut self, target_file_path: impl Into<String>) -> Self {
        self.target_file_path = target_file_path.into();
        self
    }

    pub fn with_hash(mut self, file_hash: impl Into<String>) -> Self {
        self.file_hash = file_hash.into();
        self
    }
}

/// Partial update of an event. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventUpdate {
    pub event_type: Option<EventType>,
    pub source_file_path: Option<String>,
    pub target_file_path: Option<String>,
    pub sync_id: Option<String>,
    pub file_hash: Option<String>,
    pub embedding_status: Option<EmbeddingStatus>,
    pub codegraph_status: Option<CodegraphStatus>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        *self == EventUpdate::default()
    }
}

/// Batch item for `update_events_embedding`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEmbeddingUpdate {
    pub id: i64,
    pub embedding_status: EmbeddingStatus,
    pub sync_id: String,
    pub file_hash: String,
}

/// Submission record for the embedding pipeline, keyed by `sync_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingState {
    pub sync_id: String,
    pub workspace_path: String,
    pub file_path: String,
    pub status: EmbeddingStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingState {
    pub fn new(
        workspace_path: impl Into<String>,
        file_path: impl Into<String>,
        status: EmbeddingStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            sync_id: String::new(),
            workspace_path: workspace_path.into(),
            file_path: file_path.into(),
            status,
            message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Live codegraph record, at most one per `(workspace_path, file_path)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodegraphState {
    pub workspace_path: String,
    pub file_path: String,
    pub status: CodegraphStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodegraphState {
    pub fn new(
        workspace_path: impl Into<String>,
        file_path: impl Into<String>,
        status: CodegraphStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            workspace_path: workspace_path.into(),
            file_path: file_path.into(),
            status,
            message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One tracked local directory with per-pipeline summary counters.
///
/// `*_ts` columns are unix seconds reported by the pipelines, 0 when never run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub workspace_name: String,
    pub workspace_path: String,
    pub active: bool,
    pub file_num: i64,
    pub embedding_file_num: i64,
    pub embedding_ts: i64,
    pub embedding_message: String,
    pub embedding_failed_file_paths: String,
    pub codegraph_file_num: i64,
    pub codegraph_ts: i64,
    pub codegraph_message: String,
    pub codegraph_failed_file_paths: String,
    pub deepwiki_file_num: i64,
    pub deepwiki_ts: i64,
    pub deepwiki_message: String,
    pub deepwiki_failed_file_paths: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(workspace_name: impl Into<String>, workspace_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            workspace_name: workspace_name.into(),
            workspace_path: workspace_path.into(),
            active: true,
            file_num: 0,
            embedding_file_num: 0,
            embedding_ts: 0,
            embedding_message: String::new(),
            embedding_failed_file_paths: String::new(),
            codegraph_file_num: 0,
            codegraph_ts: 0,
            codegraph_message: String::new(),
            codegraph_failed_file_paths: String::new(),
            deepwiki_file_num: 0,
            deepwiki_ts: 0,
            deepwiki_message: String::new(),
            deepwiki_failed_file_paths: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a workspace. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceUpdate {
    pub workspace_name: Option<String>,
    pub active: Option<bool>,
    pub file_num: Option<i64>,
    pub embedding_file_num: Option<i64>,
    pub embedding_ts: Option<i64>,
    pub embedding_message: Option<String>,
    pub embedding_failed_file_paths: Option<String>,
    pub codegraph_file_num: Option<i64>,
    pub codegraph_ts: Option<i64>,
    pub codegraph_message: Option<String>,
    pub codegraph_failed_file_paths: Option<String>,
    pub deepwiki_file_num: Option<i64>,
    pub deepwiki_ts: Option<i64>,
    pub deepwiki_message: Option<String>,
    pub deepwiki_failed_file_paths: Option<String>,
}

impl WorkspaceUpdate {
    pub fn is_empty(&self) -> bool {
        *self == WorkspaceUpdate::default()
    }
}

/// Overrides for the batched table clear. `None` falls back to the
/// database configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClearTableOptions {
    pub batch_size: Option<usize>,
    pub batch_delay: Option<Duration>,
    pub enable_progress_log: bool,
}

impl ClearTableOptions {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: Some(batch_size),
            ..Self::default()
        }
    }
}

/// Result of a batched clear, mostly for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearTableStats {
    pub rows_deleted: i64,
    pub batches: usize,
}

/// Sort direction on `created_at` (ties broken by id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_desc(is_desc: bool) -> Self {
        if is_desc { SortOrder::Desc } else { SortOrder::Asc }
    }

    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}
