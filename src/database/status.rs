// Pipeline status and event type enums with their SQLite encodings

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of a file through the remote embedding pipeline.
///
/// Ordinals are persisted and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Init = 1,
    Uploading = 2,
    Building = 3,
    UploadFailed = 4,
    BuildFailed = 5,
    Success = 6,
}

impl EmbeddingStatus {
    pub const ALL: [EmbeddingStatus; 6] = [
        EmbeddingStatus::Init,
        EmbeddingStatus::Uploading,
        EmbeddingStatus::Building,
        EmbeddingStatus::UploadFailed,
        EmbeddingStatus::BuildFailed,
        EmbeddingStatus::Success,
    ];

    /// Statuses the scheduler keeps polling. Failed states are retried locally.
    pub const PENDING: [EmbeddingStatus; 4] = [
        EmbeddingStatus::Uploading,
        EmbeddingStatus::Building,
        EmbeddingStatus::UploadFailed,
        EmbeddingStatus::BuildFailed,
    ];

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_i64() == value)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, EmbeddingStatus::Uploading | EmbeddingStatus::Building)
    }
}

/// Progress of a file through the remote codegraph pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodegraphStatus {
    Init = 1,
    Building = 2,
    Failed = 3,
    Success = 4,
}

impl CodegraphStatus {
    pub const ALL: [CodegraphStatus; 4] = [
        CodegraphStatus::Init,
        CodegraphStatus::Building,
        CodegraphStatus::Failed,
        CodegraphStatus::Success,
    ];

    pub const PENDING: [CodegraphStatus; 1] = [CodegraphStatus::Building];

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_i64() == value)
    }

    pub fn is_in_flight(self) -> bool {
        self == CodegraphStatus::Building
    }
}

macro_rules! impl_status_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_i64()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_i64()?;
                <$ty>::from_i64(raw).ok_or(FromSqlError::OutOfRange(raw))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}", self)
            }
        }
    };
}

impl_status_sql!(EmbeddingStatus);
impl_status_sql!(CodegraphStatus);

/// Kind of change recorded in the event ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Unknown,
    AddFile,
    ModifyFile,
    DeleteFile,
    RenameFile,
    OpenWorkspace,
    CloseWorkspace,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Unknown => "unknown",
            EventType::AddFile => "add_file",
            EventType::ModifyFile => "modify_file",
            EventType::DeleteFile => "delete_file",
            EventType::RenameFile => "rename_file",
            EventType::OpenWorkspace => "open_workspace",
            EventType::CloseWorkspace => "close_workspace",
        }
    }

    /// Unrecognized strings map to `Unknown` so old rows stay readable.
    pub fn from_string(s: &str) -> Self {
        match s {
            "add_file" => EventType::AddFile,
            "modify_file" => EventType::ModifyFile,
            "delete_file" => EventType::DeleteFile,
            "rename_file" => EventType::RenameFile,
            "open_workspace" => EventType::OpenWorkspace,
            "close_workspace" => EventType::CloseWorkspace,
            _ => EventType::Unknown,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for EventType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EventType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(EventType::from_string(value.as_str()?))
    }
}
