use thiserror::Error;

/// Errors surfaced by the scanner, the database layer and the repositories.
///
/// `NotFound` is kept separate from driver failures so callers can treat a
/// missing row as "nothing to update" instead of a crash.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("invalid table name: {0}")]
    InvalidTable(String),

    #[error("invalid request params: {name} {value}")]
    InvalidParam { name: &'static str, value: String },

    #[error("column '{column}' cannot be updated on table {table}")]
    InvalidColumn { table: &'static str, column: String },

    #[error("invalid value {value} for column '{column}' on table {table}")]
    InvalidValue {
        table: &'static str,
        column: String,
        value: String,
    },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("database is not initialized or already closed")]
    PoolClosed,

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file {path} skipped: {reason}")]
    FileSkipped { path: String, reason: SkipReason },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<IndexerError>,
    },

    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexerError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        IndexerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn invalid_param(name: &'static str, value: impl ToString) -> Self {
        IndexerError::InvalidParam {
            name,
            value: value.to_string(),
        }
    }

    /// True when the error (or the error it wraps) is a missing-row condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            IndexerError::NotFound { .. } => true,
            IndexerError::Database(rusqlite::Error::QueryReturnedNoRows) => true,
            IndexerError::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        match self {
            IndexerError::AlreadyExists { .. } => true,
            IndexerError::Context { source, .. } => source.is_already_exists(),
            _ => false,
        }
    }

    /// True for caller mistakes rejected before any I/O happened.
    pub fn is_validation(&self) -> bool {
        match self {
            IndexerError::InvalidTable(_)
            | IndexerError::InvalidParam { .. }
            | IndexerError::InvalidColumn { .. }
            | IndexerError::InvalidValue { .. }
            | IndexerError::Config(_) => true,
            IndexerError::Context { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}

/// Why an explicitly requested file was left out of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Ignored,
    TooLarge { size_bytes: u64, limit_kb: u64 },
    NotIncluded,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Ignored => f.write_str("excluded by ignore rules"),
            SkipReason::TooLarge {
                size_bytes,
                limit_kb,
            } => write!(
                f,
                "larger than {}KB (size: {:.2} KB)",
                limit_kb,
                *size_bytes as f64 / 1024.0
            ),
            SkipReason::NotIncluded => f.write_str("extension not included"),
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;

/// True when SQLite refused a write because of a UNIQUE constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Attach operation context to a fallible call, keeping `NotFound`,
/// `AlreadyExists` and validation errors untouched so callers can still
/// branch on them.
pub trait ResultExt<T> {
    fn context(self, context: &str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<IndexerError>,
{
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            let err: IndexerError = e.into();
            if err.is_not_found() || err.is_validation() || err.is_already_exists() {
                err
            } else {
                IndexerError::Context {
                    context: context.to_string(),
                    source: Box::new(err),
                }
            }
        })
    }
}
