//! Agent configuration
//!
//! Configuration is an owned value handed to each component at construction.
//! Nothing here is process-global; runtime reload of scanner settings goes
//! through `Scanner::set_scanner_config`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{IndexerError, Result};

pub const APP_NAME: &str = "codebase-indexer";
pub const DEFAULT_ROOT_DIR: &str = "~/.costrict";

/// Scanner limits are only accepted inside these bounds.
pub const MIN_FILE_SIZE_KB: u64 = 10;
pub const MAX_FILE_SIZE_KB: u64 = 100 * 1024;
pub const MIN_FILE_COUNT: u64 = 100;
pub const MAX_FILE_COUNT: u64 = 1_000_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub database: DatabaseConfig,
    pub scan: ScannerConfig,
    pub sync: SyncConfig,
}

impl AgentConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. Unparseable content is rejected
    /// as a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = serde_json::from_str(&content).map_err(|e| {
            IndexerError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;

        info!("📋 Loaded agent configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    /// Directory holding the database file. Empty means "use the app layout".
    pub data_dir: PathBuf,
    pub database_name: String,
    pub max_open_conns: usize,
    pub max_idle_conns: usize,
    pub conn_max_lifetime_secs: u64,
    pub conn_max_idle_time_secs: u64,
    #[serde(rename = "enableWAL")]
    pub enable_wal: bool,
    pub enable_foreign_keys: bool,
    pub batch_delete_size: usize,
    pub batch_delete_delay_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            database_name: "codebase_indexer.db".to_string(),
            max_open_conns: 5,
            max_idle_conns: 3,
            conn_max_lifetime_secs: 15 * 60,
            conn_max_idle_time_secs: 3 * 60,
            enable_wal: true,
            enable_foreign_keys: true,
            batch_delete_size: 1000,
            batch_delete_delay_ms: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_name)
    }

    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_secs(self.conn_max_lifetime_secs)
    }

    pub fn conn_max_idle_time(&self) -> Duration {
        Duration::from_secs(self.conn_max_idle_time_secs)
    }

    pub fn batch_delete_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delete_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerConfig {
    pub folder_ignore_patterns: Vec<String>,
    pub file_include_patterns: Vec<String>,
    #[serde(rename = "maxFileSizeKB")]
    pub max_file_size_kb: u64,
    pub max_file_count: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            folder_ignore_patterns: default_folder_ignore_patterns(),
            file_include_patterns: default_file_include_patterns(),
            max_file_size_kb: 10 * 1024,
            max_file_count: 100_000,
        }
    }
}

pub fn default_folder_ignore_patterns() -> Vec<String> {
    [
        // every dot-directory and dotfile
        ".*",
        "logs/",
        "temp/",
        "tmp/",
        "node_modules/",
        "bin/",
        "dist/",
        "build/",
        "out/",
        "__pycache__/",
        "venv/",
        "target/",
        "vendor/",
        // generated wiki stays indexed
        "!.costrict/wiki/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_file_include_patterns() -> Vec<String> {
    [".md", ".mdx", ".json", ".yaml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Events not updated within this window are garbage collected.
    pub event_retention_hours: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_retention_hours: 48,
        }
    }
}

/// On-disk layout under the application root.
#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub logs_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub db_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub embedding_dir: PathBuf,
    pub index_dir: PathBuf,
    pub share_dir: PathBuf,
    pub auth_file: PathBuf,
    pub config_file: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let cache_dir = root.join("cache").join(APP_NAME);
        let share_dir = root.join("share");
        Self {
            logs_dir: root.join("logs"),
            db_dir: cache_dir.join("db"),
            tmp_dir: cache_dir.join("tmp"),
            workspace_dir: cache_dir.join("workspace"),
            embedding_dir: cache_dir.join("embedding"),
            index_dir: cache_dir.join("index"),
            auth_file: share_dir.join("auth.json"),
            config_file: root.join("config").join(format!("{}.json", APP_NAME)),
            cache_dir,
            share_dir,
            root,
        }
    }

    /// Resolve a root directory, expanding `~` and environment variables.
    pub fn resolve(root: Option<&str>) -> Result<Self> {
        let raw = root.unwrap_or(DEFAULT_ROOT_DIR);
        let expanded = shellexpand::full(raw)
            .map_err(|e| IndexerError::Config(format!("cannot expand root dir '{}': {}", raw, e)))?;
        Ok(Self::new(PathBuf::from(expanded.as_ref())))
    }

    /// Create every managed directory.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.logs_dir,
            &self.db_dir,
            &self.tmp_dir,
            &self.workspace_dir,
            &self.embedding_dir,
            &self.index_dir,
            &self.share_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
