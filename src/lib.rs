// Codebase Indexer - local change detection and dual-pipeline state tracking
//!
//! Scans developer workspaces into content hash trees, diffs them against a
//! baseline, records every change in an append-only event ledger and tracks
//! how far the remote embedding and codegraph pipelines got with each file.
//! Everything is persisted in a single embedded SQLite file.

pub mod config;
pub mod database;
pub mod error;
pub mod repository;
pub mod scanner;
pub mod service;
pub mod utils;

#[cfg(test)]
pub mod tests;

// Re-export common types
pub use config::{AgentConfig, AppPaths, DatabaseConfig, ScannerConfig, SyncConfig};
pub use database::{DatabaseManager, SqliteManager};
pub use error::{IndexerError, Result};
pub use scanner::{ChangeRecord, ChangeStatus, FileScanner, HashTree, Scanner};
pub use service::{ChangeDetector, EventCleaner};
