//! File-backed workspace records
//!
//! Hash-tree baselines and embedding sync records live as one JSON document
//! per codebase under the cache directory. Every document is cached in memory
//! behind an `RwLock`; writes land in a temp file that is renamed over the
//! target, so a crash never leaves a half-written baseline behind.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::error::{IndexerError, Result};
use crate::scanner::HashTree;

const DOCUMENT_EXTENSION: &str = "json";

/// A JSON document keyed by its codebase id.
pub trait StoredDocument: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Human-readable name used in errors and logs.
    const KIND: &'static str;

    fn codebase_id(&self) -> &str;
}

/// Last scanned state of a workspace: the baseline the next scan diffs against.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CodebaseConfig {
    pub client_id: String,
    pub codebase_name: String,
    pub codebase_path: String,
    pub codebase_id: String,
    pub hash_tree: HashTree,
    pub last_sync: Option<DateTime<Utc>>,
    pub register_time: Option<DateTime<Utc>>,
}

impl CodebaseConfig {
    pub fn new(codebase_path: &str) -> Self {
        Self {
            codebase_name: codebase_name(codebase_path),
            codebase_path: codebase_path.to_string(),
            codebase_id: codebase_id(codebase_path),
            register_time: Some(Utc::now()),
            ..Self::default()
        }
    }
}

impl StoredDocument for CodebaseConfig {
    const KIND: &'static str = "codebase config";

    fn codebase_id(&self) -> &str {
        &self.codebase_id
    }
}

/// What has been shipped to the embedding pipeline for a workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CodebaseEmbeddingConfig {
    pub client_id: String,
    pub codebase_name: String,
    pub codebase_path: String,
    pub codebase_id: String,
    pub hash_tree: HashTree,
    /// path -> sync id of the upload carrying it
    pub sync_files: HashMap<String, String>,
    pub sync_ids: Vec<String>,
    /// path -> last failure message
    pub failed_files: HashMap<String, String>,
}

impl CodebaseEmbeddingConfig {
    pub fn new(codebase_path: &str) -> Self {
        Self {
            codebase_name: codebase_name(codebase_path),
            codebase_path: codebase_path.to_string(),
            codebase_id: embedding_codebase_id(codebase_path),
            ..Self::default()
        }
    }
}

impl StoredDocument for CodebaseEmbeddingConfig {
    const KIND: &'static str = "embedding config";

    fn codebase_id(&self) -> &str {
        &self.codebase_id
    }
}

fn codebase_name(codebase_path: &str) -> String {
    Path::new(codebase_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| codebase_path.to_string())
}

/// Stable id for a workspace path: `<dir name>_<blake3 prefix>`.
pub fn codebase_id(codebase_path: &str) -> String {
    let digest = blake3::hash(codebase_path.as_bytes()).to_hex();
    format!("{}_{}", codebase_name(codebase_path), &digest.as_str()[..16])
}

pub fn embedding_codebase_id(codebase_path: &str) -> String {
    format!("{}_embedding", codebase_id(codebase_path))
}

/// Cached directory of JSON documents, one file per codebase id.
pub struct JsonDocumentStore<T: StoredDocument> {
    dir: PathBuf,
    cache: RwLock<HashMap<String, T>>,
}

/// Hash-tree baselines under `cache/<app>/workspace/`.
pub type StorageManager = JsonDocumentStore<CodebaseConfig>;

/// Embedding sync records under `cache/<app>/embedding/`.
pub type EmbeddingFileRepository = JsonDocumentStore<CodebaseEmbeddingConfig>;

impl<T: StoredDocument> JsonDocumentStore<T> {
    /// Create `dir` if needed and load every readable document in it.
    /// Unreadable files are logged and left on disk.
    pub fn open(dir: &Path) -> Result<Self> {
        if dir.as_os_str().is_empty() || dir.to_string_lossy().contains('\0') {
            return Err(IndexerError::invalid_param("storage_dir", dir.display()));
        }
        fs::create_dir_all(dir)?;

        let store = Self {
            dir: dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        };
        let loaded = store.load_all();
        debug!("Loaded {} {} documents from {}", loaded, T::KIND, dir.display());
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, T>> {
        match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<String, T>> {
        match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn document_path(&self, codebase_id: &str) -> Result<PathBuf> {
        if codebase_id.is_empty()
            || codebase_id.contains(['/', '\\', '\0'])
            || codebase_id == "."
            || codebase_id == ".."
        {
            return Err(IndexerError::invalid_param("codebase_id", codebase_id));
        }
        Ok(self
            .dir
            .join(format!("{}.{}", codebase_id, DOCUMENT_EXTENSION)))
    }

    fn load_all(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read {}: {}", self.dir.display(), e);
                return 0;
            }
        };

        let mut cache = self.write_cache();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION)
            {
                continue;
            }
            let Some(codebase_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match Self::read_document(&path, codebase_id) {
                Ok(document) => {
                    cache.insert(codebase_id.to_string(), document);
                }
                Err(e) => warn!("Skipping {} {}: {}", T::KIND, path.display(), e),
            }
        }
        cache.len()
    }

    fn read_document(path: &Path, codebase_id: &str) -> Result<T> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexerError::not_found(T::KIND, codebase_id));
            }
            Err(e) => return Err(e.into()),
        };
        let document: T = serde_json::from_str(&content)?;
        if document.codebase_id() != codebase_id {
            return Err(IndexerError::Config(format!(
                "{} id mismatch: expected {}, got {}",
                T::KIND,
                codebase_id,
                document.codebase_id()
            )));
        }
        Ok(document)
    }

    /// Snapshot of every cached document.
    pub fn all(&self) -> HashMap<String, T> {
        self.read_cache().clone()
    }

    /// Cached document, falling back to disk for files written by someone else.
    pub fn get(&self, codebase_id: &str) -> Result<T> {
        if let Some(document) = self.read_cache().get(codebase_id) {
            return Ok(document.clone());
        }

        let path = self.document_path(codebase_id)?;
        let document = Self::read_document(&path, codebase_id)?;
        self.write_cache()
            .insert(codebase_id.to_string(), document.clone());
        Ok(document)
    }

    /// Write the document atomically, then refresh the cache.
    pub fn save(&self, document: &T) -> Result<()> {
        let codebase_id = document.codebase_id();
        let path = self.document_path(codebase_id)?;
        let json = serde_json::to_string_pretty(document)?;

        let mut cache = self.write_cache();
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        cache.insert(codebase_id.to_string(), document.clone());

        info!("💾 Saved {} {}", T::KIND, codebase_id);
        Ok(())
    }

    /// Remove the document from disk and cache. Missing documents are fine.
    pub fn delete(&self, codebase_id: &str) -> Result<()> {
        let path = self.document_path(codebase_id)?;
        let mut cache = self.write_cache();

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if cache.remove(codebase_id).is_some() {
            debug!("Dropped cached {} {}", T::KIND, codebase_id);
        }
        info!("🗑️ Deleted {} {}", T::KIND, codebase_id);
        Ok(())
    }
}
