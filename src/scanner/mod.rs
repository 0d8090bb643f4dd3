//! Workspace scanning
//!
//! Turns a directory tree into a [`HashTree`] by applying the compiled ignore
//! rules, the size cap, the include list and the file-count cap, then
//! fingerprinting each surviving file. Filesystem problems on single entries
//! are logged and skipped; they never abort a scan.

pub mod diff;
pub mod filtering;
pub mod hashing;
pub mod language;
pub mod types;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{
    MAX_FILE_COUNT, MAX_FILE_SIZE_KB, MIN_FILE_COUNT, MIN_FILE_SIZE_KB, ScannerConfig,
};
use crate::error::{IndexerError, Result, SkipReason};
use crate::utils::paths::{canonical_or_self, relative_unix_path, to_relative_unix_style};

pub use diff::{calculate_file_changes, calculate_file_changes_without_delete};
pub use filtering::IgnoreMatcher;
pub use language::supported_extensions;
pub use types::{ChangeRecord, ChangeStatus, HashTree};

pub trait Scanner: Send + Sync {
    /// Merge a new configuration. Empty lists and zero numbers keep the
    /// current value; out-of-range limits are rejected with a warning.
    fn set_scanner_config(&self, config: &ScannerConfig);

    fn get_scanner_config(&self) -> ScannerConfig;

    fn calculate_file_hash(&self, file_path: &Path) -> Result<String>;

    fn load_ignore_rules(&self, root: &Path) -> IgnoreMatcher;

    /// Configured include extensions plus parser extensions. Empty means
    /// every extension is accepted.
    fn load_include_files(&self) -> Vec<String>;

    fn scan_codebase(&self, root: &Path) -> Result<HashTree>;

    fn scan_directory(&self, root: &Path, dir: &Path) -> Result<HashTree>;

    /// Scan an explicit path list. Directories are scanned recursively;
    /// paths that fail are logged and left out.
    fn scan_file_paths(&self, root: &Path, paths: &[PathBuf]) -> Result<HashTree>;

    /// Fingerprint of a single file, or [`IndexerError::FileSkipped`] when
    /// the rules exclude it.
    fn scan_file(&self, root: &Path, file_path: &Path) -> Result<String>;

    fn is_ignore_file(&self, root: &Path, path: &Path) -> Result<bool>;

    fn calculate_file_changes(&self, local: &HashTree, remote: &HashTree) -> Vec<ChangeRecord> {
        calculate_file_changes(local, remote)
    }

    fn calculate_file_changes_without_delete(
        &self,
        local: &HashTree,
        remote: &HashTree,
    ) -> Vec<ChangeRecord> {
        calculate_file_changes_without_delete(local, remote)
    }
}

/// Rules for one scan, built from a config snapshot so no lock is held
/// while walking.
struct ScanRules {
    matcher: IgnoreMatcher,
    include: HashSet<String>,
    max_file_size_kb: u64,
    max_file_count: u64,
}

impl ScanRules {
    fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_kb * 1024
    }

    fn is_included(&self, path: &Path) -> bool {
        if self.include.is_empty() {
            return true;
        }
        language::dotted_extension(path)
            .map(|ext| self.include.contains(&ext))
            .unwrap_or(false)
    }

    /// Why a regular file would be left out, checked in scan order.
    fn skip_reason(&self, rel_path: &str, path: &Path, size_bytes: u64) -> Option<SkipReason> {
        if self.matcher.is_ignored(rel_path, false) {
            return Some(SkipReason::Ignored);
        }
        if size_bytes >= self.max_file_size_bytes() {
            return Some(SkipReason::TooLarge {
                size_bytes,
                limit_kb: self.max_file_size_kb,
            });
        }
        if !self.is_included(path) {
            return Some(SkipReason::NotIncluded);
        }
        None
    }
}

pub struct FileScanner {
    config: RwLock<ScannerConfig>,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(ScannerConfig::default())
    }
}

impl FileScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    fn snapshot(&self) -> ScannerConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn rules(&self, root: &Path) -> ScanRules {
        let config = self.snapshot();
        let patterns = filtering::collect_ignore_patterns(root, &config.folder_ignore_patterns);
        let include = filtering::collect_include_extensions(&config.file_include_patterns);

        ScanRules {
            matcher: IgnoreMatcher::compile(root, patterns),
            include: include.into_iter().collect(),
            max_file_size_kb: config.max_file_size_kb,
            max_file_count: config.max_file_count,
        }
    }

    fn validate_root(root: &Path) -> Result<()> {
        if root.as_os_str().is_empty() || !root.is_dir() {
            return Err(IndexerError::invalid_param(
                "workspace_path",
                root.display(),
            ));
        }
        Ok(())
    }

    fn resolve(root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    /// Walk `start` (inside `root`) and fingerprint every file the rules keep.
    fn walk(&self, root: &Path, start: &Path, rules: &ScanRules) -> HashTree {
        let started = Instant::now();
        let mut tree = HashTree::new();
        let mut files_scanned: u64 = 0;
        let mut walker = WalkDir::new(start).follow_links(false).into_iter();

        while let Some(next) = walker.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(e) => {
                    let failed = e.path().unwrap_or(start);
                    warn!("Error accessing {}: {}", failed.display(), e);
                    continue;
                }
            };
            let path = entry.path();

            let Some(rel_path) = relative_unix_path(path, root) else {
                warn!("Failed to get relative path for {}", path.display());
                continue;
            };

            if entry.file_type().is_dir() {
                // the root itself is never skipped, even though `.*` could match it
                if !rel_path.is_empty() && !rules.matcher.should_descend(&rel_path) {
                    debug!("Skipping ignored directory: {}", rel_path);
                    walker.skip_current_dir();
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            let size_bytes = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Error getting file info for {}: {}", path.display(), e);
                    continue;
                }
            };

            if let Some(reason) = rules.skip_reason(&rel_path, path, size_bytes) {
                debug!("Skipping {}: {}", rel_path, reason);
                continue;
            }

            let hash = match hashing::calculate_file_hash(path) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("Error calculating hash for {}: {}", path.display(), e);
                    continue;
                }
            };

            files_scanned += 1;
            if files_scanned > rules.max_file_count {
                warn!(
                    "⚠️ Reached maximum file count limit: {}, stopping scan after {:?}",
                    rules.max_file_count,
                    started.elapsed()
                );
                return tree;
            }

            tree.insert(rel_path, hash);
        }

        info!(
            "✅ Scan of {} completed: {} files in {:?}",
            start.display(),
            tree.len(),
            started.elapsed()
        );
        tree
    }
}

impl Scanner for FileScanner {
    fn set_scanner_config(&self, config: &ScannerConfig) {
        let mut current = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !config.folder_ignore_patterns.is_empty() {
            current.folder_ignore_patterns = config.folder_ignore_patterns.clone();
        }
        if !config.file_include_patterns.is_empty() {
            current.file_include_patterns = config.file_include_patterns.clone();
        }

        let size_kb = config.max_file_size_kb;
        if size_kb > MIN_FILE_SIZE_KB && size_kb <= MAX_FILE_SIZE_KB {
            current.max_file_size_kb = size_kb;
        } else if size_kb != 0 {
            warn!(
                "Ignoring max file size {}KB outside ({}, {}]",
                size_kb, MIN_FILE_SIZE_KB, MAX_FILE_SIZE_KB
            );
        }

        let count = config.max_file_count;
        if (MIN_FILE_COUNT..=MAX_FILE_COUNT).contains(&count) {
            current.max_file_count = count;
        } else if count != 0 {
            warn!(
                "Ignoring max file count {} outside [{}, {}]",
                count, MIN_FILE_COUNT, MAX_FILE_COUNT
            );
        }

        debug!(
            "Scanner config updated: max {}KB, max {} files",
            current.max_file_size_kb, current.max_file_count
        );
    }

    fn get_scanner_config(&self) -> ScannerConfig {
        self.snapshot()
    }

    fn calculate_file_hash(&self, file_path: &Path) -> Result<String> {
        hashing::calculate_file_hash(file_path)
    }

    fn load_ignore_rules(&self, root: &Path) -> IgnoreMatcher {
        self.rules(root).matcher
    }

    fn load_include_files(&self) -> Vec<String> {
        let config = self.snapshot();
        filtering::collect_include_extensions(&config.file_include_patterns)
    }

    fn scan_codebase(&self, root: &Path) -> Result<HashTree> {
        Self::validate_root(root)?;
        info!("🔍 Starting codebase scan: {}", root.display());
        let rules = self.rules(root);
        Ok(self.walk(root, root, &rules))
    }

    fn scan_directory(&self, root: &Path, dir: &Path) -> Result<HashTree> {
        Self::validate_root(root)?;
        let dir = Self::resolve(root, dir);
        if !dir.is_dir() {
            return Err(IndexerError::invalid_param("dir_path", dir.display()));
        }

        // walk strips `root` off every entry, so both sides must share one spelling
        let root = canonical_or_self(root);
        let dir = canonical_or_self(&dir);
        if relative_unix_path(&dir, &root).is_none() {
            return Err(IndexerError::invalid_param(
                "dir_path",
                format!("{} is outside {}", dir.display(), root.display()),
            ));
        }

        debug!("Starting directory scan: {}", dir.display());
        let rules = self.rules(&root);
        Ok(self.walk(&root, &dir, &rules))
    }

    fn scan_file_paths(&self, root: &Path, paths: &[PathBuf]) -> Result<HashTree> {
        Self::validate_root(root)?;
        let mut tree = HashTree::new();

        for path in paths {
            let full_path = Self::resolve(root, path);
            let metadata = match std::fs::metadata(&full_path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Failed to get file info for {}: {}", full_path.display(), e);
                    continue;
                }
            };

            if metadata.is_dir() {
                match self.scan_directory(root, &full_path) {
                    Ok(dir_tree) => tree.extend(dir_tree),
                    Err(e) => warn!("Failed to scan directory {}: {}", full_path.display(), e),
                }
                continue;
            }

            let rel_path = match to_relative_unix_style(&full_path, root) {
                Ok(rel_path) => rel_path,
                Err(e) => {
                    debug!("{}", e);
                    continue;
                }
            };
            match self.scan_file(root, &full_path) {
                Ok(hash) => {
                    tree.insert(rel_path, hash);
                }
                Err(e) => warn!("Failed to scan file {}: {}", full_path.display(), e),
            }
        }

        debug!("File paths scan completed, {} files", tree.len());
        Ok(tree)
    }

    fn scan_file(&self, root: &Path, file_path: &Path) -> Result<String> {
        Self::validate_root(root)?;
        let full_path = Self::resolve(root, file_path);
        let rel_path = to_relative_unix_style(&full_path, root)?;
        let metadata = std::fs::metadata(&full_path)?;
        if !metadata.is_file() {
            return Err(IndexerError::invalid_param("file_path", full_path.display()));
        }

        let rules = self.rules(root);
        if let Some(reason) = rules.skip_reason(&rel_path, &full_path, metadata.len()) {
            return Err(IndexerError::FileSkipped {
                path: rel_path,
                reason,
            });
        }

        hashing::calculate_file_hash(&full_path)
    }

    fn is_ignore_file(&self, root: &Path, path: &Path) -> Result<bool> {
        Self::validate_root(root)?;
        let full_path = Self::resolve(root, path);
        let rel_path = to_relative_unix_style(&full_path, root)?;
        let metadata = std::fs::metadata(&full_path)?;
        let rules = self.rules(root);

        if metadata.is_dir() {
            let ignored = !rel_path.is_empty() && rules.matcher.is_ignored(&rel_path, true);
            if ignored {
                debug!("Ignored directory: {}/", rel_path);
            }
            return Ok(ignored);
        }

        match rules.skip_reason(&rel_path, &full_path, metadata.len()) {
            Some(reason) => {
                debug!("Ignored file {}: {}", rel_path, reason);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
