//! Path utilities
//!
//! Every path stored in a hash tree or the event ledger is relative to the
//! workspace root and uses `/` separators, whatever the host OS.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use crate::error::{IndexerError, Result};

/// Convert an absolute path to a relative Unix-style path.
///
/// Both paths are canonicalized when they exist so symlinked roots
/// (`/var` -> `/private/var` on macOS) still compare equal.
pub fn to_relative_unix_style(absolute: &Path, workspace_root: &Path) -> Result<String> {
    let (path_to_use, root_to_use) = match (absolute.canonicalize(), workspace_root.canonicalize())
    {
        (Ok(canonical_abs), Ok(canonical_root)) => (canonical_abs, canonical_root),
        _ => (absolute.to_path_buf(), workspace_root.to_path_buf()),
    };

    let path_to_use = strip_unc_prefix(&path_to_use);
    let root_to_use = strip_unc_prefix(&root_to_use);

    relative_unix_path(&path_to_use, &root_to_use).ok_or_else(|| {
        IndexerError::invalid_param(
            "path",
            format!(
                "'{}' is not within workspace root '{}'",
                path_to_use.display(),
                root_to_use.display()
            ),
        )
    })
}

/// Cheap variant for paths produced by walking `root` itself: no
/// canonicalization, just prefix stripping. `None` when outside the root
/// or not valid UTF-8.
pub fn relative_unix_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let path_str = relative.to_str()?;

    if MAIN_SEPARATOR == '\\' {
        Some(path_str.replace('\\', "/"))
    } else {
        Some(path_str.to_string())
    }
}

/// Canonical form of `path`, or `path` unchanged when it cannot be resolved.
pub fn canonical_or_self(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical) => strip_unc_prefix(&canonical),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(windows)]
fn strip_unc_prefix(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    match path_str.strip_prefix(r"\\?\") {
        Some(stripped) => PathBuf::from(stripped),
        None => path.to_path_buf(),
    }
}

#[cfg(not(windows))]
fn strip_unc_prefix(path: &Path) -> PathBuf {
    path.to_path_buf()
}
