//! Ignore and include rules for workspace scanning
//!
//! Patterns come from the scanner configuration, `<root>/.gitignore` and
//! `<root>/.coignore`, in that order, with exact duplicates removed before
//! compiling. Matching follows gitignore: a trailing `/` matches directories
//! only, `!` negates, and the last matching rule wins.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use super::language::supported_extensions;

pub const GITIGNORE_FILE: &str = ".gitignore";
pub const COIGNORE_FILE: &str = ".coignore";

/// Compiled ignore rules for one workspace root.
pub struct IgnoreMatcher {
    gitignore: Gitignore,
    /// Literal directory prefixes of negated patterns, e.g. `.costrict/wiki/`.
    reinclude_prefixes: Vec<String>,
    patterns: Vec<String>,
}

impl IgnoreMatcher {
    /// Compile `patterns` relative to `root`. Invalid lines are skipped with a warning.
    pub fn compile(root: &Path, patterns: Vec<String>) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        let mut accepted = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            match builder.add_line(None, &pattern) {
                Ok(_) => accepted.push(pattern),
                Err(e) => warn!("Skipping invalid ignore pattern '{}': {}", pattern, e),
            }
        }

        let gitignore = match builder.build() {
            Ok(gitignore) => gitignore,
            Err(e) => {
                warn!("Failed to compile ignore rules for {}: {}", root.display(), e);
                Gitignore::empty()
            }
        };

        let reinclude_prefixes = accepted
            .iter()
            .filter_map(|p| p.strip_prefix('!'))
            .map(literal_prefix)
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            gitignore,
            reinclude_prefixes,
            patterns: accepted,
        }
    }

    /// Patterns that compiled, in order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True when `rel_path` (forward-slash, relative to the root) or one of
    /// its parent directories is excluded.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        let rel_path = rel_path.trim_end_matches('/');
        if rel_path.is_empty() {
            return false;
        }
        self.gitignore
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }

    /// Whether the walk should enter `rel_dir`.
    ///
    /// An ignored directory is still entered when a negated pattern points
    /// below it, so `!.costrict/wiki/` works despite `.*`.
    pub fn should_descend(&self, rel_dir: &str) -> bool {
        if !self.is_ignored(rel_dir, true) {
            return true;
        }
        let dir = format!("{}/", rel_dir.trim_end_matches('/'));
        self.reinclude_prefixes
            .iter()
            .any(|prefix| prefix.starts_with(&dir) && prefix.len() > dir.len())
    }
}

/// Leading path of a pattern up to its first glob metacharacter, cut back to
/// the last `/` so only whole directory names remain.
fn literal_prefix(pattern: &str) -> String {
    let pattern = pattern.trim_start_matches('/');
    let end = pattern
        .find(|c| matches!(c, '*' | '?' | '[' | '\\'))
        .unwrap_or(pattern.len());
    let literal = &pattern[..end];
    match literal.rfind('/') {
        Some(idx) => literal[..=idx].to_string(),
        None => String::new(),
    }
}

/// Read an ignore file, skipping blank lines and `#` comments.
/// A missing file yields no rules.
pub fn read_ignore_file(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Configured patterns, then `.gitignore`, then `.coignore`, duplicates removed.
pub fn collect_ignore_patterns(root: &Path, configured: &[String]) -> Vec<String> {
    let mut all: Vec<String> = configured.to_vec();

    let gitignore = read_ignore_file(&root.join(GITIGNORE_FILE));
    let coignore = read_ignore_file(&root.join(COIGNORE_FILE));
    debug!(
        "Loaded {} .gitignore and {} .coignore rules for {}",
        gitignore.len(),
        coignore.len(),
        root.display()
    );
    all.extend(gitignore);
    all.extend(coignore);

    unique_preserving_order(all)
}

/// Configured include extensions plus every parser extension, duplicates removed.
pub fn collect_include_extensions(configured: &[String]) -> Vec<String> {
    let mut all: Vec<String> = configured.to_vec();
    all.extend(supported_extensions().into_iter().map(str::to_string));
    unique_preserving_order(all)
}

pub fn unique_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
