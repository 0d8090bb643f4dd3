use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Relative path (forward slashes) -> content fingerprint.
pub type HashTree = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified difference between two hash trees.
///
/// For deletions `fingerprint` is the last known (baseline) value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: String,
    pub fingerprint: String,
    pub status: ChangeStatus,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, fingerprint: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
            status,
        }
    }
}
