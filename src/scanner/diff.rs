//! Hash tree comparison
//!
//! Output order follows map iteration and carries no meaning.

use super::types::{ChangeRecord, ChangeStatus, HashTree};

/// Classify every path that differs between `local` and `remote`.
pub fn calculate_file_changes(local: &HashTree, remote: &HashTree) -> Vec<ChangeRecord> {
    let mut changes = calculate_file_changes_without_delete(local, remote);

    for (path, fingerprint) in remote {
        if !local.contains_key(path) {
            changes.push(ChangeRecord::new(
                path.clone(),
                fingerprint.clone(),
                ChangeStatus::Deleted,
            ));
        }
    }

    changes
}

/// Added and modified paths only. Used for partial rescans, where a path
/// missing from `local` only means it was outside the rescanned subset.
pub fn calculate_file_changes_without_delete(
    local: &HashTree,
    remote: &HashTree,
) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();

    for (path, fingerprint) in local {
        match remote.get(path) {
            None => changes.push(ChangeRecord::new(
                path.clone(),
                fingerprint.clone(),
                ChangeStatus::Added,
            )),
            Some(previous) if previous != fingerprint => changes.push(ChangeRecord::new(
                path.clone(),
                fingerprint.clone(),
                ChangeStatus::Modified,
            )),
            Some(_) => {}
        }
    }

    changes
}
