//! Change detection
//!
//! Scans a workspace, diffs it against a baseline hash tree and appends one
//! event per change to the ledger. The ledger is append-only: the "current"
//! event of a path is always derived by [`latest_events_by_path`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::database::{
    EmbeddingStatus, Event, EventType, EventUpdate, SortOrder, Workspace, WorkspaceUpdate,
};
use crate::error::Result;
use crate::repository::{EventRepository, WorkspaceRepository};
use crate::scanner::{ChangeRecord, ChangeStatus, HashTree, Scanner};

/// Result of one detection pass.
#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    /// The fresh scan, to be stored by the caller as the next baseline.
    pub hash_tree: HashTree,
    pub changes: Vec<ChangeRecord>,
    /// Events appended to the ledger, ids assigned.
    pub created_events: Vec<Event>,
    /// Changes whose path already has an identical event in flight.
    pub skipped: usize,
}

pub fn event_type_for_change(status: ChangeStatus) -> EventType {
    match status {
        ChangeStatus::Added => EventType::AddFile,
        ChangeStatus::Modified => EventType::ModifyFile,
        ChangeStatus::Deleted => EventType::DeleteFile,
    }
}

/// Most recent event per `source_file_path`; ties on `created_at` go to the
/// higher id.
pub fn latest_events_by_path(events: Vec<Event>) -> HashMap<String, Event> {
    let mut latest: HashMap<String, Event> = HashMap::new();
    for event in events {
        let newer = match latest.get(&event.source_file_path) {
            Some(current) => (event.created_at, event.id) > (current.created_at, current.id),
            None => true,
        };
        if newer {
            latest.insert(event.source_file_path.clone(), event);
        }
    }
    latest
}

/// True when `latest` already covers a change of `event_type`: same type and
/// still being uploaded or built by either pipeline.
fn already_in_flight(latest: Option<&Event>, event_type: EventType) -> bool {
    match latest {
        Some(existing) => {
            existing.event_type == event_type
                && (existing.embedding_status.is_in_flight()
                    || existing.codegraph_status.is_in_flight())
        }
        None => false,
    }
}

pub struct ChangeDetector {
    scanner: Arc<dyn Scanner>,
    events: Arc<dyn EventRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
}

impl ChangeDetector {
    pub fn new(
        scanner: Arc<dyn Scanner>,
        events: Arc<dyn EventRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
    ) -> Self {
        Self {
            scanner,
            events,
            workspaces,
        }
    }

    /// Full rescan of `workspace` against `baseline`, deletions included.
    pub fn detect_file_changes(
        &self,
        workspace: &Workspace,
        baseline: &HashTree,
    ) -> Result<DetectionOutcome> {
        let root = Path::new(&workspace.workspace_path);
        info!("🔍 Detecting changes in {}", workspace.workspace_path);

        let hash_tree = self.scanner.scan_codebase(root)?;
        let changes = self.scanner.calculate_file_changes(&hash_tree, baseline);
        self.refresh_file_num(workspace, hash_tree.len());

        self.record_changes(workspace, hash_tree, changes)
    }

    /// Rescan only `paths`. Paths outside the subset are never reported as deleted.
    pub fn detect_partial_changes(
        &self,
        workspace: &Workspace,
        paths: &[PathBuf],
        baseline: &HashTree,
    ) -> Result<DetectionOutcome> {
        let root = Path::new(&workspace.workspace_path);
        let hash_tree = self.scanner.scan_file_paths(root, paths)?;
        let changes = self
            .scanner
            .calculate_file_changes_without_delete(&hash_tree, baseline);

        self.record_changes(workspace, hash_tree, changes)
    }

    fn record_changes(
        &self,
        workspace: &Workspace,
        hash_tree: HashTree,
        changes: Vec<ChangeRecord>,
    ) -> Result<DetectionOutcome> {
        let mut outcome = DetectionOutcome {
            hash_tree,
            ..Default::default()
        };
        if changes.is_empty() {
            debug!("No changes in {}", workspace.workspace_path);
            return Ok(outcome);
        }

        let latest = match self
            .events
            .get_events_by_workspace_for_deduplication(&workspace.workspace_path)
        {
            Ok(history) => latest_events_by_path(history),
            Err(e) => {
                warn!(
                    "Failed to load event history for {}, appending without deduplication: {}",
                    workspace.workspace_path, e
                );
                HashMap::new()
            }
        };

        let mut new_events = Vec::with_capacity(changes.len());
        for change in &changes {
            let event_type = event_type_for_change(change.status);
            if already_in_flight(latest.get(&change.path), event_type) {
                debug!("{} {} already in flight, skipping", event_type, change.path);
                outcome.skipped += 1;
                continue;
            }
            new_events.push(
                Event::new(&workspace.workspace_path, event_type, &change.path)
                    .with_target(&change.path)
                    .with_hash(&change.fingerprint),
            );
        }

        if !new_events.is_empty() {
            self.events.batch_create_events(&mut new_events)?;
            info!(
                "📝 Recorded {} events for {} ({} skipped)",
                new_events.len(),
                workspace.workspace_path,
                outcome.skipped
            );
        }
        self.complete_open_workspace_events(&workspace.workspace_path);

        outcome.changes = changes;
        outcome.created_events = new_events;
        Ok(outcome)
    }

    fn refresh_file_num(&self, workspace: &Workspace, file_num: usize) {
        let update = WorkspaceUpdate {
            file_num: Some(file_num as i64),
            ..Default::default()
        };
        if let Err(e) = self
            .workspaces
            .update_workspace(&workspace.workspace_path, &update)
        {
            warn!(
                "Failed to update file count for {}: {}",
                workspace.workspace_path, e
            );
        }
    }

    /// A scan that produced events means the workspace is open and indexed,
    /// so its pending `open_workspace` marker is done.
    fn complete_open_workspace_events(&self, workspace_path: &str) {
        let pending: Vec<EmbeddingStatus> = EmbeddingStatus::ALL
            .into_iter()
            .filter(|s| *s != EmbeddingStatus::Success)
            .collect();

        let open_events = match self.events.get_events_by_type_and_status_and_workspaces(
            EventType::OpenWorkspace,
            &[workspace_path.to_string()],
            1,
            SortOrder::Desc,
            &pending,
            &[],
        ) {
            Ok(events) => events,
            Err(e) => {
                warn!("Failed to query open_workspace events: {}", e);
                return;
            }
        };

        for event in open_events {
            let update = EventUpdate {
                embedding_status: Some(EmbeddingStatus::Success),
                ..Default::default()
            };
            match self.events.update_event(event.id, &update) {
                Ok(()) => debug!("open_workspace event {} marked success", event.id),
                Err(e) => warn!("Failed to update open_workspace event {}: {}", event.id, e),
            }
        }
    }
}
