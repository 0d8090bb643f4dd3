// End-to-end change detection against a real tree and database

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use crate::database::*;
use crate::repository::{EventRepository, NO_LIMIT, WorkspaceRepository};
use crate::scanner::{ChangeStatus, FileScanner, HashTree};
use crate::service::ChangeDetector;
use crate::tests::test_helpers::{TestDb, write_file};

struct Fixture {
    db: TestDb,
    dir: TempDir,
    workspace: Workspace,
    detector: ChangeDetector,
}

impl Fixture {
    fn new() -> Self {
        let db = TestDb::new();
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "main.go", "package main");
        write_file(dir.path(), "pkg/a.go", "package pkg // a");
        write_file(dir.path(), "pkg/b.go", "package pkg // b");
        write_file(dir.path(), "node_modules/x/index.js", "ignored");

        let mut workspace = Workspace::new("demo", dir.path().to_string_lossy());
        db.workspaces().create_workspace(&mut workspace).unwrap();

        let detector = ChangeDetector::new(
            Arc::new(FileScanner::default()),
            Arc::new(db.events()),
            Arc::new(db.workspaces()),
        );
        Self {
            db,
            dir,
            workspace,
            detector,
        }
    }

    fn ws_path(&self) -> &str {
        &self.workspace.workspace_path
    }

    fn all_events(&self) -> Vec<Event> {
        self.db
            .events()
            .get_events_by_workspace(self.ws_path(), NO_LIMIT, SortOrder::Asc)
            .unwrap()
    }
}

#[test]
fn test_first_scan_records_every_file_as_added() {
    let fx = Fixture::new();
    let outcome = fx
        .detector
        .detect_file_changes(&fx.workspace, &HashTree::new())
        .unwrap();

    assert_eq!(outcome.hash_tree.len(), 3);
    assert_eq!(outcome.changes.len(), 3);
    assert_eq!(outcome.created_events.len(), 3);
    assert_eq!(outcome.skipped, 0);

    let events = fx.all_events();
    assert_eq!(events.len(), 3);
    for event in &events {
        assert_eq!(event.event_type, EventType::AddFile);
        assert_eq!(event.embedding_status, EmbeddingStatus::Init);
        assert_eq!(event.codegraph_status, CodegraphStatus::Init);
        assert_eq!(event.file_hash, outcome.hash_tree[&event.source_file_path]);
        assert_eq!(event.target_file_path, event.source_file_path);
    }

    let stored = fx.db.workspaces().get_workspace_by_path(fx.ws_path()).unwrap();
    assert_eq!(stored.file_num, 3);
}

#[test]
fn test_unchanged_tree_records_nothing() {
    let fx = Fixture::new();
    let first = fx
        .detector
        .detect_file_changes(&fx.workspace, &HashTree::new())
        .unwrap();
    let second = fx
        .detector
        .detect_file_changes(&fx.workspace, &first.hash_tree)
        .unwrap();

    assert!(second.changes.is_empty());
    assert!(second.created_events.is_empty());
    assert_eq!(fx.all_events().len(), 3);
}

#[test]
fn test_modify_delete_add_cycle() {
    let fx = Fixture::new();
    let first = fx
        .detector
        .detect_file_changes(&fx.workspace, &HashTree::new())
        .unwrap();

    write_file(fx.dir.path(), "pkg/a.go", "package pkg // a, edited");
    std::fs::remove_file(fx.dir.path().join("pkg/b.go")).unwrap();
    write_file(fx.dir.path(), "pkg/c.go", "package pkg // c");

    let second = fx
        .detector
        .detect_file_changes(&fx.workspace, &first.hash_tree)
        .unwrap();

    let mut changes: Vec<(String, ChangeStatus)> = second
        .changes
        .iter()
        .map(|c| (c.path.clone(), c.status))
        .collect();
    changes.sort();
    assert_eq!(
        changes,
        vec![
            ("pkg/a.go".to_string(), ChangeStatus::Modified),
            ("pkg/b.go".to_string(), ChangeStatus::Deleted),
            ("pkg/c.go".to_string(), ChangeStatus::Added),
        ]
    );

    let deleted = fx
        .db
        .events()
        .get_latest_event_by_workspace_and_source_path(fx.ws_path(), "pkg/b.go")
        .unwrap();
    assert_eq!(deleted.event_type, EventType::DeleteFile);
    assert_eq!(deleted.file_hash, first.hash_tree["pkg/b.go"]);

    // history is kept, nothing rewritten
    assert_eq!(fx.all_events().len(), 6);
}

#[test]
fn test_change_already_in_flight_is_skipped() {
    let fx = Fixture::new();
    let first = fx
        .detector
        .detect_file_changes(&fx.workspace, &HashTree::new())
        .unwrap();

    write_file(fx.dir.path(), "pkg/a.go", "package pkg // v2");
    let second = fx
        .detector
        .detect_file_changes(&fx.workspace, &first.hash_tree)
        .unwrap();
    let modify = &second.created_events[0];
    assert_eq!(modify.event_type, EventType::ModifyFile);

    fx.db
        .events()
        .update_events_embedding_status(&[modify.id], EmbeddingStatus::Uploading)
        .unwrap();

    write_file(fx.dir.path(), "pkg/a.go", "package pkg // v3");
    let third = fx
        .detector
        .detect_file_changes(&fx.workspace, &second.hash_tree)
        .unwrap();
    assert_eq!(third.changes.len(), 1);
    assert_eq!(third.skipped, 1);
    assert!(third.created_events.is_empty());

    // once the upload finished, the next edit is recorded again
    fx.db
        .events()
        .update_events_embedding_status(&[modify.id], EmbeddingStatus::Success)
        .unwrap();
    write_file(fx.dir.path(), "pkg/a.go", "package pkg // v4");
    let fourth = fx
        .detector
        .detect_file_changes(&fx.workspace, &third.hash_tree)
        .unwrap();
    assert_eq!(fourth.created_events.len(), 1);
}

#[test]
fn test_pending_open_workspace_event_is_completed() {
    let fx = Fixture::new();
    let events = fx.db.events();
    let mut open = Event::new(fx.ws_path(), EventType::OpenWorkspace, "");
    events.create_event(&mut open).unwrap();

    fx.detector
        .detect_file_changes(&fx.workspace, &HashTree::new())
        .unwrap();

    let stored = events.get_event_by_id(open.id).unwrap();
    assert_eq!(stored.embedding_status, EmbeddingStatus::Success);
}

#[test]
fn test_partial_detection_never_reports_deletions() {
    let fx = Fixture::new();
    let first = fx
        .detector
        .detect_file_changes(&fx.workspace, &HashTree::new())
        .unwrap();

    write_file(fx.dir.path(), "pkg/a.go", "package pkg // partial edit");
    write_file(fx.dir.path(), "pkg/new.go", "package pkg // new");

    let outcome = fx
        .detector
        .detect_partial_changes(
            &fx.workspace,
            &[PathBuf::from("pkg/a.go"), PathBuf::from("pkg/new.go")],
            &first.hash_tree,
        )
        .unwrap();

    assert_eq!(outcome.hash_tree.len(), 2);
    let mut changes: Vec<(String, ChangeStatus)> = outcome
        .changes
        .iter()
        .map(|c| (c.path.clone(), c.status))
        .collect();
    changes.sort();
    assert_eq!(
        changes,
        vec![
            ("pkg/a.go".to_string(), ChangeStatus::Modified),
            ("pkg/new.go".to_string(), ChangeStatus::Added),
        ]
    );
    assert!(
        fx.all_events()
            .iter()
            .all(|e| e.event_type != EventType::DeleteFile)
    );
}

#[test]
fn test_missing_workspace_root_is_an_error() {
    let fx = Fixture::new();
    let ghost = Workspace::new("ghost", fx.dir.path().join("gone").to_string_lossy());
    assert!(
        fx.detector
            .detect_file_changes(&ghost, &HashTree::new())
            .is_err()
    );
    assert_eq!(fx.db.row_count("events"), 0);
}
