use rusqlite::types::Value;

use crate::database::*;
use crate::repository::{UpdateMap, WorkspaceRepository};
use crate::tests::test_helpers::TestDb;

fn register(repo: &impl WorkspaceRepository, name: &str, path: &str) -> Workspace {
    let mut workspace = Workspace::new(name, path);
    repo.create_workspace(&mut workspace).unwrap();
    workspace
}

#[test]
fn test_create_and_lookup() {
    let db = TestDb::new();
    let repo = db.workspaces();
    let ws = register(&repo, "demo", "/home/dev/demo");
    assert!(ws.id > 0);

    let by_path = repo.get_workspace_by_path("/home/dev/demo").unwrap();
    assert_eq!(by_path.id, ws.id);
    assert!(by_path.active);
    assert_eq!(by_path.file_num, 0);
    assert_eq!(by_path.deepwiki_message, "");

    let by_id = repo.get_workspace_by_id(ws.id).unwrap();
    assert_eq!(by_id.workspace_name, "demo");

    assert!(repo.get_workspace_by_path("/nope").unwrap_err().is_not_found());
    assert!(repo.get_workspace_by_id(999).unwrap_err().is_not_found());
}

#[test]
fn test_empty_path_is_rejected() {
    let db = TestDb::new();
    let repo = db.workspaces();
    let err = repo
        .create_workspace(&mut Workspace::new("blank", "  "))
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(db.row_count("workspaces"), 0);
}

#[test]
fn test_duplicate_path_is_an_error() {
    let db = TestDb::new();
    let repo = db.workspaces();
    register(&repo, "demo", "/ws");
    assert!(
        repo.create_workspace(&mut Workspace::new("again", "/ws"))
            .is_err()
    );
    assert_eq!(db.row_count("workspaces"), 1);
}

#[test]
fn test_delete_is_idempotent() {
    let db = TestDb::new();
    let repo = db.workspaces();
    register(&repo, "demo", "/ws");

    repo.delete_workspace("/ws").unwrap();
    repo.delete_workspace("/ws").unwrap();
    assert_eq!(db.row_count("workspaces"), 0);
}

#[test]
fn test_partial_update_leaves_other_columns() {
    let db = TestDb::new();
    let repo = db.workspaces();
    register(&repo, "demo", "/ws");

    repo.update_workspace(
        "/ws",
        &WorkspaceUpdate {
            file_num: Some(120),
            active: Some(false),
            ..Default::default()
        },
    )
    .unwrap();

    let stored = repo.get_workspace_by_path("/ws").unwrap();
    assert_eq!(stored.file_num, 120);
    assert!(!stored.active);
    assert_eq!(stored.workspace_name, "demo");

    repo.update_workspace("/missing", &WorkspaceUpdate::default())
        .unwrap();
    let err = repo
        .update_workspace(
            "/missing",
            &WorkspaceUpdate {
                file_num: Some(1),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_update_by_map_checks_columns() {
    let db = TestDb::new();
    let repo = db.workspaces();
    register(&repo, "demo", "/ws");

    let mut updates = UpdateMap::new();
    updates.insert("workspace_name".to_string(), Value::Text("renamed".to_string()));
    updates.insert("codegraph_file_num".to_string(), Value::Integer(7));
    repo.update_workspace_by_map("/ws", &updates).unwrap();

    let stored = repo.get_workspace_by_path("/ws").unwrap();
    assert_eq!(stored.workspace_name, "renamed");
    assert_eq!(stored.codegraph_file_num, 7);

    let mut bad = UpdateMap::new();
    bad.insert("workspace_path".to_string(), Value::Text("/elsewhere".to_string()));
    assert!(repo.update_workspace_by_map("/ws", &bad).unwrap_err().is_validation());
}

#[test]
fn test_update_by_map_keeps_active_an_integer() {
    let db = TestDb::new();
    let repo = db.workspaces();
    register(&repo, "demo", "/ws");

    let mut updates = UpdateMap::new();
    updates.insert("active".to_string(), Value::Text("false".to_string()));
    repo.update_workspace_by_map("/ws", &updates).unwrap();
    assert!(!repo.get_workspace_by_path("/ws").unwrap().active);
    assert!(repo.get_active_workspaces().unwrap().is_empty());

    updates.insert("active".to_string(), Value::Integer(1));
    repo.update_workspace_by_map("/ws", &updates).unwrap();
    assert!(repo.get_workspace_by_path("/ws").unwrap().active);

    let stored_type: String = db
        .manager
        .get_conn()
        .unwrap()
        .query_row(
            "SELECT typeof(active) FROM workspaces WHERE workspace_path = '/ws'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored_type, "integer");

    for bad in [
        Value::Text("maybe".to_string()),
        Value::Integer(2),
        Value::Null,
    ] {
        let mut updates = UpdateMap::new();
        updates.insert("active".to_string(), bad);
        assert!(repo.update_workspace_by_map("/ws", &updates).unwrap_err().is_validation());
    }

    let mut updates = UpdateMap::new();
    updates.insert("file_num".to_string(), Value::Text("many".to_string()));
    assert!(repo.update_workspace_by_map("/ws", &updates).unwrap_err().is_validation());
    assert_eq!(repo.get_active_workspaces().unwrap().len(), 1);
}

#[test]
fn test_pipeline_info_updates() {
    let db = TestDb::new();
    let repo = db.workspaces();
    register(&repo, "demo", "/ws");

    repo.update_embedding_info("/ws", 40, 1_700_000_000, "partial", "a.go,b.go")
        .unwrap();
    repo.update_codegraph_info("/ws", 38, 1_700_000_100).unwrap();
    repo.update_deepwiki_info("/ws", 12, 1_700_000_200, "ok", "")
        .unwrap();

    let stored = repo.get_workspace_by_path("/ws").unwrap();
    assert_eq!(stored.embedding_file_num, 40);
    assert_eq!(stored.embedding_ts, 1_700_000_000);
    assert_eq!(stored.embedding_message, "partial");
    assert_eq!(stored.embedding_failed_file_paths, "a.go,b.go");
    assert_eq!(stored.codegraph_file_num, 38);
    assert_eq!(stored.codegraph_ts, 1_700_000_100);
    assert_eq!(stored.codegraph_message, "");
    assert_eq!(stored.deepwiki_file_num, 12);
    assert_eq!(stored.deepwiki_message, "ok");

    assert!(
        repo.update_codegraph_info("/missing", 1, 1)
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn test_active_filter_and_listing() {
    let db = TestDb::new();
    let repo = db.workspaces();
    register(&repo, "one", "/one");
    register(&repo, "two", "/two");
    let mut dormant = Workspace::new("three", "/three");
    dormant.active = false;
    repo.create_workspace(&mut dormant).unwrap();

    assert_eq!(repo.list_workspaces().unwrap().len(), 3);
    let active: Vec<String> = repo
        .get_active_workspaces()
        .unwrap()
        .into_iter()
        .map(|w| w.workspace_path)
        .collect();
    assert_eq!(active, vec!["/two".to_string(), "/one".to_string()]);
}

#[test]
fn test_clear_table_resets_ids() {
    let db = TestDb::new();
    let repo = db.workspaces();
    register(&repo, "one", "/one");
    register(&repo, "two", "/two");

    let stats = repo.clear_table().unwrap();
    assert_eq!(stats.rows_deleted, 2);
    assert_eq!(register(&repo, "again", "/again").id, 1);
}
