use crate::database::*;
use crate::repository::CodegraphStateRepository;
use crate::tests::test_helpers::TestDb;

fn upsert(repo: &impl CodegraphStateRepository, file: &str, status: CodegraphStatus) {
    let mut state = CodegraphState::new("/ws", file, status);
    repo.create_codegraph_state(&mut state).unwrap();
}

#[test]
fn test_create_upserts_one_row_per_file() {
    let db = TestDb::new();
    let repo = db.codegraph_states();

    upsert(&repo, "a.go", CodegraphStatus::Building);
    let mut again = CodegraphState::new("/ws", "a.go", CodegraphStatus::Failed);
    again.message = "parse error".to_string();
    repo.create_codegraph_state(&mut again).unwrap();

    assert_eq!(db.row_count("codegraph_states"), 1);
    let stored = repo.get_codegraph_state_by_file("/ws", "a.go").unwrap();
    assert_eq!(stored.status, CodegraphStatus::Failed);
    assert_eq!(stored.message, "parse error");
}

#[test]
fn test_pending_is_building_only() {
    let db = TestDb::new();
    let repo = db.codegraph_states();

    upsert(&repo, "init.go", CodegraphStatus::Init);
    upsert(&repo, "b1.go", CodegraphStatus::Building);
    upsert(&repo, "fail.go", CodegraphStatus::Failed);
    upsert(&repo, "b2.go", CodegraphStatus::Building);
    upsert(&repo, "ok.go", CodegraphStatus::Success);

    let pending = repo.get_pending_codegraph_states(10).unwrap();
    let files: Vec<&str> = pending.iter().map(|s| s.file_path.as_str()).collect();
    assert_eq!(files, vec!["b1.go", "b2.go"]);
    assert_eq!(repo.get_pending_codegraph_states(1).unwrap().len(), 1);

    assert_eq!(
        repo.get_codegraph_states_by_status(CodegraphStatus::Failed)
            .unwrap()
            .len(),
        1
    );
    assert_eq!(repo.get_codegraph_states_by_workspace("/ws").unwrap().len(), 5);
}

#[test]
fn test_update_and_delete() {
    let db = TestDb::new();
    let repo = db.codegraph_states();
    upsert(&repo, "a.go", CodegraphStatus::Building);

    repo.update_codegraph_state_status("/ws", "a.go", CodegraphStatus::Success, "")
        .unwrap();
    let mut stored = repo.get_codegraph_state_by_file("/ws", "a.go").unwrap();
    assert_eq!(stored.status, CodegraphStatus::Success);

    stored.status = CodegraphStatus::Failed;
    stored.message = "crashed".to_string();
    repo.update_codegraph_state(&stored).unwrap();
    assert_eq!(
        repo.get_codegraph_state_by_file("/ws", "a.go").unwrap().message,
        "crashed"
    );

    repo.delete_codegraph_state("/ws", "a.go").unwrap();
    assert_eq!(db.row_count("codegraph_states"), 0);
}

#[test]
fn test_missing_rows_are_not_found() {
    let db = TestDb::new();
    let repo = db.codegraph_states();

    assert!(
        repo.get_codegraph_state_by_file("/ws", "x.go")
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        repo.update_codegraph_state_status("/ws", "x.go", CodegraphStatus::Success, "")
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        repo.delete_codegraph_state("/ws", "x.go")
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn test_delete_by_workspace() {
    let db = TestDb::new();
    let repo = db.codegraph_states();
    upsert(&repo, "a.go", CodegraphStatus::Building);
    upsert(&repo, "b.go", CodegraphStatus::Building);
    let mut other = CodegraphState::new("/other", "a.go", CodegraphStatus::Building);
    repo.create_codegraph_state(&mut other).unwrap();

    assert_eq!(repo.delete_codegraph_states_by_workspace("/ws").unwrap(), 2);
    assert_eq!(db.row_count("codegraph_states"), 1);
}
