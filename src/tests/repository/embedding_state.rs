use crate::database::*;
use crate::repository::EmbeddingStateRepository;
use crate::tests::test_helpers::TestDb;

fn create(
    repo: &impl EmbeddingStateRepository,
    file: &str,
    status: EmbeddingStatus,
) -> EmbeddingState {
    let mut state = EmbeddingState::new("/ws", file, status);
    repo.create_embedding_state(&mut state).unwrap();
    state
}

#[test]
fn test_empty_sync_id_takes_row_id() {
    let db = TestDb::new();
    let repo = db.embedding_states();

    let first = create(&repo, "a.go", EmbeddingStatus::Uploading);
    let second = create(&repo, "b.go", EmbeddingStatus::Uploading);
    assert_eq!(first.sync_id, "1");
    assert_eq!(second.sync_id, "2");

    let stored = repo.get_embedding_state_by_sync_id("2").unwrap();
    assert_eq!(stored.file_path, "b.go");
    assert_eq!(stored.status, EmbeddingStatus::Uploading);
}

#[test]
fn test_explicit_sync_id_is_kept() {
    let db = TestDb::new();
    let repo = db.embedding_states();

    let mut state = EmbeddingState::new("/ws", "a.go", EmbeddingStatus::Building);
    state.sync_id = "remote-42".to_string();
    state.message = "queued".to_string();
    repo.create_embedding_state(&mut state).unwrap();

    let stored = repo.get_embedding_state_by_sync_id("remote-42").unwrap();
    assert_eq!(stored.message, "queued");
    assert!(
        repo.get_embedding_state_by_sync_id("missing")
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn test_sync_ids_never_collide() {
    let db = TestDb::new();
    let repo = db.embedding_states();

    let mut claimed = EmbeddingState::new("/ws", "x.go", EmbeddingStatus::Uploading);
    claimed.sync_id = "2".to_string();
    repo.create_embedding_state(&mut claimed).unwrap();

    // Row id 2 is free but "2" is not, so the generated id moves past it.
    let generated = create(&repo, "y.go", EmbeddingStatus::Uploading);
    assert_eq!(generated.sync_id, "3");
    let next = create(&repo, "z.go", EmbeddingStatus::Uploading);
    assert_eq!(next.sync_id, "4");

    repo.update_embedding_state_status("2", EmbeddingStatus::Success, "done")
        .unwrap();
    assert_eq!(
        repo.get_embedding_state_by_sync_id("3").unwrap().status,
        EmbeddingStatus::Uploading
    );

    repo.delete_embedding_state("2").unwrap();
    assert_eq!(db.row_count("embedding_states"), 2);
    assert_eq!(repo.get_embedding_state_by_sync_id("3").unwrap().file_path, "y.go");
}

#[test]
fn test_duplicate_explicit_sync_id_already_exists() {
    let db = TestDb::new();
    let repo = db.embedding_states();

    let mut first = EmbeddingState::new("/ws", "a.go", EmbeddingStatus::Uploading);
    first.sync_id = "remote-7".to_string();
    repo.create_embedding_state(&mut first).unwrap();

    let mut second = EmbeddingState::new("/ws", "b.go", EmbeddingStatus::Building);
    second.sync_id = "remote-7".to_string();
    let err = repo.create_embedding_state(&mut second).unwrap_err();
    assert!(err.is_already_exists());

    let generated = create(&repo, "c.go", EmbeddingStatus::Uploading);
    assert_eq!(generated.sync_id, "2");
    assert_eq!(db.row_count("embedding_states"), 2);
    assert_eq!(
        repo.get_embedding_state_by_sync_id("remote-7").unwrap().file_path,
        "a.go"
    );
}

#[test]
fn test_by_file_returns_latest_submission() {
    let db = TestDb::new();
    let repo = db.embedding_states();

    create(&repo, "a.go", EmbeddingStatus::UploadFailed);
    let retry = create(&repo, "a.go", EmbeddingStatus::Uploading);

    let latest = repo.get_embedding_state_by_file("/ws", "a.go").unwrap();
    assert_eq!(latest.sync_id, retry.sync_id);
    assert_eq!(repo.get_embedding_states_by_workspace("/ws").unwrap().len(), 2);
    assert_eq!(
        repo.get_embedding_states_by_status(EmbeddingStatus::UploadFailed)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_updates_and_not_found() {
    let db = TestDb::new();
    let repo = db.embedding_states();
    let mut state = create(&repo, "a.go", EmbeddingStatus::Uploading);

    repo.update_embedding_state_status(&state.sync_id, EmbeddingStatus::Building, "accepted")
        .unwrap();
    let stored = repo.get_embedding_state_by_sync_id(&state.sync_id).unwrap();
    assert_eq!(stored.status, EmbeddingStatus::Building);
    assert_eq!(stored.message, "accepted");

    state.status = EmbeddingStatus::BuildFailed;
    state.message = "timeout".to_string();
    repo.update_embedding_state(&state).unwrap();
    let stored = repo.get_embedding_state_by_sync_id(&state.sync_id).unwrap();
    assert_eq!(stored.status, EmbeddingStatus::BuildFailed);

    let err = repo
        .update_embedding_state_status("nope", EmbeddingStatus::Success, "")
        .unwrap_err();
    assert!(err.is_not_found());

    repo.delete_embedding_state(&state.sync_id).unwrap();
    assert!(
        repo.delete_embedding_state(&state.sync_id)
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn test_pending_excludes_init_and_success_oldest_first() {
    let db = TestDb::new();
    let repo = db.embedding_states();

    create(&repo, "init.go", EmbeddingStatus::Init);
    let uploading = create(&repo, "up.go", EmbeddingStatus::Uploading);
    create(&repo, "done.go", EmbeddingStatus::Success);
    let building = create(&repo, "build.go", EmbeddingStatus::Building);
    let failed = create(&repo, "fail.go", EmbeddingStatus::BuildFailed);

    let pending = repo.get_pending_embedding_states(10).unwrap();
    let ids: Vec<&str> = pending.iter().map(|s| s.sync_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            uploading.sync_id.as_str(),
            building.sync_id.as_str(),
            failed.sync_id.as_str()
        ]
    );

    let limited = repo.get_pending_embedding_states(1).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].file_path, "up.go");
}

#[test]
fn test_delete_by_workspace() {
    let db = TestDb::new();
    let repo = db.embedding_states();
    create(&repo, "a.go", EmbeddingStatus::Uploading);
    create(&repo, "b.go", EmbeddingStatus::Uploading);
    let mut other = EmbeddingState::new("/other", "c.go", EmbeddingStatus::Uploading);
    repo.create_embedding_state(&mut other).unwrap();

    assert_eq!(repo.delete_embedding_states_by_workspace("/ws").unwrap(), 2);
    assert_eq!(db.row_count("embedding_states"), 1);
}
