// Baseline and embedding document store tests

use std::fs;
use tempfile::TempDir;

use crate::repository::storage::{codebase_id, embedding_codebase_id};
use crate::repository::{
    CodebaseConfig, CodebaseEmbeddingConfig, EmbeddingFileRepository, StorageManager,
};

fn baseline(path: &str, files: &[(&str, &str)]) -> CodebaseConfig {
    let mut config = CodebaseConfig::new(path);
    for (file, hash) in files {
        config.hash_tree.insert(file.to_string(), hash.to_string());
    }
    config
}

#[test]
fn test_codebase_ids_are_stable_and_distinct() {
    let id = codebase_id("/home/dev/project");
    assert!(id.starts_with("project_"));
    assert_eq!(id, codebase_id("/home/dev/project"));
    assert_ne!(id, codebase_id("/srv/project"));
    assert_eq!(
        embedding_codebase_id("/home/dev/project"),
        format!("{}_embedding", id)
    );
}

#[test]
fn test_baseline_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("workspace");

    let config = baseline("/ws/app", &[("main.go", "h1"), ("src/lib.go", "h2")]);
    {
        let storage = StorageManager::open(&dir).unwrap();
        storage.save(&config).unwrap();
        assert_eq!(storage.get(&config.codebase_id).unwrap(), config);
    }

    let reopened = StorageManager::open(&dir).unwrap();
    let all = reopened.all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[&config.codebase_id].hash_tree.len(), 2);

    // no temp files are left next to the document
    let names: Vec<String> = fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec![format!("{}.json", config.codebase_id)]);
}

#[test]
fn test_save_replaces_previous_baseline() {
    let temp_dir = TempDir::new().unwrap();
    let storage = StorageManager::open(temp_dir.path()).unwrap();

    let mut config = baseline("/ws/app", &[("a.ts", "h1")]);
    storage.save(&config).unwrap();
    config.hash_tree.clear();
    config.hash_tree.insert("b.ts".to_string(), "h2".to_string());
    storage.save(&config).unwrap();

    let reopened = StorageManager::open(temp_dir.path()).unwrap();
    let stored = reopened.get(&config.codebase_id).unwrap();
    assert_eq!(stored.hash_tree.keys().collect::<Vec<_>>(), vec!["b.ts"]);
}

#[test]
fn test_get_reads_documents_written_after_open() {
    let temp_dir = TempDir::new().unwrap();
    let reader = StorageManager::open(temp_dir.path()).unwrap();
    let writer = StorageManager::open(temp_dir.path()).unwrap();

    let config = baseline("/ws/late", &[("x.py", "h")]);
    writer.save(&config).unwrap();

    assert!(reader.all().is_empty());
    assert_eq!(reader.get(&config.codebase_id).unwrap(), config);
    assert_eq!(reader.all().len(), 1);
}

#[test]
fn test_missing_and_malformed_documents() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("broken.json"), "{not json").unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

    // a document filed under the wrong name is not trusted
    let moved = baseline("/ws/real", &[]);
    fs::write(
        temp_dir.path().join("other.json"),
        serde_json::to_string(&moved).unwrap(),
    )
    .unwrap();

    let storage = StorageManager::open(temp_dir.path()).unwrap();
    assert!(storage.all().is_empty());
    assert!(storage.get("absent").unwrap_err().is_not_found());
    assert!(storage.get("broken").is_err());
    assert!(storage.get("other").is_err());
    assert!(storage.get("../escape").unwrap_err().is_validation());
}

#[test]
fn test_delete_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let storage = StorageManager::open(temp_dir.path()).unwrap();
    let config = baseline("/ws/gone", &[("a.go", "h")]);
    storage.save(&config).unwrap();

    storage.delete(&config.codebase_id).unwrap();
    assert!(storage.get(&config.codebase_id).unwrap_err().is_not_found());
    assert!(!temp_dir
        .path()
        .join(format!("{}.json", config.codebase_id))
        .exists());

    storage.delete(&config.codebase_id).unwrap();
}

#[test]
fn test_embedding_records_round_trip_sync_bookkeeping() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("embedding");
    let repo = EmbeddingFileRepository::open(&dir).unwrap();

    let mut record = CodebaseEmbeddingConfig::new("/ws/app");
    assert!(record.codebase_id.ends_with("_embedding"));
    record.hash_tree.insert("a.go".to_string(), "h1".to_string());
    record.sync_files.insert("a.go".to_string(), "17".to_string());
    record.sync_ids.push("17".to_string());
    record
        .failed_files
        .insert("b.go".to_string(), "upload timed out".to_string());
    repo.save(&record).unwrap();

    let reopened = EmbeddingFileRepository::open(&dir).unwrap();
    let stored = reopened.get(&record.codebase_id).unwrap();
    assert_eq!(stored.sync_ids, vec!["17"]);
    assert_eq!(stored.failed_files["b.go"], "upload timed out");

    // baselines and embedding records never share a directory
    let baselines = StorageManager::open(&temp_dir.path().join("workspace")).unwrap();
    assert!(baselines.all().is_empty());
}

#[test]
fn test_open_rejects_empty_dir() {
    let err = StorageManager::open(std::path::Path::new(""))
        .err()
        .unwrap();
    assert!(err.is_validation());
}
