// Shared pool behaviour under concurrent repository use

use serial_test::serial;
use std::sync::Arc;
use std::thread;

use crate::database::{DatabaseManager, Event, EventType, SortOrder};
use crate::repository::{EventRepository, NO_LIMIT, SqliteEventRepository};
use crate::tests::test_helpers::TestDb;

#[test]
#[serial]
fn test_concurrent_writers_share_one_pool() {
    let db = TestDb::with_config(|config| {
        config.max_open_conns = 3;
        config.max_idle_conns = 2;
    });
    let repo = Arc::new(SqliteEventRepository::new(db.db()));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for i in 0..25 {
                    let mut event = Event::new(
                        "/ws",
                        EventType::ModifyFile,
                        format!("w{}/f{}.go", worker, i),
                    );
                    repo.create_event(&mut event).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let all = repo.get_events_by_workspace("/ws", NO_LIMIT, SortOrder::Asc).unwrap();
    assert_eq!(all.len(), 100);

    let stats = db.manager.pool_stats().unwrap();
    assert!(stats.open <= 3);
    assert!(stats.open >= 2, "warm connections are kept: {:?}", stats);
    assert!(stats.idle <= stats.open);
}

#[test]
fn test_closed_manager_releases_pool() {
    let db = TestDb::new();
    assert!(db.manager.pool_stats().is_some());
    db.manager.close().unwrap();
    assert!(db.manager.pool_stats().is_none());
    db.manager.close().unwrap();
}

#[test]
fn test_nested_checkout_below_limit() {
    let db = TestDb::new();
    let first = db.manager.get_conn().unwrap();
    let second = db.manager.get_conn().unwrap();

    let one: i64 = first.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
    let two: i64 = second.query_row("SELECT 2", [], |row| row.get(0)).unwrap();
    assert_eq!(one + two, 3);
}
