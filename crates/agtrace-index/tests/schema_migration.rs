use agtrace_index::EventStore;
use tempfile::tempdir;

#[test]
fn reopening_an_existing_database_preserves_data() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("events.sqlite3");

    let event = agtrace_types::Event::new("proj-1", "sess-1", chrono::Utc::now(), "hello");
    {
        let mut store = EventStore::open(&db_path).unwrap();
        store.insert(&event).unwrap();
    }

    let store = EventStore::open(&db_path).unwrap();
    let fetched = store.get(event.id).unwrap().unwrap();
    assert_eq!(fetched.content, "hello");
}
