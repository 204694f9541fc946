use quoty_core::db::migrations::latest_version;
use quoty_core::db::{open_db, open_db_in_memory};
use quoty_core::{Quote, QuoteStore, SqliteQuoteStore, StorageError};
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn memory_store() -> SqliteQuoteStore {
    SqliteQuoteStore::try_new(open_db_in_memory().unwrap()).unwrap()
}

#[test]
fn upsert_and_get_roundtrip() {
    let store = memory_store();
    let quote = Quote::new("q1", "Stay hungry, stay foolish.", "Steve Jobs");

    store.upsert(&quote).unwrap();

    assert_eq!(store.get_quote("q1").unwrap(), Some(quote));
    assert_eq!(store.get_quote("missing").unwrap(), None);
}

#[test]
fn upsert_same_record_twice_is_idempotent() {
    let store = memory_store();
    let quote = Quote::new("q1", "A", "X");

    store.upsert(&quote).unwrap();
    let once = store.get_all().unwrap();
    store.upsert(&quote).unwrap();

    assert_eq!(store.get_all().unwrap(), once);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn upsert_replaces_whole_record() {
    let store = memory_store();
    store.upsert(&Quote::new("q1", "A", "X")).unwrap();
    store.upsert(&Quote::new("q1", "B", "Y")).unwrap();

    let loaded = store.get_quote("q1").unwrap().unwrap();
    assert_eq!(loaded.content, "B");
    assert_eq!(loaded.author, "Y");
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn empty_author_is_stored_as_empty_string() {
    let store = memory_store();
    store.upsert(&Quote::new("anon", "Anonymous wisdom", "")).unwrap();

    let loaded = store.get_quote("anon").unwrap().unwrap();
    assert_eq!(loaded.author, "");
}

#[test]
fn get_all_keeps_first_insertion_order() {
    let store = memory_store();
    store.upsert(&Quote::new("c", "third", "")).unwrap();
    store.upsert(&Quote::new("a", "first", "")).unwrap();
    store.upsert(&Quote::new("b", "second", "")).unwrap();
    store.upsert(&Quote::new("c", "third, revised", "")).unwrap();

    let ids: Vec<_> = store
        .get_all()
        .unwrap()
        .into_iter()
        .map(|quote| quote.id)
        .collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
}

#[test]
fn invalid_quote_is_rejected_before_write() {
    let store = memory_store();

    let err = store.upsert(&Quote::new("q1", "  ", "X")).unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
    let err = store.upsert(&Quote::new("", "body", "X")).unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));

    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn quotes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quoty.db");

    {
        let store = SqliteQuoteStore::try_new(open_db(&path).unwrap()).unwrap();
        store.upsert(&Quote::new("q1", "kept offline", "Z")).unwrap();
    }

    let store = SqliteQuoteStore::try_new(open_db(&path).unwrap()).unwrap();
    assert_eq!(
        store.get_all().unwrap(),
        vec![Quote::new("q1", "kept offline", "Z")]
    );
}

#[test]
fn invalid_persisted_row_is_reported_not_masked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quoty.db");
    drop(open_db(&path).unwrap());

    let raw = Connection::open(&path).unwrap();
    raw.execute(
        "INSERT INTO quotes (id, content, author) VALUES ('broken', '', 'X');",
        [],
    )
    .unwrap();
    drop(raw);

    let store = SqliteQuoteStore::try_new(open_db(&path).unwrap()).unwrap();
    assert!(matches!(
        store.get_all(),
        Err(StorageError::InvalidData(_))
    ));
    assert!(matches!(
        store.get_quote("broken"),
        Err(StorageError::InvalidData(_))
    ));
}

#[test]
fn store_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteQuoteStore::try_new(conn) {
        Err(StorageError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn store_rejects_connection_without_quotes_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteQuoteStore::try_new(conn),
        Err(StorageError::MissingRequiredTable("quotes"))
    ));
}

#[test]
fn store_rejects_connection_missing_author_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE quotes (
            id TEXT PRIMARY KEY NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER,
            updated_at INTEGER
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteQuoteStore::try_new(conn),
        Err(StorageError::MissingRequiredColumn {
            table: "quotes",
            column: "author"
        })
    ));
}

#[test]
fn concurrent_writers_and_readers_never_duplicate_ids() {
    let store = Arc::new(memory_store());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for round in 0..25 {
                    let id = format!("q{}", round % 10);
                    let body = format!("worker {worker} round {round}");
                    store.upsert(&Quote::new(id, body, "w")).unwrap();
                    let all = store.get_all().unwrap();
                    let unique: HashSet<_> = all.iter().map(|q| q.id.clone()).collect();
                    assert_eq!(unique.len(), all.len());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.count().unwrap(), 10);
}

#[tokio::test]
async fn watch_replays_current_record_then_updates() {
    let store = memory_store();
    store.upsert(&Quote::new("q1", "A", "X")).unwrap();

    let mut watch = store.watch_quote("q1").unwrap();
    assert_eq!(watch.next().await, Some(Quote::new("q1", "A", "X")));

    store.upsert(&Quote::new("q1", "B", "Y")).unwrap();
    assert_eq!(watch.next().await, Some(Quote::new("q1", "B", "Y")));
}

#[tokio::test]
async fn watch_on_missing_id_waits_for_first_insert() {
    let store = memory_store();
    let mut watch = store.watch_quote("later").unwrap();
    assert_eq!(watch.current(), None);
    assert!(!watch.has_pending());

    store.upsert(&Quote::new("other", "not mine", "")).unwrap();
    assert!(!watch.has_pending());

    store.upsert(&Quote::new("later", "here now", "")).unwrap();
    assert_eq!(watch.next().await, Some(Quote::new("later", "here now", "")));
}

#[tokio::test]
async fn identical_upsert_does_not_re_emit() {
    let store = memory_store();
    let quote = Quote::new("q1", "A", "X");
    store.upsert(&quote).unwrap();

    let mut watch = store.watch_quote("q1").unwrap();
    assert_eq!(watch.next().await, Some(quote.clone()));

    store.upsert(&quote).unwrap();
    assert!(!watch.has_pending());
}

#[tokio::test]
async fn every_new_watch_starts_from_current_record() {
    let store = memory_store();
    store.upsert(&Quote::new("q1", "A", "X")).unwrap();

    let mut first = store.watch_quote("q1").unwrap();
    assert_eq!(first.next().await.map(|q| q.content), Some("A".to_string()));
    drop(first);

    store.upsert(&Quote::new("q1", "B", "Y")).unwrap();

    let mut restarted = store.watch_quote("q1").unwrap();
    assert_eq!(
        restarted.next().await.map(|q| q.content),
        Some("B".to_string())
    );
    let mut second = store.watch_quote("q1").unwrap();
    assert_eq!(second.next().await.map(|q| q.content), Some("B".to_string()));
}

#[tokio::test]
async fn watch_delivers_every_change_in_commit_order() {
    let store = memory_store();
    let mut watch = store.watch_quote("q1").unwrap();

    for content in ["A", "B", "C"] {
        store.upsert(&Quote::new("q1", content, "")).unwrap();
    }

    for content in ["A", "B", "C"] {
        assert_eq!(
            watch.next().await.map(|q| q.content),
            Some(content.to_string())
        );
    }
    assert!(!watch.has_pending());
}
