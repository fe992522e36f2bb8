use gomarket_core::db::open_db_in_memory;
use gomarket_core::{KeyValueStore, KvError, SqliteKeyValueStore};
use rusqlite::Connection;

#[test]
fn get_missing_key_returns_none() {
    let store = SqliteKeyValueStore::try_new(open_db_in_memory().unwrap()).unwrap();
    assert_eq!(store.get("@GoMarket:products").unwrap(), None);
}

#[test]
fn set_then_get_returns_latest_value() {
    let store = SqliteKeyValueStore::try_new(open_db_in_memory().unwrap()).unwrap();

    store.set("@GoMarket:products", "[]").unwrap();
    store.set("@GoMarket:products", r#"[{"id":"a"}]"#).unwrap();

    assert_eq!(
        store.get("@GoMarket:products").unwrap().as_deref(),
        Some(r#"[{"id":"a"}]"#)
    );
}

#[test]
fn keys_are_independent() {
    let store = SqliteKeyValueStore::try_new(open_db_in_memory().unwrap()).unwrap();

    store.set("first", "1").unwrap();
    store.set("second", "2").unwrap();

    assert_eq!(store.get("first").unwrap().as_deref(), Some("1"));
    assert_eq!(store.get("second").unwrap().as_deref(), Some("2"));
}

#[test]
fn blank_key_is_rejected() {
    let store = SqliteKeyValueStore::try_new(open_db_in_memory().unwrap()).unwrap();

    let err = store.set("   ", "value").unwrap_err();
    assert!(matches!(err, KvError::InvalidKey(_)));
    assert!(matches!(store.get(""), Err(KvError::InvalidKey(_))));
}

#[test]
fn values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv.db");

    let store = SqliteKeyValueStore::open(&path).unwrap();
    store.set("@GoMarket:products", "[]").unwrap();
    drop(store);

    let reopened = SqliteKeyValueStore::open(&path).unwrap();
    assert_eq!(
        reopened.get("@GoMarket:products").unwrap().as_deref(),
        Some("[]")
    );
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteKeyValueStore::try_new(conn)
        .err()
        .expect("raw connection has no kv_store table");
    assert!(matches!(err, KvError::Db(_)));
}

#[test]
fn open_error_names_database_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("cart.db");

    let err = SqliteKeyValueStore::open(&path)
        .err()
        .expect("parent directory does not exist");
    assert!(matches!(err, KvError::Db(_)));
    assert!(err.to_string().contains(path.to_str().unwrap()));
}
