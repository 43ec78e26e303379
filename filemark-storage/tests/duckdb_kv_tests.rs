use filemark_storage::{BookmarkStore, DuckDbKeyValueStore, KEY_BOOKMARKS, KeyValueStore};
use filemark_types::{Bookmark, ManualClock};
use std::sync::Arc;

#[test]
fn get_missing_key_returns_none() {
    let kv = DuckDbKeyValueStore::open_in_memory().unwrap();
    assert_eq!(kv.get("nope").unwrap(), None);
}

#[test]
fn put_overwrites_existing_value() {
    let kv = DuckDbKeyValueStore::open_in_memory().unwrap();
    kv.put("k", "one").unwrap();
    kv.put("k", "two").unwrap();
    assert_eq!(kv.get("k").unwrap().as_deref(), Some("two"));
    assert_eq!(kv.keys().unwrap(), vec!["k".to_string()]);
}

#[test]
fn put_all_writes_every_entry_in_one_transaction() {
    let kv = DuckDbKeyValueStore::open_in_memory().unwrap();
    kv.put_all(&[("a", "1"), ("b", "2")]).unwrap();
    kv.put_all(&[("a", "3")]).unwrap();

    assert_eq!(kv.get("a").unwrap().as_deref(), Some("3"));
    assert_eq!(kv.get("b").unwrap().as_deref(), Some("2"));
    assert_eq!(kv.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn values_survive_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filemark.duckdb");

    {
        let kv = DuckDbKeyValueStore::open(&path).unwrap();
        kv.put("a", "{\"x\":1}").unwrap();
    }

    let kv = DuckDbKeyValueStore::open(&path).unwrap();
    assert_eq!(kv.get("a").unwrap().as_deref(), Some("{\"x\":1}"));
}

#[test]
fn bookmark_store_over_duckdb() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filemark.duckdb");
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));

    let added = {
        let kv = Arc::new(DuckDbKeyValueStore::open(&path).unwrap());
        let store = BookmarkStore::open(kv, clock.clone());
        store
            .add(Bookmark::new("Camera", "/DCIM/Camera", true, 1_700_000_000_000))
            .unwrap()
    };

    let kv = Arc::new(DuckDbKeyValueStore::open(&path).unwrap());
    assert!(kv.get(KEY_BOOKMARKS).unwrap().is_some());
    let store = BookmarkStore::open(kv, clock);
    assert_eq!(store.list().as_ref(), &vec![added]);
}
