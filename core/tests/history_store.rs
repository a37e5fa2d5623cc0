//! Input history: eviction, move-to-newest, persistence.

use softkey_core::{EmojiCatalog, HistoryRecord, HistoryStore, KeyBindingRegistry};
use std::fs;

/// Catalog in which the lowercase ASCII letters are registered single symbols,
/// so they are accepted as one-cluster history entries.
fn letter_catalog() -> EmojiCatalog {
    let json = r#"{ "keys": [ { "keyNo": 1, "type": "Emoji", "label": "letters",
        "ranges": [ { "start": "0x61", "end": "0x7A" } ] } ] }"#;
    KeyBindingRegistry::from_json_str(json, 2000)
        .unwrap()
        .catalog()
        .clone()
}

fn values(store: &HistoryStore) -> Vec<String> {
    store.records().map(|r| r.value.clone()).collect()
}

#[test]
fn test_bound_of_two_keeps_newest() {
    let catalog = letter_catalog();
    let mut store = HistoryStore::new(2);
    assert!(store.add_entry("a", None, &catalog));
    assert!(store.add_entry("b", None, &catalog));
    assert!(store.add_entry("c", None, &catalog));
    assert_eq!(values(&store), vec!["b", "c"]);
}

#[test]
fn test_repeated_entry_is_single_and_newest() {
    let catalog = letter_catalog();
    let mut store = HistoryStore::new(10);
    store.add_entry("older", None, &catalog);
    assert!(store.add_entry("x", Some("k"), &catalog));
    assert!(store.add_entry("x", Some("k"), &catalog));

    let keyed: Vec<_> = store
        .records()
        .filter(|r| r.sub_key.as_deref() == Some("k"))
        .collect();
    assert_eq!(keyed.len(), 1);
    assert_eq!(
        store.records().next_back(),
        Some(&HistoryRecord::new(Some("k".to_string()), "x"))
    );
    assert_eq!(store.len(), 2);
}

#[test]
fn test_unregistered_single_character_is_ignored() {
    let catalog = letter_catalog();
    let mut store = HistoryStore::new(10);
    assert!(!store.add_entry("Z", None, &catalog));
    assert!(!store.add_entry("あ", None, &catalog));
    assert!(store.add_entry("ZZ", None, &catalog));
    assert_eq!(values(&store), vec!["ZZ"]);
}

#[test]
fn test_matches_use_whole_clusters() {
    let catalog = letter_catalog();
    let flag = "\u{1F1EF}\u{1F1F5}";
    let mut store = HistoryStore::new(10);
    store.add_entry(&format!("{flag} trip"), None, &catalog);
    store.add_entry("\u{1F1EF}\u{1F1F4}!", None, &catalog);

    let hits = store.matches(flag);
    assert_eq!(hits.len(), 1);
    assert!(hits[0].value.ends_with("trip"));
    assert!(store.matches("\u{1F1EF}").is_empty());
}

#[test]
fn test_file_round_trip_preserves_order_and_keys() {
    let catalog = letter_catalog();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history.txt");

    let mut store = HistoryStore::load(&path, 5).unwrap();
    store.add_entry("plain", None, &catalog);
    store.add_entry("1,000", None, &catalog);
    store.add_entry("ありがとう", Some("arigato"), &catalog);
    store.save().unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "plain\n,1,000\narigato,ありがとう\n"
    );

    let reloaded = HistoryStore::load(&path, 5).unwrap();
    let records: Vec<_> = reloaded.records().cloned().collect();
    assert_eq!(
        records,
        vec![
            HistoryRecord::new(None, "plain"),
            HistoryRecord::new(None, "1,000"),
            HistoryRecord::new(Some("arigato".to_string()), "ありがとう"),
        ]
    );
}

#[test]
fn test_clear_removes_file() {
    let catalog = letter_catalog();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.txt");

    let mut store = HistoryStore::load(&path, 5).unwrap();
    store.add_entry("hello", None, &catalog);
    store.save().unwrap();
    assert!(path.exists());

    store.clear();
    assert!(store.is_empty());
    assert!(!path.exists());
}
