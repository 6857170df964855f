//! Edge case tests for burrow-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use burrow_engine::{
    Attachment, Condition, Document, Error, IndexField, Query, RevId, RevisionPayload, Store,
    StoreConfig, StoreSnapshot,
};
use serde_json::json;

fn store() -> Store {
    Store::new("node1")
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn empty_string_fields() {
    let store = store();
    store.put(Document::new("item1", json!({"name": ""})), None).unwrap();
    assert_eq!(store.get("item1").unwrap().body["name"], "");
}

#[test]
fn unicode_strings() {
    let store = store();

    let names = vec![
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
        "Null\0Test",
    ];

    for (i, name) in names.iter().enumerate() {
        let id = format!("item_{}", i);
        let result = store.put(Document::new(id.clone(), json!({ "name": name })), None);
        assert!(result.is_ok(), "Failed for: {}", name);
        assert_eq!(store.get(&id).unwrap().body["name"], *name);
    }
}

#[test]
fn very_long_strings() {
    let store = store();
    let long_string = "x".repeat(1024 * 1024);

    store
        .put(Document::new("item1", json!({ "name": long_string })), None)
        .unwrap();

    let doc = store.get("item1").unwrap();
    assert_eq!(doc.body["name"].as_str().unwrap().len(), 1024 * 1024);
}

#[test]
fn ids_with_special_characters() {
    let store = store();
    let ids = vec![
        "item-with-dashes",
        "item_with_underscores",
        "item.with.dots",
        "item:with:colons",
        "item/with/slashes",
        "item with spaces",
        "日本語ID",
    ];

    for id in ids {
        store.put(Document::new(id, json!({"name": id})), None).unwrap();
        assert_eq!(store.get(id).unwrap().id, id);
    }
}

// ============================================================================
// Numeric Edge Cases
// ============================================================================

#[test]
fn integer_boundaries_sort_numerically() {
    let store = store();
    store.create_index(vec![IndexField::asc("count")]).unwrap();

    let values = vec![i64::MAX, 0, i64::MIN, -1, 1];
    for (i, value) in values.iter().enumerate() {
        store
            .put(Document::new(format!("item_{}", i), json!({ "count": value })), None)
            .unwrap();
    }

    let page = store
        .find(&Query::new().filter("count", Condition::gte(i64::MIN)).sort_asc("count"))
        .unwrap();
    let counts: Vec<i64> = page
        .docs
        .iter()
        .map(|d| d.body["count"].as_i64().unwrap())
        .collect();
    assert_eq!(counts, vec![i64::MIN, -1, 0, 1, i64::MAX]);
}

#[test]
fn mixed_types_follow_collation() {
    let store = store();
    store.create_index(vec![IndexField::asc("v")]).unwrap();

    let values = vec![json!("b"), json!(2), json!(null), json!(true), json!([1]), json!(1.5)];
    for (i, value) in values.into_iter().enumerate() {
        store
            .put(Document::new(format!("d{}", i), json!({ "v": value })), None)
            .unwrap();
    }

    let page = store
        .find(&Query::new().filter("v", Condition::gte(json!(null))).sort_asc("v"))
        .unwrap();
    let ordered: Vec<_> = page.docs.iter().map(|d| d.body["v"].clone()).collect();
    assert_eq!(
        ordered,
        vec![json!(null), json!(true), json!(1.5), json!(2), json!("b"), json!([1])]
    );
}

// ============================================================================
// JSON Edge Cases
// ============================================================================

#[test]
fn deeply_nested_json() {
    let store = store();
    let nested = json!({
        "level1": {"level2": {"level3": {"level4": {"level5": {"value": "deep"}}}}}
    });

    store.put(Document::new("item1", nested), None).unwrap();
    let doc = store.get("item1").unwrap();
    assert_eq!(
        doc.field("level1.level2.level3.level4.level5.value"),
        Some(&json!("deep"))
    );
}

#[test]
fn nested_paths_are_indexable() {
    let store = store();
    store.create_index(vec![IndexField::asc("author.name")]).unwrap();
    store
        .put(Document::new("p1", json!({"author": {"name": "Zoe"}})), None)
        .unwrap();
    store
        .put(Document::new("p2", json!({"author": {"name": "Ada"}})), None)
        .unwrap();
    store.put(Document::new("p3", json!({"author": "anonymous"})), None).unwrap();

    let page = store
        .find(&Query::new().filter("author.name", Condition::gt("")).sort_asc("author.name"))
        .unwrap();
    let ids: Vec<_> = page.docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "p1"]);
}

#[test]
fn non_object_bodies_are_rejected() {
    let store = store();
    for body in [json!(null), json!(1), json!("text"), json!([1, 2])] {
        let err = store.put(Document::new("x", body), None).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }
    assert_eq!(store.last_seq(), 0);
}

// ============================================================================
// Revision Edge Cases
// ============================================================================

#[test]
fn identical_edits_produce_identical_revisions() {
    let a = Store::new("a");
    let b = Store::new("b");
    let ra = a.put(Document::new("doc", json!({"x": 1})), None).unwrap().rev;
    let rb = b.put(Document::new("doc", json!({"x": 1})), None).unwrap().rev;
    assert_eq!(ra, rb);
}

#[test]
fn unknown_parent_is_a_conflict() {
    let store = store();
    let bogus: RevId = "1-ffffffffffffffffffffffffffffffff".parse().unwrap();
    let err = store
        .put(Document::new("doc", json!({})), Some(&bogus))
        .unwrap_err();
    assert!(err.is_conflict());
}

#[test]
fn rapid_updates_same_document() {
    let store = store();
    let mut rev = store.put(Document::new("doc", json!({"n": 0})), None).unwrap().rev;
    for n in 1..100 {
        rev = store
            .put(Document::new("doc", json!({ "n": n })), Some(&rev))
            .unwrap()
            .rev;
    }
    assert_eq!(rev.depth, 100);
    assert_eq!(store.get("doc").unwrap().body["n"], 99);
    assert_eq!(store.last_seq(), 100);
    assert!(store.list_conflicts("doc").unwrap().is_empty());
}

#[test]
fn attachments_change_the_revision() {
    let store = store();
    let plain = Store::new("other")
        .put(Document::new("doc", json!({"t": 1})), None)
        .unwrap()
        .rev;
    let with_file = store
        .put(
            Document::new("doc", json!({"t": 1}))
                .with_attachment("a.txt", Attachment::new("text/plain", b"hi".to_vec())),
            None,
        )
        .unwrap()
        .rev;
    assert_ne!(plain, with_file);

    let doc = store.get("doc").unwrap();
    assert_eq!(doc.attachments["a.txt"].data, b"hi".to_vec());
}

#[test]
fn foreign_tombstone_wins_only_without_live_leaves() {
    let store = store();
    let rev1 = store.put(Document::new("doc", json!({"v": 1})), None).unwrap().rev;
    let live = store
        .put(Document::new("doc", json!({"v": 2})), Some(&rev1))
        .unwrap()
        .rev;

    // A deeper remote tombstone on a sibling branch.
    let r2 = RevId::compute(Some(&rev1), false, &json!({"v": "r"}), std::iter::empty()).unwrap();
    let r3 = RevId::compute(Some(&r2), true, &json!({}), std::iter::empty()).unwrap();
    let mut tombstone = Document::new("doc", json!({}));
    tombstone.deleted = true;
    tombstone.rev = Some(r3.clone());
    store
        .apply_foreign_revision(RevisionPayload {
            doc: tombstone,
            history: vec![r3, r2, rev1],
        })
        .unwrap();

    assert_eq!(store.get("doc").unwrap().rev, Some(live.clone()));

    store.remove("doc", &live).unwrap();
    assert!(matches!(store.get("doc"), Err(Error::NotFound(_))));
}

// ============================================================================
// Query Edge Cases
// ============================================================================

#[test]
fn skip_past_end_is_empty() {
    let store = store();
    store.create_index(vec![IndexField::asc("n")]).unwrap();
    for n in 0..3 {
        store.put(Document::new(format!("d{}", n), json!({ "n": n })), None).unwrap();
    }
    let page = store
        .find(&Query::new().filter("n", Condition::gte(0)).sort_asc("n").skip(10))
        .unwrap();
    assert!(page.docs.is_empty());
}

#[test]
fn limit_zero_is_empty() {
    let store = store();
    store.create_index(vec![IndexField::asc("n")]).unwrap();
    store.put(Document::new("d", json!({"n": 1})), None).unwrap();
    let page = store
        .find(&Query::new().filter("n", Condition::gte(0)).sort_asc("n").limit(0))
        .unwrap();
    assert!(page.docs.is_empty());
}

#[test]
fn query_without_index_fails() {
    let store = store();
    store.put(Document::new("d", json!({"n": 1})), None).unwrap();
    let err = store
        .find(&Query::new().filter("n", Condition::gte(0)).sort_asc("n"))
        .unwrap_err();
    assert!(matches!(err, Error::NoUsableIndex(_)));
}

#[test]
fn use_index_pins_the_choice() {
    let store = store();
    let by_n = store.create_index(vec![IndexField::asc("n")]).unwrap();
    store
        .create_index(vec![IndexField::asc("n"), IndexField::asc("m")])
        .unwrap();
    store.put(Document::new("d", json!({"n": 1, "m": 2})), None).unwrap();

    let page = store
        .find(&Query::new().filter("n", Condition::eq(1)).use_index(by_n.clone()))
        .unwrap();
    assert_eq!(page.index, by_n);

    let err = store
        .find(&Query::new().filter("m", Condition::eq(2)).use_index("missing"))
        .unwrap_err();
    assert!(matches!(err, Error::NoUsableIndex(_)));
}

#[test]
fn invalid_index_specs() {
    let store = store();
    assert!(matches!(
        store.create_index(vec![]),
        Err(Error::InvalidIndexSpec(_))
    ));
    assert!(matches!(
        store.create_index(vec![IndexField::asc("")]),
        Err(Error::InvalidIndexSpec(_))
    ));
}

// ============================================================================
// Snapshot Edge Cases
// ============================================================================

#[test]
fn snapshot_empty_store() {
    let store = store();
    let snapshot = store.export_state();
    assert_eq!(snapshot.document_count(), 0);
    assert_eq!(snapshot.last_seq, 0);

    let json = snapshot.to_json().unwrap();
    let restored = StoreSnapshot::from_json(&json).unwrap();
    assert_eq!(restored, snapshot);
}

#[test]
fn snapshot_with_deleted_documents() {
    let store = store();
    let rev = store.put(Document::new("a", json!({"n": 1})), None).unwrap().rev;
    store.put(Document::new("b", json!({"n": 2})), None).unwrap();
    store.remove("a", &rev).unwrap();

    let snapshot = store.export_state();
    assert_eq!(snapshot.document_count(), 2);
    assert_eq!(snapshot.active_document_count(), 1);
    assert_eq!(snapshot.changes.len(), 3);
}

#[test]
fn corrupt_snapshot_file_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("snapshot.json"), "{ not json").unwrap();
    let result = Store::open(StoreConfig::persistent("node1", dir.path()));
    assert!(result.is_err());
}

// ============================================================================
// Concurrent Writers
// ============================================================================

#[test]
fn concurrent_writers_get_gap_free_sequences() {
    let store = std::sync::Arc::new(store());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..50 {
                    store
                        .put(Document::new(format!("t{}-{}", t, i), json!({ "i": i })), None)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = store.changes_since(0, usize::MAX);
    assert_eq!(entries.len(), 400);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.seq, i as u64 + 1);
    }
    assert_eq!(store.doc_count(), 400);
}

#[test]
fn concurrent_writers_same_document_serialize() {
    let store = std::sync::Arc::new(store());
    let root = store.put(Document::new("doc", json!({"n": 0})), None).unwrap().rev;

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = std::sync::Arc::clone(&store);
            let root = root.clone();
            std::thread::spawn(move || {
                store
                    .put(Document::new("doc", json!({ "writer": t })), Some(&root))
                    .is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(store.last_seq(), 2);
}
