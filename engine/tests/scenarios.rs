//! End-to-end scenarios for a single store.

use burrow_engine::{
    Condition, Document, Error, IndexField, Query, Selector, Store, StoreConfig,
};
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

#[test]
fn stale_update_conflicts_and_winner_stays() {
    let store = Store::new("device");
    let rev1 = store
        .put(Document::new("note", json!({"text": "draft"})), None)
        .unwrap()
        .rev;
    let rev2a = store
        .put(Document::new("note", json!({"text": "edit A"})), Some(&rev1))
        .unwrap()
        .rev;

    let err = store
        .put(Document::new("note", json!({"text": "edit B"})), Some(&rev1))
        .unwrap_err();
    assert_eq!(err, Error::Conflict("note".into()));
    assert_eq!(store.get("note").unwrap().rev, Some(rev2a.clone()));

    let rev3 = store
        .put(Document::new("note", json!({"text": "edit C"})), Some(&rev2a))
        .unwrap();
    assert_eq!(store.get("note").unwrap().body["text"], "edit C");
    assert_eq!(rev3.seq, 3);
}

#[test]
fn top_posts_by_likes_then_recency() {
    let store = Store::new("device");
    store
        .create_index(vec![IndexField::desc("likes"), IndexField::desc("created_at")])
        .unwrap();

    for i in 0..15u64 {
        let body = json!({ "title": format!("post {}", i), "likes": i % 5, "created_at": 1000 + i });
        store.put(Document::new(format!("post-{:02}", i), body), None).unwrap();
    }

    let query = Query::new()
        .selector(Selector::from_json(&json!({"likes": {"$gte": 0}})).unwrap())
        .sort_desc("likes")
        .sort_desc("created_at")
        .limit(10);
    let page = store.find(&query).unwrap();
    assert_eq!(page.docs.len(), 10);

    let keys: Vec<(u64, u64)> = page
        .docs
        .iter()
        .map(|d| {
            (
                d.body["likes"].as_u64().unwrap(),
                d.body["created_at"].as_u64().unwrap(),
            )
        })
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(keys, sorted);
    assert_eq!(keys[0], (4, 1014));
    assert_eq!(keys[8], (2, 1002));
    assert_eq!(keys[9], (1, 1011));
}

#[test]
fn second_page_continues_where_first_ended() {
    let store = Store::new("device");
    store.create_index(vec![IndexField::asc("n")]).unwrap();
    for n in 0..10 {
        store.put(Document::new(format!("d{}", n), json!({ "n": n })), None).unwrap();
    }

    let base = Query::new().filter("n", Condition::gte(0)).sort_asc("n");
    let first = store.find(&base.clone().limit(4)).unwrap();
    let second = store.find(&base.skip(4).limit(4)).unwrap();

    let all: Vec<_> = first
        .docs
        .iter()
        .chain(second.docs.iter())
        .map(|d| d.body["n"].as_u64().unwrap())
        .collect();
    assert_eq!(all, (0..8).collect::<Vec<_>>());
}

#[test]
fn restart_keeps_documents_feed_and_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::persistent("device", dir.path());

    {
        let store = Store::open(config.clone()).unwrap();
        store.create_index(vec![IndexField::desc("likes")]).unwrap();
        let rev = store
            .put(Document::new("a", json!({"likes": 1})), None)
            .unwrap()
            .rev;
        store.put(Document::new("a", json!({"likes": 7})), Some(&rev)).unwrap();
        store.put(Document::new("b", json!({"likes": 3})), None).unwrap();
    }

    let store = Store::open(config).unwrap();
    assert_eq!(store.last_seq(), 3);
    assert_eq!(store.changes_since(1, 10).len(), 2);

    let page = store
        .find(&Query::new().filter("likes", Condition::gte(0)).sort_desc("likes"))
        .unwrap();
    let ids: Vec<_> = page.docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let next = store.put(Document::new("c", json!({"likes": 0})), None).unwrap();
    assert_eq!(next.seq, 4);
}

#[tokio::test]
async fn subscriber_sees_writes_in_commit_order() {
    let store = std::sync::Arc::new(Store::new("device"));
    let stream = store.subscribe(None).into_stream();

    let writer = std::sync::Arc::clone(&store);
    tokio::spawn(async move {
        for i in 0..3 {
            writer
                .put(Document::new(format!("d{}", i), json!({ "i": i })), None)
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let seen: Vec<_> = tokio::time::timeout(Duration::from_secs(5), stream.take(3).collect::<Vec<_>>())
        .await
        .unwrap();
    let seqs: Vec<_> = seen.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(seen[2].id, "d2");
}

#[tokio::test]
async fn resubscribing_from_cursor_resumes() {
    let store = Store::new("device");
    let mut sub = store.subscribe(Some(0));
    store.put(Document::new("a", json!({})), None).unwrap();
    store.put(Document::new("b", json!({})), None).unwrap();

    assert_eq!(sub.next().await.unwrap().id, "a");
    let cursor = sub.cursor();
    sub.unsubscribe();

    let mut resumed = store.subscribe(Some(cursor));
    assert_eq!(resumed.next().await.unwrap().id, "b");
}
