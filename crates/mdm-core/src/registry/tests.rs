//! Registry tests against an in-memory database.

use super::db::open_memory;
use super::ModelStore;
use crate::artifact::Artifact;
use std::path::PathBuf;

fn artifact(id: &str) -> Artifact {
    Artifact {
        id: id.to_string(),
        name: format!("{id}.gguf"),
        url: format!("https://example.com/{id}.gguf"),
        companion_url: None,
        companion_name: None,
        total_bytes: 42,
        token: Some("secret".to_string()),
        dir: PathBuf::from(format!("/tmp/models/{id}")),
    }
}

#[tokio::test]
async fn insert_list_get_contains() {
    let reg = open_memory().await.unwrap();
    assert!(reg.list().await.unwrap().is_empty());

    reg.insert(&artifact("a")).await.unwrap();
    reg.insert(&artifact("b")).await.unwrap();

    assert!(reg.contains("a").await.unwrap());
    assert!(!reg.contains("missing").await.unwrap());

    let rec = reg.get("a").await.unwrap().unwrap();
    assert_eq!(rec.name, "a.gguf");
    assert_eq!(rec.total_bytes, 42);
    assert_eq!(rec.dir, PathBuf::from("/tmp/models/a"));
    // Tokens must never be persisted.
    assert!(rec.artifact().token.is_none());

    assert_eq!(reg.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn insert_is_idempotent_upsert() {
    let reg = open_memory().await.unwrap();
    reg.insert(&artifact("a")).await.unwrap();
    reg.insert(&artifact("a")).await.unwrap();
    assert_eq!(reg.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn remove_and_clear_tolerate_absent_rows() {
    let reg = open_memory().await.unwrap();
    reg.remove("nope").await.unwrap();
    reg.insert(&artifact("a")).await.unwrap();
    reg.remove("a").await.unwrap();
    assert!(!reg.contains("a").await.unwrap());

    reg.insert(&artifact("b")).await.unwrap();
    reg.insert(&artifact("c")).await.unwrap();
    reg.clear().await.unwrap();
    assert!(reg.list().await.unwrap().is_empty());
    reg.clear().await.unwrap();
}

#[tokio::test]
async fn touch_updates_last_use_time() {
    let reg = open_memory().await.unwrap();
    reg.insert(&artifact("a")).await.unwrap();
    let before = reg.get("a").await.unwrap().unwrap();
    reg.touch("a").await.unwrap();
    let after = reg.get("a").await.unwrap().unwrap();
    assert!(after.last_used_at >= before.last_used_at);
    // Touching an unknown id is a no-op.
    reg.touch("missing").await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_store_bridge_works_from_worker_threads() {
    let reg = open_memory().await.unwrap();
    let store = reg.clone();
    // The scheduler calls the sync seam from plain download worker threads.
    std::thread::spawn(move || {
        let a = artifact("bridged");
        ModelStore::insert(&store, &a).unwrap();
        ModelStore::update_last_use_time(&store, &a).unwrap();
    })
    .join()
    .unwrap();
    assert!(reg.contains("bridged").await.unwrap());

    let store = reg.clone();
    std::thread::spawn(move || {
        ModelStore::remove(&store, &artifact("bridged")).unwrap();
    })
    .join()
    .unwrap();
    assert!(!reg.contains("bridged").await.unwrap());
}
