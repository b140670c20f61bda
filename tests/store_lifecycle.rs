//! Integration tests for the store lifecycle: merge, save, unsave,
//! persistence, and recovery.
//!
//! Each test runs against its own temp directory so store files never
//! interfere across tests.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use pulse::ingest::{self, RawRecord, SourceBatch};
use pulse::store::{queries, Source, Store};

fn entry(url: &str, title: &str) -> RawRecord {
    RawRecord::FeedEntry {
        source: Source::Bensbites,
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        summary: Some("summary".to_string()),
        author: None,
        published_at: Some(Utc::now()),
    }
}

fn batch(records: Vec<RawRecord>) -> Vec<SourceBatch> {
    vec![SourceBatch {
        source: Source::Bensbites,
        records,
    }]
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_merge_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Store::open(dir.path()).unwrap();
        ingest::merge_and_store(
            &store,
            batch(vec![entry("https://example.com/a", "A")]),
            Utc::now(),
        )
        .await
        .unwrap();
    }

    let store = Store::open(dir.path()).unwrap();
    let snap = store.snapshot().await;
    assert_eq!(snap.articles.len(), 1);
    assert_eq!(snap.run_count, 1);
    assert!(snap.last_run.is_some());
}

#[tokio::test]
async fn test_stray_temp_file_does_not_break_load() {
    // Simulates a crash between temp-file write and rename: the temp file
    // remains, the store file holds the previous complete snapshot.
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        ingest::merge_and_store(
            &store,
            batch(vec![entry("https://example.com/a", "A")]),
            Utc::now(),
        )
        .await
        .unwrap();
    }
    std::fs::write(
        dir.path().join("articles_store.tmp.00deadbeef000000"),
        "{ half-written",
    )
    .unwrap();

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.snapshot().await.articles.len(), 1);
}

#[tokio::test]
async fn test_corrupt_store_recovers_and_keeps_working() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("articles_store.json"), "not json at all").unwrap();

    let store = Store::open(dir.path()).unwrap();
    assert!(store.snapshot().await.articles.is_empty());
    // The evidence is preserved, not silently discarded.
    assert!(dir.path().join("articles_store.json.corrupt").exists());

    // The fresh store is fully usable.
    let summary = ingest::merge_and_store(
        &store,
        batch(vec![entry("https://example.com/a", "A")]),
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(summary.added, 1);
}

// ============================================================================
// Save Permanence
// ============================================================================

#[tokio::test]
async fn test_saved_article_survives_unrelated_merges() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let now = Utc::now();

    ingest::merge_and_store(&store, batch(vec![entry("https://example.com/keep", "Keep")]), now)
        .await
        .unwrap();
    let id = store.snapshot().await.articles[0].id.clone();
    store.mark_saved(&id, now).await.unwrap();

    for i in 0..5 {
        ingest::merge_and_store(
            &store,
            batch(vec![entry(&format!("https://example.com/other-{i}"), "Other")]),
            now,
        )
        .await
        .unwrap();
    }

    let snap = store.snapshot().await;
    let kept = snap.get(&id).expect("saved article still present");
    assert!(kept.saved);
    assert_eq!(snap.run_count, 6);
}

#[tokio::test]
async fn test_saved_article_outside_window_in_saved_view_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let now = Utc::now();

    let old = RawRecord::FeedEntry {
        source: Source::Bensbites,
        title: Some("Old but saved".to_string()),
        url: Some("https://example.com/old".to_string()),
        summary: None,
        author: None,
        published_at: Some(now - Duration::hours(48)),
    };
    ingest::merge_and_store(&store, batch(vec![old]), now)
        .await
        .unwrap();
    let id = store.snapshot().await.articles[0].id.clone();
    store.mark_saved(&id, now).await.unwrap();

    let snap = store.snapshot().await;
    let window = Duration::hours(24);
    assert!(queries::feed(&snap, now, window).is_empty());
    assert_eq!(queries::saved(&snap).len(), 1);

    let stats = queries::stats(&snap, now, window);
    assert_eq!(stats.today_count, 0);
    assert_eq!(stats.saved_count, 1);
    assert_eq!(stats.total_articles, 1);
}

// ============================================================================
// Destructive Unsave
// ============================================================================

#[tokio::test]
async fn test_unsave_removes_from_all_views_and_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let now = Utc::now();

    ingest::merge_and_store(&store, batch(vec![entry("https://example.com/x", "X")]), now)
        .await
        .unwrap();
    let id = store.snapshot().await.articles[0].id.clone();
    store.mark_saved(&id, now).await.unwrap();
    store.remove(&id).await.unwrap();

    let snap = store.snapshot().await;
    assert!(queries::feed(&snap, now, Duration::hours(24)).is_empty());
    assert!(queries::saved(&snap).is_empty());

    // Durable: still gone after reopen.
    drop(store);
    let store = Store::open(dir.path()).unwrap();
    assert!(store.snapshot().await.articles.is_empty());
}

#[tokio::test]
async fn test_remerge_of_unsaved_url_reinserts_as_fresh() {
    // After a destructive unsave there is no tombstone: the same URL can
    // come back through a later scrape, unsaved.
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let now = Utc::now();

    ingest::merge_and_store(&store, batch(vec![entry("https://example.com/x", "X")]), now)
        .await
        .unwrap();
    let id = store.snapshot().await.articles[0].id.clone();
    store.mark_saved(&id, now).await.unwrap();
    store.remove(&id).await.unwrap();

    let summary = ingest::merge_and_store(
        &store,
        batch(vec![entry("https://example.com/x", "X returns")]),
        now,
    )
    .await
    .unwrap();
    assert_eq!(summary.added, 1);
    let snap = store.snapshot().await;
    assert_eq!(snap.get(&id).map(|a| a.saved), Some(false));
}

// ============================================================================
// No Duplication (property)
// ============================================================================

mod no_duplication {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// For any sequence of merges over a small URL universe, the store
        /// never holds two articles with the same id.
        #[test]
        fn merge_sequences_never_duplicate(merges in prop::collection::vec(
            prop::collection::vec(0usize..8, 0..6),
            1..6,
        )) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let dir = tempfile::tempdir().unwrap();
                let store = Store::open(dir.path()).unwrap();

                for urls in &merges {
                    let records = urls
                        .iter()
                        .map(|i| entry(&format!("https://example.com/p/{i}"), "t"))
                        .collect();
                    ingest::merge_and_store(&store, batch(records), Utc::now())
                        .await
                        .unwrap();
                }

                let snap = store.snapshot().await;
                let mut ids: Vec<&str> = snap.articles.iter().map(|a| a.id.as_str()).collect();
                ids.sort_unstable();
                let before = ids.len();
                ids.dedup();
                prop_assert_eq!(before, ids.len());
                prop_assert_eq!(snap.run_count, merges.len() as u64);
                Ok(())
            })?;
        }
    }
}
