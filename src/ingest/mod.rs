pub mod normalize;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::{Article, Source, Store, StoreError};

pub use normalize::{fingerprint, normalize, RawRecord, ValidationError};

/// One source's freshly scraped records, in the order the source produced
/// them.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: Source,
    pub records: Vec<RawRecord>,
}

/// Caller-visible accounting for one merge invocation.
///
/// `total_seen` counts records that survived normalization; malformed
/// records are excluded (and tallied in `skipped_invalid`). For every merge,
/// `added + duplicates == total_seen`.
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub total_seen: usize,
    pub added: usize,
    pub duplicates: usize,
    pub skipped_invalid: usize,
    pub total_articles: usize,
    pub run_count: u64,
    pub last_run: DateTime<Utc>,
}

/// Merge per-source batches into the store.
///
/// Batches are processed in the fixed [`Source`] precedence order, not in
/// arrival order, so a URL surfaced by two sources deterministically keeps
/// the higher-precedence candidate. Within one batch the first occurrence
/// of an id wins and repeats count as duplicates. Articles already in the
/// store are never touched: a re-scrape cannot reset saved state.
///
/// The run counters advance exactly once per invocation, including for an
/// empty merge; a merge whose persist fails advances neither (see
/// [`Store::upsert_new`]).
pub async fn merge_and_store(
    store: &Store,
    mut batches: Vec<SourceBatch>,
    now: DateTime<Utc>,
) -> Result<MergeSummary, StoreError> {
    batches.sort_by_key(|b| b.source);

    let mut total_seen = 0usize;
    let mut skipped_invalid = 0usize;
    let mut in_batch_duplicates = 0usize;
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut candidates: Vec<Article> = Vec::new();

    for batch in &batches {
        for record in &batch.records {
            let article = match normalize(record, now) {
                Ok(article) => article,
                Err(e) => {
                    tracing::warn!(source = %batch.source, error = %e, "Skipping invalid record");
                    skipped_invalid += 1;
                    continue;
                }
            };
            total_seen += 1;
            if seen_ids.insert(article.id.clone()) {
                candidates.push(article);
            } else {
                in_batch_duplicates += 1;
            }
        }
    }

    let outcome = store.upsert_new(candidates, now).await?;
    let summary = MergeSummary {
        total_seen,
        added: outcome.added,
        duplicates: in_batch_duplicates + outcome.duplicates,
        skipped_invalid,
        total_articles: outcome.total_articles,
        run_count: outcome.run_count,
        last_run: outcome.last_run,
    };

    tracing::info!(
        added = summary.added,
        duplicates = summary.duplicates,
        skipped = summary.skipped_invalid,
        total = summary.total_articles,
        "Merge complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(source: Source, url: &str, title: &str) -> RawRecord {
        RawRecord::FeedEntry {
            source,
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            summary: None,
            author: None,
            published_at: None,
        }
    }

    async fn test_store(dir: &tempfile::TempDir) -> Store {
        Store::open(dir.path()).unwrap()
    }

    /// 5 raw records, 2 colliding with stored articles, 1 malformed.
    /// Expect `{added: 2, duplicates: 2, total_seen: 4}`.
    #[tokio::test]
    async fn test_merge_counters_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let now = Utc::now();

        // Pre-populate the store with two articles.
        merge_and_store(
            &store,
            vec![SourceBatch {
                source: Source::Bensbites,
                records: vec![
                    entry(Source::Bensbites, "https://example.com/a", "A"),
                    entry(Source::Bensbites, "https://example.com/b", "B"),
                ],
            }],
            now,
        )
        .await
        .unwrap();

        let summary = merge_and_store(
            &store,
            vec![SourceBatch {
                source: Source::Bensbites,
                records: vec![
                    entry(Source::Bensbites, "https://example.com/a", "A again"),
                    entry(Source::Bensbites, "https://example.com/b", "B again"),
                    entry(Source::Bensbites, "https://example.com/c", "C"),
                    entry(Source::Bensbites, "https://example.com/d", "D"),
                    entry(Source::Bensbites, "не-url", "broken"),
                ],
            }],
            now,
        )
        .await
        .unwrap();

        assert_eq!(summary.total_seen, 4);
        assert_eq!(summary.added, 2);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(summary.skipped_invalid, 1);
        assert_eq!(summary.total_articles, 4);
    }

    #[tokio::test]
    async fn test_cross_source_collision_uses_precedence_not_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let now = Utc::now();

        // Reddit batch arrives first, but bensbites outranks it.
        let summary = merge_and_store(
            &store,
            vec![
                SourceBatch {
                    source: Source::Reddit,
                    records: vec![entry(Source::Reddit, "https://example.com/shared", "From Reddit")],
                },
                SourceBatch {
                    source: Source::Bensbites,
                    records: vec![entry(
                        Source::Bensbites,
                        "https://example.com/shared",
                        "From Bens Bites",
                    )],
                },
            ],
            now,
        )
        .await
        .unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(summary.duplicates, 1);

        let snap = store.snapshot().await;
        assert_eq!(snap.articles.len(), 1);
        assert_eq!(snap.articles[0].source, Source::Bensbites);
        assert_eq!(snap.articles[0].title, "From Bens Bites");
    }

    #[tokio::test]
    async fn test_remerge_preserves_saved_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let now = Utc::now();

        merge_and_store(
            &store,
            vec![SourceBatch {
                source: Source::Bensbites,
                records: vec![entry(Source::Bensbites, "https://example.com/keep", "Keep")],
            }],
            now,
        )
        .await
        .unwrap();

        let id = store.snapshot().await.articles[0].id.clone();
        store.mark_saved(&id, now).await.unwrap();

        // Re-scrape of the same URL with fresher metadata.
        merge_and_store(
            &store,
            vec![SourceBatch {
                source: Source::Bensbites,
                records: vec![entry(
                    Source::Bensbites,
                    "https://example.com/keep",
                    "Keep (updated)",
                )],
            }],
            now + chrono::Duration::hours(1),
        )
        .await
        .unwrap();

        let snap = store.snapshot().await;
        assert_eq!(snap.articles.len(), 1);
        assert!(snap.articles[0].saved);
        assert_eq!(snap.articles[0].title, "Keep");
    }

    #[tokio::test]
    async fn test_empty_batches_advance_run_counters() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let summary = merge_and_store(&store, vec![], Utc::now()).await.unwrap();
        assert_eq!(summary.total_seen, 0);
        assert_eq!(summary.run_count, 1);
    }
}
