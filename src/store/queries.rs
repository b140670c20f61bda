use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::types::{Article, Source, StoreData};

/// Dashboard statistics, always derived from the same snapshot as the list
/// they accompany so counts and articles can never disagree.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_articles: usize,
    pub today_count: usize,
    pub saved_count: usize,
    /// Per-source counts over the windowed feed view.
    pub sources: BTreeMap<Source, usize>,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
}

/// Articles published within `[now - window, now]`, newest first.
///
/// Saved state plays no role here: a saved article outside the window is
/// absent from the feed (it lives in the saved view instead).
pub fn feed(data: &StoreData, now: DateTime<Utc>, window: Duration) -> Vec<Article> {
    let cutoff = now - window;
    let mut result: Vec<Article> = data
        .articles
        .iter()
        .filter(|a| a.published_at >= cutoff && a.published_at <= now)
        .cloned()
        .collect();
    result.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    result
}

/// All saved articles regardless of age, most recently saved first.
pub fn saved(data: &StoreData) -> Vec<Article> {
    let mut result: Vec<Article> = data.articles.iter().filter(|a| a.saved).cloned().collect();
    result.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
    result
}

pub fn stats(data: &StoreData, now: DateTime<Utc>, window: Duration) -> Stats {
    let today = feed(data, now, window);
    let mut sources = BTreeMap::new();
    for article in &today {
        *sources.entry(article.source).or_insert(0) += 1;
    }

    Stats {
        total_articles: data.articles.len(),
        today_count: today.len(),
        saved_count: data.articles.iter().filter(|a| a.saved).count(),
        sources,
        last_run: data.last_run,
        run_count: data.run_count,
    }
}
