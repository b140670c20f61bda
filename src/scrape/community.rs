//! Reddit via the public JSON listing API (no credentials required).

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

use super::{fetch_bytes, within_window, FetchError};
use crate::ingest::RawRecord;

/// Posts requested per subreddit listing.
const LISTING_LIMIT: usize = 25;

/// Production listing host; tests point this at a mock server.
pub(crate) const REDDIT_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Post,
}

/// The subset of a Reddit post we care about. Everything is defaulted; the
/// listing payload is large and loosely specified.
#[derive(Debug, Default, Deserialize)]
struct Post {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    thumbnail: Option<String>,
}

/// Poll each subreddit's `new` listing; posts below the score floor or
/// outside the window are skipped.
///
/// Subreddits fail independently. The source is reported unavailable only
/// when every subreddit fails.
pub async fn reddit(
    client: &reqwest::Client,
    base_url: &str,
    subreddits: &[String],
    min_score: i64,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Vec<RawRecord>, FetchError> {
    let mut records = Vec::new();
    let mut failures = 0usize;
    let mut last_err: Option<FetchError> = None;

    for subreddit in subreddits {
        let url = format!("{base_url}/r/{subreddit}/new.json?limit={LISTING_LIMIT}");
        let listing: Listing = match fetch_bytes(client, &url).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!(subreddit = %subreddit, error = %e, "Listing unparseable");
                    failures += 1;
                    last_err = Some(FetchError::Parse(e.to_string()));
                    continue;
                }
            },
            Err(e) => {
                tracing::warn!(subreddit = %subreddit, error = %e, "Listing fetch failed");
                failures += 1;
                last_err = Some(e);
                continue;
            }
        };

        let before = records.len();
        for child in listing.data.children {
            let post = child.data;
            let created_at = Utc.timestamp_opt(post.created_utc as i64, 0).single();
            if let Some(ts) = created_at {
                if !within_window(ts, now, window) {
                    continue;
                }
            }
            if post.score < min_score {
                continue;
            }

            records.push(RawRecord::CommunityPost {
                subreddit: subreddit.clone(),
                title: post.title,
                permalink: post.permalink,
                selftext: post.selftext,
                link_url: post.url,
                author: post.author,
                created_at,
                thumbnail: post.thumbnail,
            });
        }
        tracing::debug!(subreddit = %subreddit, count = records.len() - before, "Listing scraped");
    }

    if failures == subreddits.len() {
        if let Some(e) = last_err {
            return Err(e);
        }
    }
    Ok(records)
}
