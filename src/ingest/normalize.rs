use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::store::{Article, Source};
use crate::util::{validate_url, UrlValidationError};

/// Summary length caps, matching what the dashboard renders.
const MAX_SUMMARY_LEN: usize = 500;
const MAX_SELFTEXT_LEN: usize = 400;

/// A record-scoped normalization failure. The record is skipped and logged;
/// the run continues.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Record has no URL")]
    MissingUrl,
    #[error("Record URL rejected: {0}")]
    BadUrl(#[from] UrlValidationError),
}

/// Raw per-source record shapes, before normalization.
///
/// Each source hands over its own field layout; the adapters in
/// [`normalize`] are the only place that knows how to read them.
#[derive(Debug, Clone)]
pub enum RawRecord {
    /// An RSS/Atom entry from a newsletter feed.
    FeedEntry {
        source: Source,
        title: Option<String>,
        url: Option<String>,
        summary: Option<String>,
        author: Option<String>,
        published_at: Option<DateTime<Utc>>,
    },
    /// An article card scraped from a newsletter homepage, enriched with
    /// OpenGraph metadata from the article page.
    PageLink {
        source: Source,
        title: String,
        url: String,
        description: Option<String>,
        image_url: Option<String>,
        published_at: Option<DateTime<Utc>>,
    },
    /// A post from a community-site listing API.
    CommunityPost {
        subreddit: String,
        title: Option<String>,
        permalink: Option<String>,
        selftext: String,
        link_url: String,
        author: Option<String>,
        created_at: Option<DateTime<Utc>>,
        thumbnail: Option<String>,
    },
}

/// Hex SHA-256 of the canonical URL: the article's stable identity.
/// Two records with the same URL always hash to the same id, regardless of
/// scrape time or metadata noise.
pub fn fingerprint(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    format!("{:x}", hash)
}

/// Turn a raw record into a canonical [`Article`].
///
/// Pure function of its inputs: the caller injects `now`, which stands in
/// for both `scraped_at` and any missing `published_at` (callers must treat
/// a defaulted publish time as approximate). A missing or malformed URL
/// fails this record only.
pub fn normalize(raw: &RawRecord, now: DateTime<Utc>) -> Result<Article, ValidationError> {
    match raw {
        RawRecord::FeedEntry {
            source,
            title,
            url,
            summary,
            author,
            published_at,
        } => {
            let url = url.as_deref().ok_or(ValidationError::MissingUrl)?;
            let url = validate_url(url)?;
            Ok(Article {
                id: fingerprint(url.as_str()),
                source: *source,
                title: title.clone().unwrap_or_else(|| "Untitled".to_string()),
                summary: truncate(summary.as_deref().unwrap_or_default(), MAX_SUMMARY_LEN),
                url: url.into(),
                published_at: published_at.unwrap_or(now),
                scraped_at: now,
                author: none_if_blank(author.as_deref()),
                tags: vec!["AI".to_string(), "Newsletter".to_string()],
                image_url: None,
                saved: false,
                saved_at: None,
            })
        }
        RawRecord::PageLink {
            source,
            title,
            url,
            description,
            image_url,
            published_at,
        } => {
            let url = validate_url(url)?;
            Ok(Article {
                id: fingerprint(url.as_str()),
                source: *source,
                title: title.clone(),
                summary: truncate(
                    description.as_deref().unwrap_or("Daily AI briefing."),
                    MAX_SUMMARY_LEN,
                ),
                url: url.into(),
                published_at: published_at.unwrap_or(now),
                scraped_at: now,
                author: None,
                tags: vec![
                    "AI".to_string(),
                    "Newsletter".to_string(),
                    "Daily Briefing".to_string(),
                ],
                image_url: image_url.clone(),
                saved: false,
                saved_at: None,
            })
        }
        RawRecord::CommunityPost {
            subreddit,
            title,
            permalink,
            selftext,
            link_url,
            author,
            created_at,
            thumbnail,
        } => {
            let permalink = permalink.as_deref().ok_or(ValidationError::MissingUrl)?;
            let full_url = if permalink.starts_with("http") {
                permalink.to_string()
            } else {
                format!("https://www.reddit.com{permalink}")
            };
            let url = validate_url(&full_url)?;

            let summary = if selftext.is_empty() {
                format!("[Link Post] {link_url}")
            } else {
                truncate(selftext, MAX_SELFTEXT_LEN)
            };
            // Reddit uses sentinel strings ("self", "default") where no
            // thumbnail exists.
            let image_url = thumbnail
                .as_deref()
                .filter(|t| t.starts_with("http"))
                .map(str::to_string);

            Ok(Article {
                id: fingerprint(url.as_str()),
                source: Source::Reddit,
                title: title.clone().unwrap_or_else(|| "Untitled".to_string()),
                summary,
                url: url.into(),
                published_at: created_at.unwrap_or(now),
                scraped_at: now,
                author: none_if_blank(author.as_deref()),
                tags: vec![
                    "Reddit".to_string(),
                    format!("r/{subreddit}"),
                    "AI".to_string(),
                ],
                image_url,
                saved: false,
                saved_at: None,
            })
        }
    }
}

/// Truncate on a char boundary; byte-slicing a UTF-8 summary would panic.
fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// An absent author must stay absent, never become an empty string that
/// reads as "known author with no name".
fn none_if_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed_entry(url: Option<&str>) -> RawRecord {
        RawRecord::FeedEntry {
            source: Source::Bensbites,
            title: Some("Daily digest".into()),
            url: url.map(str::to_string),
            summary: Some("What happened in AI today".into()),
            author: Some("Ben Tossell".into()),
            published_at: None,
        }
    }

    #[test]
    fn test_identity_is_stable_across_metadata_noise() {
        let now = Utc::now();
        let later = now + chrono::Duration::hours(6);

        let a = normalize(&feed_entry(Some("https://example.com/p/one")), now).unwrap();
        let mut other = feed_entry(Some("https://example.com/p/one"));
        if let RawRecord::FeedEntry { title, .. } = &mut other {
            *title = Some("Completely different title".into());
        }
        let b = normalize(&other, later).unwrap();

        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_distinct_urls_distinct_ids() {
        let now = Utc::now();
        let a = normalize(&feed_entry(Some("https://example.com/p/one")), now).unwrap();
        let b = normalize(&feed_entry(Some("https://example.com/p/two")), now).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_missing_url_is_validation_error() {
        let err = normalize(&feed_entry(None), Utc::now()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingUrl));
    }

    #[test]
    fn test_malformed_url_is_validation_error() {
        let err = normalize(&feed_entry(Some("::::")), Utc::now()).unwrap_err();
        assert!(matches!(err, ValidationError::BadUrl(_)));
    }

    #[test]
    fn test_missing_published_defaults_to_now() {
        let now = Utc::now();
        let article = normalize(&feed_entry(Some("https://example.com/p/x")), now).unwrap();
        assert_eq!(article.published_at, now);
        assert_eq!(article.scraped_at, now);
    }

    #[test]
    fn test_blank_author_becomes_none() {
        let mut raw = feed_entry(Some("https://example.com/p/x"));
        if let RawRecord::FeedEntry { author, .. } = &mut raw {
            *author = Some("   ".into());
        }
        let article = normalize(&raw, Utc::now()).unwrap();
        assert_eq!(article.author, None);
    }

    #[test]
    fn test_community_post_permalink_expansion() {
        let raw = RawRecord::CommunityPost {
            subreddit: "artificial".into(),
            title: Some("New model drops".into()),
            permalink: Some("/r/artificial/comments/abc/new_model".into()),
            selftext: String::new(),
            link_url: "https://example.com/blog".into(),
            author: Some("someone".into()),
            created_at: None,
            thumbnail: Some("default".into()),
        };
        let article = normalize(&raw, Utc::now()).unwrap();
        assert_eq!(
            article.url,
            "https://www.reddit.com/r/artificial/comments/abc/new_model"
        );
        assert_eq!(article.summary, "[Link Post] https://example.com/blog");
        assert_eq!(article.image_url, None);
        assert!(article.tags.contains(&"r/artificial".to_string()));
    }

    #[test]
    fn test_fingerprint_matches_known_sha256() {
        // sha256("https://example.com/") — pins the hash choice so stored
        // ids stay valid across refactors.
        assert_eq!(
            fingerprint("https://example.com/"),
            "0f115db062b7c0dd030b16878c99dea5c354b49dc37b38eb8846179c7783e9d7"
        );
    }
}
