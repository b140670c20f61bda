use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Store-level errors with operator-friendly messages.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem problem while reading or writing the store file.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The in-memory store could not be serialized for persistence.
    #[error("Store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Save/unsave referenced an id that is not in the store.
    #[error("Article not found: {0}")]
    NotFound(String),
}

// ============================================================================
// Sources
// ============================================================================

/// The closed set of article origins.
///
/// Declaration order doubles as the cross-source dedup precedence: when two
/// sources surface the same URL in one merge, the article from the earlier
/// variant wins. Keep the order here in sync with [`Source::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Bensbites,
    Therundown,
    Reddit,
}

impl Source {
    /// All sources in precedence order.
    pub const ALL: [Source; 3] = [Source::Bensbites, Source::Therundown, Source::Reddit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Bensbites => "bensbites",
            Source::Therundown => "therundown",
            Source::Reddit => "reddit",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Articles
// ============================================================================

/// Canonical article, keyed by a SHA-256 fingerprint of its URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Hex SHA-256 of the canonical URL. Stable across runs and machines.
    pub id: String,
    pub source: Source,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Store Aggregate
// ============================================================================

/// The persisted store aggregate: every known article plus run bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub articles: Vec<Article>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_count: u64,
}

impl StoreData {
    pub fn contains(&self, id: &str) -> bool {
        self.articles.iter().any(|a| a.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    /// Structural validity: no two articles may share an id.
    pub fn is_structurally_valid(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.articles.len());
        self.articles.iter().all(|a| seen.insert(a.id.as_str()))
    }
}

// ============================================================================
// Scrape Run Audit
// ============================================================================

/// Append-only audit record for one ingestion cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    /// Articles produced per source in this run.
    pub sources: BTreeMap<Source, usize>,
    /// Per-source failure descriptions; an unlisted source succeeded.
    #[serde(default)]
    pub errors: BTreeMap<Source, String>,
    pub total: usize,
}
