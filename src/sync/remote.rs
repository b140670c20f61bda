use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::store::{Article, RunRecord, Source};

/// Rows per upsert request. Keeps request bodies well under the PostgREST
/// payload limit.
const UPSERT_BATCH: usize = 50;

/// Bound on every remote call; an unreachable mirror must never hang a
/// sync task indefinitely.
const REMOTE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote returned status {0}")]
    Status(u16),
}

/// Result of a (possibly partial) bulk upsert.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
}

/// Client for the cloud mirror: a PostgREST-style service with an
/// `articles` table keyed by `id` and an append-only `scrape_runs` table.
///
/// Every write here is idempotent from the caller's perspective: upserts
/// resolve on `id`, deletes of an absent row succeed, and run inserts are
/// new rows by construction.
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
}

impl RemoteClient {
    /// Build a client from config, or `None` when the mirror is not
    /// configured (sync is then disabled rather than erroring).
    pub fn from_config(config: &Config) -> Option<Self> {
        let base_url = config.supabase_url.as_deref()?;
        let anon_key = config.supabase_anon_key.as_deref()?;
        match Self::for_base_url(base_url, anon_key) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "Could not build mirror HTTP client, sync disabled");
                None
            }
        }
    }

    /// Build a client against an explicit base URL.
    pub fn for_base_url(base_url: &str, anon_key: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REMOTE_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: SecretString::from(anon_key),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", self.anon_key.expose_secret())
            .bearer_auth(self.anon_key.expose_secret())
    }

    /// Cheap connectivity check against the articles table.
    pub async fn probe(&self) -> Result<(), RemoteError> {
        let resp = self
            .authed(self.http.get(self.table_url("articles")))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        ok_or_status(resp.status())
    }

    /// Upsert articles keyed on `id`, in batches. Applying the same upsert
    /// twice leaves the remote rows unchanged (`resolution=merge-duplicates`).
    ///
    /// A failed batch is counted and skipped; the remaining batches still
    /// go out, so one bad chunk cannot starve the rest of the mirror.
    pub async fn upsert_articles(&self, articles: &[Article]) -> Result<PushReport, RemoteError> {
        if articles.is_empty() {
            return Ok(PushReport::default());
        }

        let mut report = PushReport::default();
        for (batch_no, chunk) in articles.chunks(UPSERT_BATCH).enumerate() {
            let result = self
                .authed(self.http.post(self.table_url("articles")))
                .query(&[("on_conflict", "id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(chunk)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    report.pushed += chunk.len();
                }
                Ok(resp) => {
                    report.failed += chunk.len();
                    tracing::error!(
                        batch = batch_no + 1,
                        status = resp.status().as_u16(),
                        "Upsert batch rejected by remote"
                    );
                }
                Err(e) => {
                    report.failed += chunk.len();
                    tracing::error!(batch = batch_no + 1, error = %e, "Upsert batch failed");
                }
            }
        }

        tracing::info!(
            pushed = report.pushed,
            failed = report.failed,
            "Remote upsert complete"
        );
        Ok(report)
    }

    /// Hard-delete one article from the mirror. This is the only delete
    /// path the remote has; everything else only accumulates.
    pub async fn delete_article(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .authed(self.http.delete(self.table_url("articles")))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        ok_or_status(resp.status())
    }

    /// Append one scrape-run row to the remote audit table.
    pub async fn insert_run(&self, record: &RunRecord) -> Result<(), RemoteError> {
        let row = run_row(record);
        let resp = self
            .authed(self.http.post(self.table_url("scrape_runs")))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        ok_or_status(resp.status())
    }

    /// Fetch every article from the mirror, newest first. Used only by the
    /// manual pull-to-restore path.
    pub async fn fetch_articles(&self) -> Result<Vec<Article>, RemoteError> {
        let resp = self
            .authed(self.http.get(self.table_url("articles")))
            .query(&[("select", "*"), ("order", "published_at.desc")])
            .send()
            .await?;
        ok_or_status(resp.status())?;
        Ok(resp.json().await?)
    }
}

fn ok_or_status(status: reqwest::StatusCode) -> Result<(), RemoteError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RemoteError::Status(status.as_u16()))
    }
}

/// Flatten a [`RunRecord`] into the remote `scrape_runs` column layout.
fn run_row(record: &RunRecord) -> serde_json::Value {
    let count = |s: Source| record.sources.get(&s).copied().unwrap_or(0);
    serde_json::json!({
        "run_at": record.run_at,
        "elapsed_seconds": record.elapsed_seconds,
        "bensbites_count": count(Source::Bensbites),
        "therundown_count": count(Source::Therundown),
        "reddit_count": count(Source::Reddit),
        "total_new": record.total,
        "status": if record.errors.is_empty() { "ok" } else { "partial" },
    })
}
