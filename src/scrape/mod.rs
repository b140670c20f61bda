mod community;
mod newsletter;

use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use thiserror::Error;

use crate::config::Config;
use crate::ingest::SourceBatch;
use crate::store::{RunRecord, Source};

const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Sent on every outbound request; some of these sites reject the default
/// library user agent outright.
const USER_AGENT: &str = "pulse-dashboard/0.1 (+https://github.com/dhofheinz/pulse)";

/// Errors from fetching one upstream source. Always scoped to that source:
/// a dead newsletter never fails the run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, timeout).
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 10MB size limit.
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body could not be parsed as a feed or expected payload.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// GET a URL and return the body, capped at [`MAX_BODY_SIZE`].
pub(crate) async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, FetchError> {
    let resp = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let mut body: Vec<u8> = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > MAX_BODY_SIZE {
            return Err(FetchError::ResponseTooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

pub(crate) fn within_window(ts: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    ts >= now - window
}

/// Run every source scraper and collect per-source batches plus the audit
/// record for this run.
///
/// Sources run concurrently and fail independently: an unreachable source
/// contributes an empty batch and an error entry in the record, never an
/// early return.
pub async fn run_all(client: &reqwest::Client, config: &Config) -> (Vec<SourceBatch>, RunRecord) {
    let started = std::time::Instant::now();
    let now = Utc::now();
    let window = config.window();

    tracing::info!(lookback_hours = config.lookback_hours, "Scrape starting");

    let (bensbites, therundown, reddit) = tokio::join!(
        newsletter::bensbites(client, &config.bensbites_feeds, now, window),
        newsletter::therundown(client, &config.therundown_url, now, window),
        community::reddit(
            client,
            community::REDDIT_BASE,
            &config.subreddits,
            config.min_post_score,
            now,
            window
        ),
    );

    let mut record = RunRecord {
        run_at: now,
        elapsed_seconds: 0.0,
        sources: Default::default(),
        errors: Default::default(),
        total: 0,
    };
    let mut batches = Vec::new();

    for (source, result) in [
        (Source::Bensbites, bensbites),
        (Source::Therundown, therundown),
        (Source::Reddit, reddit),
    ] {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Source unavailable this run");
                record.errors.insert(source, e.to_string());
                Vec::new()
            }
        };
        tracing::info!(source = %source, count = records.len(), "Source scraped");
        record.sources.insert(source, records.len());
        record.total += records.len();
        batches.push(SourceBatch { source, records });
    }

    record.elapsed_seconds = started.elapsed().as_secs_f64();
    tracing::info!(
        total = record.total,
        elapsed = format!("{:.1}s", record.elapsed_seconds),
        "Scrape complete"
    );

    (batches, record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_window_boundaries() {
        let now = Utc::now();
        let window = Duration::hours(24);
        assert!(within_window(now - Duration::hours(23), now, window));
        assert!(!within_window(now - Duration::hours(25), now, window));
    }

    #[tokio::test]
    async fn test_fetch_bytes_propagates_http_status() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch_bytes(&client, &server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(503)));
    }
}
