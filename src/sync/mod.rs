mod remote;

use tokio::sync::mpsc;

use crate::store::{Article, RunRecord, Store};

pub use remote::{PushReport, RemoteClient, RemoteError};

/// One unit of background reconciliation work.
#[derive(Debug)]
pub enum SyncJob {
    /// Idempotent upsert of articles (a single save, or a full post-merge
    /// snapshot).
    Upsert(Vec<Article>),
    /// Hard delete of one article, issued when it is unsaved locally.
    Delete(String),
    /// Append a scrape-run record to the remote audit table.
    LogRun(RunRecord),
}

/// Handle for enqueueing sync jobs from mutation paths.
///
/// Mutation handlers enqueue and return immediately; a single detached
/// worker drains the queue and performs all network calls, so remote
/// latency can never stall a local writer. When no mirror is configured the
/// handle is disabled and jobs are dropped with a debug log.
///
/// Failure policy: a failed job is logged and discarded. Local state is
/// already durable by the time a job runs, and the next mutation enqueues a
/// fresh job covering the same state, so at-least-once delivery plus
/// idempotent upserts make an in-worker retry loop unnecessary.
#[derive(Clone)]
pub struct SyncHandle {
    tx: Option<mpsc::UnboundedSender<SyncJob>>,
}

impl SyncHandle {
    /// Spawn the background worker, or return a disabled handle when the
    /// mirror is unconfigured.
    pub fn spawn(client: Option<RemoteClient>) -> Self {
        let Some(client) = client else {
            tracing::info!("Cloud mirror not configured, background sync disabled");
            return Self { tx: None };
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<SyncJob>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                run_job(&client, job).await;
            }
            tracing::debug!("Sync worker shutting down, queue closed");
        });

        Self { tx: Some(tx) }
    }

    /// Disabled handle for callers that never sync (tests, one-shot CLI
    /// runs without credentials).
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Fire-and-forget: never blocks, never fails the caller.
    pub fn enqueue(&self, job: SyncJob) {
        match &self.tx {
            Some(tx) => {
                if tx.send(job).is_err() {
                    tracing::warn!("Sync worker gone, dropping job");
                }
            }
            None => tracing::debug!("Sync disabled, dropping job"),
        }
    }
}

async fn run_job(client: &RemoteClient, job: SyncJob) {
    match job {
        SyncJob::Upsert(articles) => {
            let count = articles.len();
            if let Err(e) = client.upsert_articles(&articles).await {
                tracing::warn!(count, error = %e, "Background upsert failed");
            }
        }
        SyncJob::Delete(id) => {
            if let Err(e) = client.delete_article(&id).await {
                tracing::warn!(id = %id, error = %e, "Background delete failed");
            }
        }
        SyncJob::LogRun(record) => {
            if let Err(e) = client.insert_run(&record).await {
                tracing::warn!(error = %e, "Background run log failed");
            }
        }
    }
}

/// Manual full resync: push every stored article to the mirror. Used to
/// recover after remote data loss; safe to repeat because upserts resolve
/// on `id`.
pub async fn full_sync(client: &RemoteClient, store: &Store) -> Result<PushReport, RemoteError> {
    let snapshot = store.snapshot().await;
    client.upsert_articles(&snapshot.articles).await
}

/// Manual reverse pull: seed the local store from the mirror.
///
/// The remote is a non-authoritative seed: only ids absent locally are
/// inserted, nothing local is overwritten or deleted, and going forward the
/// local store wins.
pub async fn pull_from_remote(client: &RemoteClient, store: &Store) -> anyhow::Result<usize> {
    let remote_articles = client.fetch_articles().await?;
    tracing::info!(count = remote_articles.len(), "Pulled articles from mirror");
    let restored = store.seed_missing(remote_articles).await?;
    Ok(restored)
}
