use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pulse::config::Config;
use pulse::server::{self, AppState};
use pulse::store::Store;
use pulse::sync::{RemoteClient, SyncHandle, SyncJob};
use pulse::{ingest, scrape, sync};

#[derive(Parser)]
#[command(name = "pulse", about = "AI news aggregation dashboard", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "pulse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the dashboard server (default).
    Serve,
    /// Scrape all sources once, merge into the store, and sync.
    Scrape,
    /// Push every stored article to the cloud mirror.
    Sync {
        /// Only test the mirror connection.
        #[arg(long)]
        check: bool,
    },
    /// Seed the local store from the cloud mirror.
    Pull,
}

fn scrape_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("Failed to build HTTP client")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    tracing::debug!(?config, "Configuration loaded");

    let store = Arc::new(
        Store::open(&config.data_dir).with_context(|| {
            format!("Failed to open store under {}", config.data_dir.display())
        })?,
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::Scrape => scrape_once(config, store).await,
        Command::Sync { check } => sync_now(config, store, check).await,
        Command::Pull => pull(config, store).await,
    }
}

async fn serve(config: Config, store: Arc<Store>) -> Result<()> {
    let config = Arc::new(config);
    let http = scrape_client()?;
    let sync_handle = SyncHandle::spawn(RemoteClient::from_config(&config));
    let remote = RemoteClient::from_config(&config).map(Arc::new);

    // First start with an empty store: populate it before serving so the
    // dashboard is not blank.
    if store.snapshot().await.articles.is_empty() {
        tracing::info!("Store is empty, running initial scrape");
        let (batches, record) = scrape::run_all(&http, &config).await;
        match ingest::merge_and_store(&store, batches, Utc::now()).await {
            Ok(summary) => {
                if let Err(e) = store.append_run(&record).await {
                    tracing::warn!(error = %e, "Failed to append run to audit log");
                }
                let snapshot = store.snapshot().await;
                sync_handle.enqueue(SyncJob::Upsert(snapshot.articles));
                sync_handle.enqueue(SyncJob::LogRun(record));
                tracing::info!(added = summary.added, "Initial scrape merged");
            }
            Err(e) => tracing::error!(error = %e, "Initial scrape failed to persist"),
        }
    }

    server::serve(AppState {
        store,
        sync: sync_handle,
        remote,
        http,
        config,
    })
    .await
}

async fn scrape_once(config: Config, store: Arc<Store>) -> Result<()> {
    let http = scrape_client()?;
    let (batches, record) = scrape::run_all(&http, &config).await;
    let summary = ingest::merge_and_store(&store, batches, Utc::now()).await?;
    store.append_run(&record).await?;

    // One-shot runs sync in the foreground; a detached worker would be
    // killed at process exit before it drained.
    if let Some(remote) = RemoteClient::from_config(&config) {
        let snapshot = store.snapshot().await;
        let report = remote.upsert_articles(&snapshot.articles).await?;
        if let Err(e) = remote.insert_run(&record).await {
            tracing::warn!(error = %e, "Failed to log run to mirror");
        }
        tracing::info!(pushed = report.pushed, failed = report.failed, "Mirror updated");
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn sync_now(config: Config, store: Arc<Store>, check: bool) -> Result<()> {
    let Some(remote) = RemoteClient::from_config(&config) else {
        bail!("SUPABASE_URL and SUPABASE_ANON_KEY must be configured");
    };

    if check {
        remote.probe().await.context("Mirror connection failed")?;
        println!("Mirror connection OK");
        return Ok(());
    }

    let report = sync::full_sync(&remote, &store).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failed > 0 {
        bail!("{} articles failed to push", report.failed);
    }
    Ok(())
}

async fn pull(config: Config, store: Arc<Store>) -> Result<()> {
    let Some(remote) = RemoteClient::from_config(&config) else {
        bail!("SUPABASE_URL and SUPABASE_ANON_KEY must be configured");
    };
    let restored = sync::pull_from_remote(&remote, &store).await?;
    println!("{restored} articles restored from mirror");
    Ok(())
}
