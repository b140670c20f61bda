use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::types::{Article, RunRecord, StoreData, StoreError};

const STORE_FILE: &str = "articles_store.json";
const CORRUPT_FILE: &str = "articles_store.json.corrupt";
const RUNS_FILE: &str = "scrape_runs.jsonl";

/// Outcome of applying a batch of candidates against the store.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// Candidates whose id was not yet present and were inserted.
    pub added: usize,
    /// Candidates skipped because their id already existed.
    pub duplicates: usize,
    pub total_articles: usize,
    pub run_count: u64,
    pub last_run: DateTime<Utc>,
}

/// Durable article store: one JSON file, one writer at a time.
///
/// All mutators hold the write lock across the full load→mutate→persist
/// cycle, and commit to memory only after the snapshot hit disk. A failed
/// persist therefore leaves both the file and the in-memory state on the
/// previous complete snapshot.
pub struct Store {
    path: PathBuf,
    runs_path: PathBuf,
    state: RwLock<StoreData>,
}

impl Store {
    /// Open the store under `data_dir`, creating the directory if needed.
    ///
    /// A missing store file yields an empty store. A file that fails
    /// structural validation is moved aside to `articles_store.json.corrupt`
    /// and an empty store is used; the condition is logged as a warning, not
    /// an error, so a corrupted file never takes the dashboard down.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;

        let path = data_dir.join(STORE_FILE);
        let corrupt_path = data_dir.join(CORRUPT_FILE);
        let runs_path = data_dir.join(RUNS_FILE);

        let data = Self::load_or_recover(&path, &corrupt_path)?;

        Ok(Self {
            path,
            runs_path,
            state: RwLock::new(data),
        })
    }

    fn load_or_recover(path: &Path, corrupt_path: &Path) -> Result<StoreData, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No existing store, starting fresh");
                return Ok(StoreData::default());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        match serde_json::from_str::<StoreData>(&content) {
            Ok(data) if data.is_structurally_valid() => {
                tracing::info!(articles = data.articles.len(), "Loaded existing store");
                Ok(data)
            }
            Ok(_) => {
                tracing::warn!(
                    path = %path.display(),
                    backup = %corrupt_path.display(),
                    "Store file contains duplicate article ids, moving aside and starting fresh"
                );
                std::fs::rename(path, corrupt_path)?;
                Ok(StoreData::default())
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    backup = %corrupt_path.display(),
                    error = %e,
                    "Store file corrupted, moving aside and starting fresh"
                );
                std::fs::rename(path, corrupt_path)?;
                Ok(StoreData::default())
            }
        }
    }

    /// Clone of the current store contents. Reads never observe a partially
    /// applied mutation.
    pub async fn snapshot(&self) -> StoreData {
        self.state.read().await.clone()
    }

    /// Insert candidates whose id is not yet present and advance the run
    /// counters. Existing articles are left untouched, so a re-scrape of a
    /// saved URL never resets its saved state.
    ///
    /// Counters advance even when nothing new was added (an empty merge is
    /// still a run), but never when the persist fails.
    pub async fn upsert_new(
        &self,
        candidates: Vec<Article>,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();

        let mut added = 0usize;
        let mut duplicates = 0usize;
        for article in candidates {
            if next.contains(&article.id) {
                duplicates += 1;
            } else {
                next.articles.push(article);
                added += 1;
            }
        }

        next.last_run = Some(now);
        next.run_count += 1;

        self.persist(&next)?;
        let outcome = UpsertOutcome {
            added,
            duplicates,
            total_articles: next.articles.len(),
            run_count: next.run_count,
            last_run: now,
        };
        *state = next;

        tracing::info!(
            added = outcome.added,
            duplicates = outcome.duplicates,
            total = outcome.total_articles,
            run = outcome.run_count,
            "Store merge persisted"
        );
        Ok(outcome)
    }

    /// Mark an article saved. Returns the updated article.
    pub async fn mark_saved(
        &self,
        id: &str,
        saved_at: DateTime<Utc>,
    ) -> Result<Article, StoreError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();

        let article = next
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        article.saved = true;
        article.saved_at = Some(saved_at);
        let saved = article.clone();

        self.persist(&next)?;
        *state = next;

        tracing::info!(id = %short_id(id), "Article saved");
        Ok(saved)
    }

    /// Remove an article outright. Unsaving is destructive: the entry is
    /// deleted, not flagged.
    pub async fn remove(&self, id: &str) -> Result<Article, StoreError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();

        let pos = next
            .articles
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let removed = next.articles.remove(pos);

        self.persist(&next)?;
        *state = next;

        tracing::info!(id = %short_id(id), "Article hard-deleted locally");
        Ok(removed)
    }

    /// Seed articles pulled from the remote replica: insert only ids absent
    /// locally. Local state always wins on conflict, and a pull never
    /// advances the run counters (it is a restore, not a merge).
    pub async fn seed_missing(&self, articles: Vec<Article>) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();

        let mut restored = 0usize;
        for article in articles {
            if !next.contains(&article.id) {
                next.articles.push(article);
                restored += 1;
            }
        }

        if restored > 0 {
            self.persist(&next)?;
            *state = next;
        }

        tracing::info!(restored, "Seeded store from remote replica");
        Ok(restored)
    }

    /// Append a scrape-run record to the local audit log (one JSON object
    /// per line, append-only, never rewritten).
    pub async fn append_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.runs_path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Atomically persist a full snapshot using write-to-temp-then-rename.
    ///
    /// The temp file gets a randomized suffix and is created with
    /// `create_new`, then synced before the rename, so a crash at any point
    /// leaves either the previous or the new complete snapshot on disk.
    fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        use std::time::{SystemTime, UNIX_EPOCH};
        let random_suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = self.path.with_extension(format!("tmp.{:016x}", random_suffix));

        let content = serde_json::to_vec_pretty(data)?;

        let result = (|| -> Result<(), StoreError> {
            let mut temp_file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            temp_file.write_all(&content)?;
            temp_file.sync_all()?;
            drop(temp_file);

            #[cfg(windows)]
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }

            std::fs::rename(&temp_path, &self.path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }
}

/// First 12 hex chars of an id, for log lines.
fn short_id(id: &str) -> &str {
    &id[..id.len().min(12)]
}
