//! Configuration file parser for pulse.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Environment variables (`PULSE_PORT`, `LOOKBACK_HOURS`, `SUPABASE_URL`,
//! `SUPABASE_ANON_KEY`) override file values so deployments can keep
//! credentials out of the config file entirely.
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. The custom Debug impl masks `supabase_anon_key` to prevent
/// secret leakage in logs and error messages.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dashboard HTTP port.
    pub port: u16,

    /// Recency window for the "today" feed, in hours.
    pub lookback_hours: i64,

    /// Directory holding the store file and the scrape-run audit log.
    pub data_dir: PathBuf,

    /// Directory of static dashboard assets served at `/`.
    pub dashboard_dir: PathBuf,

    /// Candidate RSS endpoints for Ben's Bites; the first one that yields
    /// entries wins.
    pub bensbites_feeds: Vec<String>,

    /// The Rundown homepage to scrape for article links.
    pub therundown_url: String,

    /// Subreddits polled through the public JSON listing API.
    pub subreddits: Vec<String>,

    /// Minimum community post score to include.
    pub min_post_score: i64,

    /// Cloud mirror base URL; sync is disabled when unset.
    pub supabase_url: Option<String>,

    /// Cloud mirror anon key (env var takes precedence over config file).
    /// Wrapped in `SecretString` at the client boundary, not here, so the
    /// config stays plain-serde; the Debug impl below masks it.
    pub supabase_anon_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3737,
            lookback_hours: 24,
            data_dir: PathBuf::from("data"),
            dashboard_dir: PathBuf::from("dashboard"),
            bensbites_feeds: vec![
                "https://bensbites.com/feed".to_string(),
                "https://bensbites.beehiiv.com/feed".to_string(),
            ],
            therundown_url: "https://www.therundown.ai".to_string(),
            subreddits: vec![
                "artificial".to_string(),
                "MachineLearning".to_string(),
                "ArtificialIntelligence".to_string(),
            ],
            min_post_score: 5,
            supabase_url: None,
            supabase_anon_key: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("lookback_hours", &self.lookback_hours)
            .field("data_dir", &self.data_dir)
            .field("dashboard_dir", &self.dashboard_dir)
            .field("bensbites_feeds", &self.bensbites_feeds)
            .field("therundown_url", &self.therundown_url)
            .field("subreddits", &self.subreddits)
            .field("min_post_score", &self.min_post_score)
            .field("supabase_url", &self.supabase_url)
            .field(
                "supabase_anon_key",
                &self.supabase_anon_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file, then apply env overrides.
    ///
    /// - Missing file → `Ok(Config::default())` (plus env overrides)
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading to avoid slurping a corrupted or
        // maliciously large file into memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default().with_env_overrides());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default().with_env_overrides());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config: Config = toml::from_str(&content)?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(port) = env_parse::<u16>("PULSE_PORT") {
            self.port = port;
        }
        if let Some(hours) = env_parse::<i64>("LOOKBACK_HOURS") {
            self.lookback_hours = hours;
        }
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            if !url.is_empty() {
                self.supabase_url = Some(url);
            }
        }
        if let Ok(key) = std::env::var("SUPABASE_ANON_KEY") {
            if !key.is_empty() {
                self.supabase_anon_key = Some(key);
            }
        }
        self
    }

    /// True when both remote credentials are present.
    pub fn remote_configured(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_anon_key.is_some()
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.lookback_hours)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => match v.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!(var = key, value = %v, "Ignoring unparseable env override");
                None
            }
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3737);
        assert_eq!(config.lookback_hours, 24);
        assert_eq!(config.subreddits.len(), 3);
        assert!(!config.remote_configured());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str("lookback_hours = 48").unwrap();
        assert_eq!(config.lookback_hours, 48);
        assert_eq!(config.port, 3737);
    }

    #[test]
    fn test_debug_masks_anon_key() {
        let mut config = Config::default();
        config.supabase_anon_key = Some("super-secret".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_remote_configured_requires_both() {
        let mut config = Config::default();
        config.supabase_url = Some("https://proj.supabase.co".into());
        assert!(!config.remote_configured());
        config.supabase_anon_key = Some("key".to_string());
        assert!(config.remote_configured());
    }
}
