// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "WATCHDOG_CONFIG_PATH";

/// Offline training corpora: one document per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusPaths {
    pub spam: PathBuf,
    pub ham: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Redis bus when set, in-process bus otherwise.
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    pub oracle_url: String,
    pub content_source_url: String,
    pub http_timeout_secs: u64,
    pub fetch_limit: usize,
    pub workers_per_kind: usize,
    pub respawn_backoff_secs: u64,
    pub scrape_interval_secs: u64,
    pub oracle_concurrency: usize,
    pub spam_model_path: PathBuf,
    /// Train at startup (and save to `spam_model_path`) when the model file is missing.
    pub spam_corpus: Option<CorpusPaths>,
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://watchdog.db".into(),
            db_max_connections: 5,
            redis_url: None,
            redis_prefix: "watchdog".into(),
            oracle_url: "http://127.0.0.1:8000".into(),
            content_source_url: "http://127.0.0.1:8001".into(),
            http_timeout_secs: 10,
            fetch_limit: crate::content::DEFAULT_FETCH_LIMIT,
            workers_per_kind: crate::supervisor::DEFAULT_WORKERS_PER_KIND,
            respawn_backoff_secs: crate::supervisor::DEFAULT_RESPAWN_BACKOFF.as_secs(),
            scrape_interval_secs: crate::scheduler::DEFAULT_SCRAPE_INTERVAL.as_secs(),
            oracle_concurrency: crate::pipeline::DEFAULT_ORACLE_CONCURRENCY,
            spam_model_path: PathBuf::from("models/spam.json"),
            spam_corpus: None,
            metrics_listen: None,
        }
    }
}

impl AppConfig {
    /// Load using env var + fallbacks, then apply environment overrides:
    /// 1) $WATCHDOG_CONFIG_PATH
    /// 2) config/watchdog.toml
    /// 3) config/watchdog.json
    /// 4) built-in defaults
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file_default()?;
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(cfg.sanitized())
    }

    pub fn load_file_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/watchdog.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/watchdog.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, &ext).with_context(|| format!("parsing {}", path.display()))
    }

    /// Overlay values from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = get("REDIS_URL") {
            self.redis_url = Some(v);
        }
        if let Some(v) = get("ORACLE_URL") {
            self.oracle_url = v;
        }
        if let Some(v) = get("CONTENT_SOURCE_URL") {
            self.content_source_url = v;
        }
        if let Some(v) = get("WORKERS_PER_KIND") {
            self.workers_per_kind = parse_var("WORKERS_PER_KIND", &v)?;
        }
        if let Some(v) = get("RESPAWN_BACKOFF_SECS") {
            self.respawn_backoff_secs = parse_var("RESPAWN_BACKOFF_SECS", &v)?;
        }
        if let Some(v) = get("SCRAPE_INTERVAL_SECS") {
            self.scrape_interval_secs = parse_var("SCRAPE_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("SPAM_MODEL_PATH") {
            self.spam_model_path = PathBuf::from(v);
        }
        if let Some(v) = get("METRICS_LISTEN") {
            self.metrics_listen = Some(parse_var("METRICS_LISTEN", &v)?);
        }
        Ok(())
    }

    /// Clamp values that would stall or disable the service.
    pub fn sanitized(mut self) -> Self {
        self.workers_per_kind = self.workers_per_kind.max(1);
        self.respawn_backoff_secs = self.respawn_backoff_secs.max(1);
        self.scrape_interval_secs = self.scrape_interval_secs.max(1);
        self.oracle_concurrency = self.oracle_concurrency.max(1);
        self.db_max_connections = self.db_max_connections.max(1);
        self.fetch_limit = self.fetch_limit.max(1);
        self.http_timeout_secs = self.http_timeout_secs.max(1);
        self.redis_prefix = self.redis_prefix.trim().to_string();
        if self.redis_prefix.is_empty() {
            self.redis_prefix = "watchdog".into();
        }
        self
    }

    pub fn respawn_backoff(&self) -> Duration {
        Duration::from_secs(self.respawn_backoff_secs)
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| anyhow!("{key}={raw:?} is invalid: {e}"))
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    match toml::from_str(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported config format: {toml_err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = parse_config(
            "workers_per_kind = 4\nredis_url = \"redis://localhost\"\n",
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.workers_per_kind, 4);
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://localhost"));
        assert_eq!(cfg.respawn_backoff_secs, 300);
    }

    #[test]
    fn json_is_accepted_without_hint() {
        let cfg = parse_config(r#"{"scrape_interval_secs": 60}"#, "").unwrap();
        assert_eq!(cfg.scrape_interval_secs, 60);
    }

    #[test]
    fn overrides_win_and_bad_numbers_fail() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("WORKERS_PER_KIND", " 2 "),
            ("ORACLE_URL", "   "),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.workers_per_kind, 2);
        assert_eq!(cfg.oracle_url, AppConfig::default().oracle_url);

        let err = cfg.apply_overrides(|k| (k == "RESPAWN_BACKOFF_SECS").then(|| "soon".to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn sanitize_clamps_zeroes() {
        let cfg = AppConfig {
            workers_per_kind: 0,
            respawn_backoff_secs: 0,
            oracle_concurrency: 0,
            redis_prefix: "  ".into(),
            ..AppConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.workers_per_kind, 1);
        assert_eq!(cfg.respawn_backoff(), Duration::from_secs(1));
        assert_eq!(cfg.oracle_concurrency, 1);
        assert_eq!(cfg.redis_prefix, "watchdog");
    }
}
