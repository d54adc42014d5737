//! ticker-watchdog service entrypoint.
//! Wires config, tracing, metrics, the spam model, store, bus, consumer
//! supervisor and scrape scheduler, then runs until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use ticker_watchdog::bus::{EventBus, MemoryBus, RedisBus};
use ticker_watchdog::content::HttpContentSource;
use ticker_watchdog::oracle::HttpOracle;
use ticker_watchdog::scheduler::{spawn_scrape_scheduler, SchedulerCfg};
use ticker_watchdog::{
    AppConfig, Pipeline, SpamDetector, SqliteStore, Supervisor, SupervisorConfig, SymbolStore,
};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ticker_watchdog=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// Load the serialized model, or train it from the configured corpora and
/// save it. Training failure is fatal.
fn load_detector(cfg: &AppConfig) -> Result<SpamDetector> {
    if cfg.spam_model_path.exists() {
        return SpamDetector::load(&cfg.spam_model_path);
    }
    let corpus = cfg.spam_corpus.as_ref().with_context(|| {
        format!(
            "spam model {} is missing and no spam_corpus is configured",
            cfg.spam_model_path.display()
        )
    })?;
    let detector = SpamDetector::train_from_files(&corpus.spam, &corpus.ham)?;
    detector
        .classifier()
        .save(&cfg.spam_model_path)
        .with_context(|| format!("saving spam model {}", cfg.spam_model_path.display()))?;
    tracing::info!(path = %cfg.spam_model_path.display(), "spam model trained and saved");
    Ok(detector)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load().context("loading configuration")?;
    if let Some(addr) = cfg.metrics_listen {
        ticker_watchdog::metrics::install_exporter(addr)?;
    }

    let detector = Arc::new(load_detector(&cfg)?);

    let store: Arc<dyn SymbolStore> = Arc::new(
        SqliteStore::connect(&cfg.database_url, cfg.db_max_connections)
            .await
            .with_context(|| format!("opening database {}", cfg.database_url))?,
    );

    let bus: Arc<dyn EventBus> = match &cfg.redis_url {
        Some(url) => Arc::new(RedisBus::connect(url, cfg.redis_prefix.clone()).await?),
        None => {
            tracing::warn!("REDIS_URL not set; using in-process bus");
            Arc::new(MemoryBus::new())
        }
    };

    let content = Arc::new(
        HttpContentSource::new(&cfg.content_source_url, cfg.http_timeout())?
            .with_limit(cfg.fetch_limit),
    );
    let oracle = Arc::new(HttpOracle::new(&cfg.oracle_url, cfg.http_timeout())?);

    let pipeline = Arc::new(
        Pipeline::new(store.clone(), content, oracle, detector)
            .with_oracle_concurrency(cfg.oracle_concurrency),
    );

    let supervisor = Supervisor::new(
        bus.clone(),
        pipeline,
        SupervisorConfig {
            workers_per_kind: cfg.workers_per_kind,
            backoff: cfg.respawn_backoff(),
            ..SupervisorConfig::default()
        },
    )
    .start();

    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler = spawn_scrape_scheduler(
        SchedulerCfg {
            interval: cfg.scrape_interval(),
        },
        store,
        bus,
        stop_rx,
    );

    tracing::info!(
        workers_per_kind = cfg.workers_per_kind,
        scrape_interval_secs = cfg.scrape_interval_secs,
        "ticker-watchdog running"
    );

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested");

    let _ = stop_tx.send(true);
    if let Err(e) = scheduler.await {
        tracing::warn!(error = ?e, "scheduler task ended abnormally");
    }
    supervisor.shutdown().await;
    Ok(())
}
