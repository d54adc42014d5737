// src/scheduler.rs
use crate::bus::EventBus;
use crate::event::EventKind;
use crate::store::{StoreError, SymbolStore};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SCRAPE_INTERVAL,
        }
    }
}

/// Publish one `scrape` event per active symbol. Returns how many went out.
pub async fn publish_scrapes(
    store: &dyn SymbolStore,
    bus: &dyn EventBus,
) -> Result<usize, StoreError> {
    let symbols = store.read_active_symbols().await?;
    for s in &symbols {
        bus.publish(EventKind::Scrape, &s.name);
    }
    counter!("scheduler_published_total").increment(symbols.len() as u64);
    Ok(symbols.len())
}

/// Spawn the periodic scrape publisher. The first tick fires immediately.
/// Stops when `stop` flips to true or its sender is dropped.
pub fn spawn_scrape_scheduler(
    cfg: SchedulerCfg,
    store: Arc<dyn SymbolStore>,
    bus: Arc<dyn EventBus>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            match publish_scrapes(store.as_ref(), bus.as_ref()).await {
                Ok(n) => {
                    gauge!("scheduler_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
                    tracing::info!(target: "scheduler", published = n, "scrape tick");
                }
                Err(e) => {
                    tracing::warn!(target: "scheduler", error = ?e, "reading active symbols failed");
                }
            }
        }
        tracing::info!(target: "scheduler", "scrape scheduler stopped");
    })
}
