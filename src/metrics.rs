// src/metrics.rs
use anyhow::Context;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_events_total", "Events handed to the pipeline, by kind.");
        describe_counter!(
            "pipeline_dropped_total",
            "Events dropped before completing, by reason."
        );
        describe_counter!("pipeline_statements_total", "Statements scored and persisted.");
        describe_counter!("pipeline_spam_total", "Statements labeled spam.");
        describe_counter!("oracle_errors_total", "Failed sentiment oracle calls.");
        describe_counter!("content_errors_total", "Failed content source fetches.");
        describe_counter!(
            "store_write_errors_total",
            "Failed persist writes, by write."
        );
        describe_histogram!("content_fetch_ms", "Content source fetch time in milliseconds.");
        describe_gauge!("supervisor_live_workers", "Running worker slots, by kind.");
        describe_counter!("supervisor_respawns_total", "Worker slots respawned after backoff.");
        describe_counter!(
            "scheduler_published_total",
            "Scrape events published by the scheduler."
        );
        describe_gauge!("scheduler_last_run_ts", "Unix ts of the last scheduler tick.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener serving
/// `/metrics`. Must run inside a tokio runtime.
pub fn install_exporter(listen: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()
        .with_context(|| format!("prometheus: install exporter on {listen}"))?;
    ensure_metrics_described();
    tracing::info!(%listen, "metrics exporter listening");
    Ok(())
}
