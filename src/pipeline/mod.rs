// src/pipeline/mod.rs
//! Per-event processing: resolve → watermark → fetch → spam tag → score →
//! aggregate → persist.
//!
//! `handle` returns a typed result so callers (and tests) can inspect the
//! outcome; `process` is the worker entry point that logs and counts it.

pub mod locks;

use crate::classify::SpamDetector;
use crate::content::{self, ContentSource};
use crate::event::{Event, EventKind};
use crate::oracle::SentimentOracle;
use crate::store::{StoreError, SymbolStore};
use crate::types::{Statement, Symbol};
use futures_util::{stream, StreamExt};
use metrics::counter;
use std::sync::Arc;
use thiserror::Error;

use locks::SymbolLocks;

pub const DEFAULT_ORACLE_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid payload {payload:?}: {reason}")]
    Validation { payload: String, reason: String },
    #[error("symbol {name} is already active (id {id})")]
    AlreadyActive { id: i64, name: String },
    #[error("symbol not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl PipelineError {
    /// Label for `pipeline_dropped_total{reason}`.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::Validation { .. } => "validation",
            PipelineError::AlreadyActive { .. } => "already_active",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::Store(_) => "store",
        }
    }

    /// Expected business-state outcomes, logged at info rather than warn.
    pub fn is_business_state(&self) -> bool {
        matches!(
            self,
            PipelineError::AlreadyActive { .. } | PipelineError::NotFound(_)
        )
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => PipelineError::NotFound(what),
            other => PipelineError::Store(other),
        }
    }
}

/// Which of the three independent persist writes a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistWrite {
    SentimentSample,
    LastScrapeTime,
    StatementBatch,
}

impl PersistWrite {
    pub fn as_str(self) -> &'static str {
        match self {
            PersistWrite::SentimentSample => "sentiment_sample",
            PersistWrite::LastScrapeTime => "last_scrape_time",
            PersistWrite::StatementBatch => "statement_batch",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeReport {
    pub fetched: usize,
    pub spam: usize,
    pub oracle_failures: usize,
    pub hourly_sentiment: f64,
    pub scrape_time: i64,
    pub failed_writes: Vec<PersistWrite>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub kind: EventKind,
    pub symbol_id: i64,
    pub symbol: String,
    /// `None` for delete events, which stop after deactivation.
    pub scrape: Option<ScrapeReport>,
}

/// Mean polarity over every statement, spam included. Empty input gives 0.
pub fn aggregate(statements: &[Statement]) -> f64 {
    if statements.is_empty() {
        return 0.0;
    }
    statements.iter().map(|s| s.polarity).sum::<f64>() / statements.len() as f64
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct Pipeline {
    store: Arc<dyn SymbolStore>,
    content: Arc<dyn ContentSource>,
    oracle: Arc<dyn SentimentOracle>,
    detector: Arc<SpamDetector>,
    locks: SymbolLocks,
    oracle_concurrency: usize,
    clock: fn() -> i64,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn SymbolStore>,
        content: Arc<dyn ContentSource>,
        oracle: Arc<dyn SentimentOracle>,
        detector: Arc<SpamDetector>,
    ) -> Self {
        crate::metrics::ensure_metrics_described();
        Self {
            store,
            content,
            oracle,
            detector,
            locks: SymbolLocks::new(),
            oracle_concurrency: DEFAULT_ORACLE_CONCURRENCY,
            clock: unix_now,
        }
    }

    pub fn with_oracle_concurrency(mut self, n: usize) -> Self {
        self.oracle_concurrency = n.max(1);
        self
    }

    /// Override the wall clock (unix seconds) used for scrape times.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Run one event to completion, logging and counting the outcome.
    pub async fn process(&self, event: Event) {
        counter!("pipeline_events_total", "kind" => event.kind.topic()).increment(1);
        match self.handle(&event).await {
            Ok(report) => {
                if let Some(s) = &report.scrape {
                    tracing::info!(
                        target: "pipeline",
                        kind = %report.kind,
                        symbol = %report.symbol,
                        id = report.symbol_id,
                        fetched = s.fetched,
                        spam = s.spam,
                        hourly_sentiment = s.hourly_sentiment,
                        failed_writes = s.failed_writes.len(),
                        "scrape completed"
                    );
                } else {
                    tracing::info!(target: "pipeline", id = report.symbol_id, symbol = %report.symbol, "symbol deactivated");
                }
            }
            Err(e) => {
                counter!("pipeline_dropped_total", "reason" => e.reason()).increment(1);
                if e.is_business_state() {
                    tracing::info!(target: "pipeline", kind = %event.kind, payload = %event.payload, error = %e, "event dropped");
                } else {
                    tracing::warn!(target: "pipeline", kind = %event.kind, payload = %event.payload, error = ?e, "event dropped");
                }
            }
        }
    }

    pub async fn handle(&self, event: &Event) -> Result<RunReport, PipelineError> {
        match event.kind {
            EventKind::Delete => self.deactivate(&event.payload).await,
            EventKind::Add => {
                let name = validated_name(&event.payload)?;
                let _guard = self.locks.lock(name).await;
                let id = match self.store.add_symbol(name).await {
                    Ok(id) => id,
                    Err(StoreError::AlreadyActive { id }) => {
                        return Err(PipelineError::AlreadyActive {
                            id,
                            name: name.to_string(),
                        })
                    }
                    Err(e) => return Err(e.into()),
                };
                let symbol = self.store.read_symbol_by_id(id).await?;
                self.scrape(EventKind::Add, symbol).await
            }
            EventKind::Scrape => {
                let name = validated_name(&event.payload)?;
                let _guard = self.locks.lock(name).await;
                let symbol = self.store.read_symbol_by_name(name).await?;
                if !symbol.active {
                    return Err(PipelineError::NotFound(format!("{name} (inactive)")));
                }
                self.scrape(EventKind::Scrape, symbol).await
            }
        }
    }

    async fn deactivate(&self, payload: &str) -> Result<RunReport, PipelineError> {
        let id: i64 = payload
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| PipelineError::Validation {
                payload: payload.to_string(),
                reason: e.to_string(),
            })?;
        let symbol = self.store.read_symbol_by_id(id).await?;
        let _guard = self.locks.lock(&symbol.name).await;
        self.store.deactivate_symbol(id).await?;
        Ok(RunReport {
            kind: EventKind::Delete,
            symbol_id: id,
            symbol: symbol.name,
            scrape: None,
        })
    }

    async fn scrape(&self, kind: EventKind, symbol: Symbol) -> Result<RunReport, PipelineError> {
        let watermark = symbol.watermark();

        let posts = match self.content.fetch(&symbol.name, watermark).await {
            Ok(posts) => posts,
            Err(e) => {
                counter!("content_errors_total").increment(1);
                tracing::warn!(target: "pipeline", error = ?e, source = self.content.name(), symbol = %symbol.name, "content fetch failed");
                Vec::new()
            }
        };
        let mut statements = content::prepare(&symbol.name, watermark, posts);

        let mut spam = 0;
        for s in statements.iter_mut() {
            s.spam = self.detector.is_spam(&s.expression);
            spam += usize::from(s.spam);
        }

        let oracle_failures = self.score(&symbol.name, &mut statements).await;
        let hourly_sentiment = aggregate(&statements);
        let scrape_time = (self.clock)().max(watermark);

        counter!("pipeline_statements_total").increment(statements.len() as u64);
        counter!("pipeline_spam_total").increment(spam as u64);

        let failed_writes = self
            .persist(symbol.id, scrape_time, hourly_sentiment, &statements)
            .await;

        Ok(RunReport {
            kind,
            symbol_id: symbol.id,
            symbol: symbol.name,
            scrape: Some(ScrapeReport {
                fetched: statements.len(),
                spam,
                oracle_failures,
                hourly_sentiment,
                scrape_time,
                failed_writes,
            }),
        })
    }

    /// Score every statement, bounded concurrency, order preserved. Failed
    /// calls leave polarity at 0. Returns the failure count.
    async fn score(&self, symbol: &str, statements: &mut [Statement]) -> usize {
        let texts: Vec<String> = statements.iter().map(|s| s.expression.clone()).collect();
        let results: Vec<Result<f64, _>> = stream::iter(texts)
            .map(|text| {
                let oracle = self.oracle.clone();
                async move { oracle.polarity(&text).await }
            })
            .buffered(self.oracle_concurrency)
            .collect()
            .await;

        let mut failures = 0;
        for (s, r) in statements.iter_mut().zip(results) {
            match r {
                Ok(p) => s.polarity = p,
                Err(e) => {
                    failures += 1;
                    counter!("oracle_errors_total").increment(1);
                    tracing::warn!(target: "pipeline", error = ?e, symbol, external_id = s.external_id, "sentiment scoring failed");
                }
            }
        }
        failures
    }

    /// The three writes run concurrently and independently; a failure in one
    /// neither blocks nor rolls back the others.
    async fn persist(
        &self,
        id: i64,
        scrape_time: i64,
        hourly_sentiment: f64,
        statements: &[Statement],
    ) -> Vec<PersistWrite> {
        let (sample, stamp, batch) = tokio::join!(
            self.store.add_sentiment_sample(id, scrape_time, hourly_sentiment),
            self.store.update_last_scrape_time(id, scrape_time),
            self.store.add_statements_batch(id, statements),
        );

        let mut failed = Vec::new();
        for (write, res) in [
            (PersistWrite::SentimentSample, sample),
            (PersistWrite::LastScrapeTime, stamp),
            (PersistWrite::StatementBatch, batch),
        ] {
            if let Err(e) = res {
                counter!("store_write_errors_total", "write" => write.as_str()).increment(1);
                tracing::warn!(target: "pipeline", error = ?e, id, write = write.as_str(), "persist write failed");
                failed.push(write);
            }
        }
        failed
    }
}

fn validated_name(payload: &str) -> Result<&str, PipelineError> {
    let name = payload.trim();
    if name.is_empty() {
        return Err(PipelineError::Validation {
            payload: payload.to_string(),
            reason: "blank symbol name".into(),
        });
    }
    Ok(name)
}
