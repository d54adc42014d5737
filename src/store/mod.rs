// src/store/mod.rs
//! Persistence gateway over the relational store.
//!
//! The three writes of one pipeline run (sentiment sample, last scrape time,
//! statement batch) are independent calls; only the statement batch is
//! transactional.

pub mod sqlite;

use crate::types::{SentimentSample, Statement, Symbol};
use thiserror::Error;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("symbol name is blank")]
    BlankName,
    #[error("symbol {id} is already active")]
    AlreadyActive { id: i64 },
    #[error("symbol not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait::async_trait]
pub trait SymbolStore: Send + Sync {
    /// Create the symbol, or reactivate it keeping its id and history.
    /// Fails with `AlreadyActive` when nothing would change.
    async fn add_symbol(&self, name: &str) -> Result<i64, StoreError>;

    async fn deactivate_symbol(&self, id: i64) -> Result<(), StoreError>;

    /// Never moves `last_scrape_time` backwards.
    async fn update_last_scrape_time(&self, id: i64, ts: i64) -> Result<(), StoreError>;

    async fn add_sentiment_sample(&self, id: i64, ts: i64, value: f64) -> Result<(), StoreError>;

    /// All-or-nothing insert of one scrape cycle's statements.
    async fn add_statements_batch(&self, id: i64, statements: &[Statement])
        -> Result<(), StoreError>;

    async fn read_active_symbols(&self) -> Result<Vec<Symbol>, StoreError>;

    async fn read_symbol_by_id(&self, id: i64) -> Result<Symbol, StoreError>;

    async fn read_symbol_by_name(&self, name: &str) -> Result<Symbol, StoreError>;

    /// Newest first, `timestamp >= from`.
    async fn read_statement_history(&self, id: i64, from: i64)
        -> Result<Vec<Statement>, StoreError>;

    /// Newest first, `timestamp >= from`.
    async fn read_sentiment_history(
        &self,
        id: i64,
        from: i64,
    ) -> Result<Vec<SentimentSample>, StoreError>;
}
