// src/store/sqlite.rs
use super::{StoreError, SymbolStore};
use crate::types::{SentimentSample, Statement, Symbol};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &str = include_str!("../../schema.sql");

const SELECT_SYMBOL: &str = "SELECT s.id, s.name, s.active, s.last_scrape_time,
        (SELECT ss.hourly_sentiment FROM sentiment_samples ss
          WHERE ss.symbol_id = s.id AND ss.timestamp = s.last_scrape_time
          ORDER BY ss.id DESC LIMIT 1) AS hourly_sentiment
     FROM symbols s";

#[derive(Debug, FromRow)]
struct SymbolRow {
    id: i64,
    name: String,
    active: bool,
    last_scrape_time: Option<i64>,
    hourly_sentiment: Option<f64>,
}

impl From<SymbolRow> for Symbol {
    fn from(r: SymbolRow) -> Self {
        Symbol {
            id: r.id,
            name: r.name,
            active: r.active,
            last_scrape_time: r.last_scrape_time,
            hourly_sentiment: r.hourly_sentiment.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, FromRow)]
struct StatementRow {
    external_id: i64,
    expression: String,
    url: String,
    timestamp: i64,
    polarity: f64,
    likes: i64,
    replies: i64,
    retweets: i64,
    spam: bool,
}

impl From<StatementRow> for Statement {
    fn from(r: StatementRow) -> Self {
        Statement {
            expression: r.expression,
            timestamp: r.timestamp,
            polarity: r.polarity,
            permanent_url: r.url,
            external_id: r.external_id as u64,
            likes: r.likes,
            replies: r.replies,
            retweets: r.retweets,
            spam: r.spam,
        }
    }
}

/// SQLite-backed `SymbolStore`. Cheap to clone.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) and bootstrap the schema.
    /// In-memory databases are pinned to a single connection so every
    /// caller sees the same data.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = pool_opts.connect_with(options).await?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!(target: "store", in_memory, "sqlite store ready");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_symbol(&self, clause: &str, key: SymbolKey<'_>) -> Result<Symbol, StoreError> {
        let sql = format!("{SELECT_SYMBOL} WHERE {clause}");
        let q = sqlx::query_as::<_, SymbolRow>(&sql);
        let row = match key {
            SymbolKey::Id(id) => q.bind(id).fetch_optional(&self.pool).await?,
            SymbolKey::Name(name) => q.bind(name).fetch_optional(&self.pool).await?,
        };
        row.map(Symbol::from).ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

#[derive(Clone, Copy)]
enum SymbolKey<'a> {
    Id(i64),
    Name(&'a str),
}

impl std::fmt::Display for SymbolKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKey::Id(id) => write!(f, "id {id}"),
            SymbolKey::Name(name) => write!(f, "name {name}"),
        }
    }
}

#[async_trait::async_trait]
impl SymbolStore for SqliteStore {
    async fn add_symbol(&self, name: &str) -> Result<i64, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::BlankName);
        }

        // Write first so the transaction holds the write lock from the start.
        let mut tx = self.pool.begin().await?;
        let inserted =
            sqlx::query("INSERT INTO symbols (name, active) VALUES (?, 1) ON CONFLICT(name) DO NOTHING")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        if inserted.rows_affected() == 1 {
            let id = inserted.last_insert_rowid();
            tx.commit().await?;
            return Ok(id);
        }

        let reactivated = sqlx::query("UPDATE symbols SET active = 1 WHERE name = ? AND active = 0")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        let (id,): (i64,) = sqlx::query_as("SELECT id FROM symbols WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        if reactivated.rows_affected() == 0 {
            return Err(StoreError::AlreadyActive { id });
        }
        Ok(id)
    }

    async fn deactivate_symbol(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE symbols SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("id {id}")));
        }
        Ok(())
    }

    async fn update_last_scrape_time(&self, id: i64, ts: i64) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE symbols SET last_scrape_time = MAX(COALESCE(last_scrape_time, 0), ?) WHERE id = ?",
        )
        .bind(ts)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("id {id}")));
        }
        Ok(())
    }

    async fn add_sentiment_sample(&self, id: i64, ts: i64, value: f64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sentiment_samples (timestamp, symbol_id, hourly_sentiment) VALUES (?, ?, ?)",
        )
        .bind(ts)
        .bind(id)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_statements_batch(
        &self,
        id: i64,
        statements: &[Statement],
    ) -> Result<(), StoreError> {
        if statements.is_empty() {
            return Ok(());
        }
        // Dropping `tx` on an early return rolls the whole batch back.
        let mut tx = self.pool.begin().await?;
        for s in statements {
            sqlx::query(
                "INSERT INTO statements (
                    external_id, symbol_id, expression, url, timestamp,
                    polarity, likes, replies, retweets, spam
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(s.external_id as i64)
            .bind(id)
            .bind(&s.expression)
            .bind(&s.permanent_url)
            .bind(s.timestamp)
            .bind(s.polarity)
            .bind(s.likes)
            .bind(s.replies)
            .bind(s.retweets)
            .bind(s.spam)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn read_active_symbols(&self) -> Result<Vec<Symbol>, StoreError> {
        let sql = format!("{SELECT_SYMBOL} WHERE s.active = 1 ORDER BY s.id");
        let rows = sqlx::query_as::<_, SymbolRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Symbol::from).collect())
    }

    async fn read_symbol_by_id(&self, id: i64) -> Result<Symbol, StoreError> {
        self.fetch_symbol("s.id = ?", SymbolKey::Id(id)).await
    }

    async fn read_symbol_by_name(&self, name: &str) -> Result<Symbol, StoreError> {
        self.fetch_symbol("s.name = ?", SymbolKey::Name(name.trim()))
            .await
    }

    async fn read_statement_history(
        &self,
        id: i64,
        from: i64,
    ) -> Result<Vec<Statement>, StoreError> {
        let rows = sqlx::query_as::<_, StatementRow>(
            "SELECT external_id, expression, url, timestamp, polarity,
                    likes, replies, retweets, spam
               FROM statements
              WHERE symbol_id = ? AND timestamp >= ?
              ORDER BY timestamp DESC, external_id DESC",
        )
        .bind(id)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Statement::from).collect())
    }

    async fn read_sentiment_history(
        &self,
        id: i64,
        from: i64,
    ) -> Result<Vec<SentimentSample>, StoreError> {
        let rows: Vec<(i64, i64, f64)> = sqlx::query_as(
            "SELECT timestamp, symbol_id, hourly_sentiment
               FROM sentiment_samples
              WHERE symbol_id = ? AND timestamp >= ?
              ORDER BY timestamp DESC, id DESC",
        )
        .bind(id)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(timestamp, symbol_id, hourly_sentiment)| SentimentSample {
                timestamp,
                symbol_id,
                hourly_sentiment,
            })
            .collect())
    }
}
