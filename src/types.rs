// src/types.rs
use serde::{Deserialize, Serialize};

/// A watched stock or crypto symbol. Never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: i64,
    pub name: String,
    pub active: bool,
    /// Unix seconds of the last completed scrape; `None` until the first one.
    pub last_scrape_time: Option<i64>,
    /// Sentiment sample recorded at `last_scrape_time`, 0 when absent.
    pub hourly_sentiment: f64,
}

impl Symbol {
    /// Lower bound for the next content fetch.
    pub fn watermark(&self) -> i64 {
        self.last_scrape_time.unwrap_or(0)
    }
}

/// One social post about a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub expression: String,
    pub timestamp: i64,
    pub polarity: f64,
    pub permanent_url: String,
    pub external_id: u64,
    pub likes: i64,
    pub replies: i64,
    pub retweets: i64,
    pub spam: bool,
}

/// Aggregate written once per completed scrape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentSample {
    pub timestamp: i64,
    pub symbol_id: i64,
    pub hourly_sentiment: f64,
}

/// Price point from the oracle's quote history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: i64,
    pub price: f64,
}
