// src/oracle/mod.rs
//! Remote sentiment scorer and quote-history lookup.

pub mod http;

use crate::types::Quote;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use http::HttpOracle;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("oracle returned an invalid polarity: {0}")]
    InvalidPolarity(f64),
    #[error("unknown quote period: {0}")]
    UnknownPeriod(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuotePeriod {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "60d")]
    SixtyDays,
}

impl QuotePeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotePeriod::OneDay => "1d",
            QuotePeriod::SevenDays => "7d",
            QuotePeriod::ThirtyDays => "30d",
            QuotePeriod::SixtyDays => "60d",
        }
    }
}

impl fmt::Display for QuotePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotePeriod {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(QuotePeriod::OneDay),
            "7d" => Ok(QuotePeriod::SevenDays),
            "30d" => Ok(QuotePeriod::ThirtyDays),
            "60d" => Ok(QuotePeriod::SixtyDays),
            other => Err(OracleError::UnknownPeriod(other.to_string())),
        }
    }
}

#[async_trait::async_trait]
pub trait SentimentOracle: Send + Sync {
    /// Polarity of one statement, in `[-1, 1]`.
    async fn polarity(&self, text: &str) -> Result<f64, OracleError>;

    /// Price history for `symbol` over `period`, oldest first.
    async fn quote_history(&self, symbol: &str, period: QuotePeriod)
        -> Result<Vec<Quote>, OracleError>;
}

/// Reject non-finite scores; clamp the rest into `[-1, 1]`.
pub(crate) fn checked_polarity(p: f64) -> Result<f64, OracleError> {
    if !p.is_finite() {
        return Err(OracleError::InvalidPolarity(p));
    }
    Ok(p.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_parse_and_display() {
        for p in ["1d", "7d", "30d", "60d"] {
            assert_eq!(p.parse::<QuotePeriod>().unwrap().to_string(), p);
        }
        assert!(matches!(
            "2w".parse::<QuotePeriod>(),
            Err(OracleError::UnknownPeriod(_))
        ));
        assert_eq!(
            serde_json::to_string(&QuotePeriod::ThirtyDays).unwrap(),
            "\"30d\""
        );
    }

    #[test]
    fn polarity_is_clamped() {
        assert_eq!(checked_polarity(1.5).unwrap(), 1.0);
        assert_eq!(checked_polarity(-0.25).unwrap(), -0.25);
        assert!(checked_polarity(f64::NAN).is_err());
    }
}
