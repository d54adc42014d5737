// src/oracle/http.rs
use super::{checked_polarity, OracleError, QuotePeriod, SentimentOracle};
use crate::types::Quote;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SentimentRequest<'a> {
    tweet_text: &'a str,
}

#[derive(Deserialize)]
struct SentimentResponse {
    polarity: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequest<'a> {
    symbol_name: &'a str,
    period: QuotePeriod,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    quotes: Vec<Quote>,
}

/// JSON-over-HTTP oracle: `POST {base}/sentiment`, `POST {base}/quotes`.
pub struct HttpOracle {
    base: String,
    client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SentimentOracle for HttpOracle {
    async fn polarity(&self, text: &str) -> Result<f64, OracleError> {
        let resp: SentimentResponse = self
            .client
            .post(format!("{}/sentiment", self.base))
            .json(&SentimentRequest { tweet_text: text })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        checked_polarity(resp.polarity)
    }

    async fn quote_history(
        &self,
        symbol: &str,
        period: QuotePeriod,
    ) -> Result<Vec<Quote>, OracleError> {
        let resp: QuoteResponse = self
            .client
            .post(format!("{}/quotes", self.base))
            .json(&QuoteRequest {
                symbol_name: symbol,
                period,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let mut quotes = resp.quotes;
        quotes.sort_by_key(|q| q.timestamp);
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_bodies_use_wire_names() {
        let s = serde_json::to_value(SentimentRequest { tweet_text: "hi" }).unwrap();
        assert_eq!(s, serde_json::json!({"tweetText": "hi"}));

        let q = serde_json::to_value(QuoteRequest {
            symbol_name: "AAA",
            period: QuotePeriod::SevenDays,
        })
        .unwrap();
        assert_eq!(q, serde_json::json!({"symbolName": "AAA", "period": "7d"}));
    }

    #[test]
    fn quote_response_tolerates_missing_list() {
        let r: QuoteResponse = serde_json::from_str("{}").unwrap();
        assert!(r.quotes.is_empty());
    }
}
