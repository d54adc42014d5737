// src/content/http.rs
use super::{ContentError, ContentSource, RawPost, DEFAULT_FETCH_LIMIT};
use metrics::histogram;
use std::time::Duration;

/// Search service speaking `GET {base}/search?q=&since=&limit=`.
pub struct HttpContentSource {
    base: String,
    client: reqwest::Client,
    limit: usize,
}

impl HttpContentSource {
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ticker-watchdog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
            limit: DEFAULT_FETCH_LIMIT,
        })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }
}

#[async_trait::async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, symbol: &str, since: i64) -> Result<Vec<RawPost>, ContentError> {
        let t0 = std::time::Instant::now();
        let posts: Vec<RawPost> = self
            .client
            .get(format!("{}/search", self.base))
            .query(&[
                ("q", symbol.to_string()),
                ("since", since.to_string()),
                ("limit", self.limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        histogram!("content_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(posts)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
