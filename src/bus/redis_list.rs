// src/bus/redis_list.rs
//! Redis-backed bus: each topic is a list `<prefix>:<topic>`.
//! Publish is `RPUSH` on a spawned task over a shared `ConnectionManager`.
//! Receive is a `BLPOP` poll loop on a dedicated connection checked out per
//! call, so one blocked reader never delays another reader or a publish.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::ErrorKind;

use super::{BusError, EventBus};
use crate::event::{Event, EventKind};

const DEFAULT_POLL_SECS: u64 = 5;

#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
    publisher: ConnectionManager,
    idle: Arc<Mutex<Vec<MultiplexedConnection>>>,
    prefix: String,
    poll_secs: u64,
}

impl RedisBus {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url).with_context(|| format!("parse redis url {url}"))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .context("connect to redis")?;
        Ok(Self {
            client,
            publisher,
            idle: Arc::new(Mutex::new(Vec::new())),
            prefix: prefix.into(),
            poll_secs: DEFAULT_POLL_SECS,
        })
    }

    /// Seconds a single `BLPOP` waits before the loop polls again.
    pub fn with_poll_secs(mut self, secs: u64) -> Self {
        self.poll_secs = secs.max(1);
        self
    }

    fn key(&self, kind: EventKind) -> String {
        topic_key(&self.prefix, kind)
    }

    /// Reuse an idle reader connection or open a new one.
    async fn checkout(&self) -> Result<MultiplexedConnection, BusError> {
        let pooled = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        if let Some(conn) = pooled {
            return Ok(conn);
        }
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)
    }

    fn checkin(&self, conn: MultiplexedConnection) {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).push(conn);
    }
}

fn topic_key(prefix: &str, kind: EventKind) -> String {
    if prefix.is_empty() {
        kind.topic().to_string()
    } else {
        format!("{prefix}:{}", kind.topic())
    }
}

fn classify(err: redis::RedisError) -> BusError {
    match err.kind() {
        ErrorKind::TypeError => BusError::Permanent(err.to_string()),
        _ => BusError::Transient(err.to_string()),
    }
}

#[async_trait::async_trait]
impl EventBus for RedisBus {
    async fn receive(&self, kind: EventKind) -> Result<Event, BusError> {
        let key = self.key(kind);
        // Dropped on error or cancellation; a failed connection is never reused.
        let mut conn = self.checkout().await?;
        loop {
            let reply: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
                .arg(&key)
                .arg(self.poll_secs)
                .query_async(&mut conn)
                .await
                .map_err(classify)?;

            let Some((_, raw)) = reply else {
                continue;
            };
            self.checkin(conn);
            let payload = String::from_utf8(raw)
                .map_err(|e| BusError::Permanent(format!("non-utf8 payload on {key}: {e}")))?;
            return Ok(Event::new(kind, payload));
        }
    }

    fn publish(&self, kind: EventKind, payload: &str) {
        if payload.is_empty() {
            return;
        }
        let key = self.key(kind);
        let payload = payload.to_string();
        let mut conn = self.publisher.clone();
        tokio::spawn(async move {
            let res: redis::RedisResult<i64> = redis::cmd("RPUSH")
                .arg(&key)
                .arg(&payload)
                .query_async(&mut conn)
                .await;
            if let Err(e) = res {
                tracing::warn!(target: "bus", key, payload, error = %e, "redis publish failed");
            }
        });
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_per_topic() {
        assert_eq!(topic_key("watchdog", EventKind::Add), "watchdog:add");
        assert_eq!(topic_key("", EventKind::Scrape), "scrape");
    }

    #[test]
    fn type_errors_are_permanent() {
        let err = redis::RedisError::from((ErrorKind::TypeError, "bad reply"));
        assert!(!classify(err).is_transient());
        let err = redis::RedisError::from((ErrorKind::IoError, "reset"));
        assert!(classify(err).is_transient());
    }
}
