// src/bus/mod.rs
//! Event bus adapter: a thin `receive`/`publish` surface over the `add`,
//! `delete` and `scrape` topics. The broker itself is external.

pub mod memory;
pub mod redis_list;

use crate::event::{Event, EventKind};
use thiserror::Error;

pub use memory::MemoryBus;
pub use redis_list::RedisBus;

/// Read failure classification. Only `Transient` takes a supervisor slot down.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unavailable: {0}")]
    Transient(String),
    #[error("malformed event: {0}")]
    Permanent(String),
}

impl BusError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BusError::Transient(_))
    }
}

#[async_trait::async_trait]
pub trait EventBus: Send + Sync {
    /// Wait for the next event on the topic of `kind`.
    async fn receive(&self, kind: EventKind) -> Result<Event, BusError>;

    /// Fire-and-forget publish. Never blocks the caller; delivery failures are logged.
    fn publish(&self, kind: EventKind, payload: &str);

    fn name(&self) -> &'static str;
}
