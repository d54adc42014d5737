// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod bus;
pub mod classify;
pub mod config;
pub mod content;
pub mod event;
pub mod metrics;
pub mod oracle;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod supervisor;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::bus::{BusError, EventBus};
pub use crate::classify::SpamDetector;
pub use crate::config::AppConfig;
pub use crate::event::{Event, EventKind};
pub use crate::pipeline::{Pipeline, PipelineError, RunReport};
pub use crate::store::{SqliteStore, StoreError, SymbolStore};
pub use crate::supervisor::{Supervisor, SupervisorConfig, SupervisorHandle};
pub use crate::types::{Quote, SentimentSample, Statement, Symbol};
