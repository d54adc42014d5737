// src/pipeline/locks.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-symbol async mutex. Two runs for the same name never overlap;
/// different names proceed independently.
#[derive(Default)]
pub struct SymbolLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

pub type SymbolGuard = OwnedMutexGuard<()>;

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, name: &str) -> SymbolGuard {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only the map still references are neither held nor awaited.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry(name.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
