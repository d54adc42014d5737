// src/bus/memory.rs
//! In-process bus. Each topic is an unbounded channel whose receiver is shared,
//! so every worker of a kind competes for the next message.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch, Mutex};

use super::{BusError, EventBus};
use crate::event::{Event, EventKind};

struct Topic {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

pub struct MemoryBus {
    topics: HashMap<EventKind, Topic>,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let topics = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let (tx, rx) = mpsc::unbounded_channel();
                (
                    kind,
                    Topic {
                        tx,
                        rx: Mutex::new(rx),
                    },
                )
            })
            .collect();
        let (closed_tx, closed_rx) = watch::channel(false);
        Self {
            topics,
            closed_tx,
            closed_rx,
        }
    }

    /// Mark the bus unavailable. Pending and future `receive` calls fail transiently.
    pub fn close(&self) {
        self.closed_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    fn topic(&self, kind: EventKind) -> &Topic {
        // Every kind is registered in `new`.
        &self.topics[&kind]
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventBus for MemoryBus {
    async fn receive(&self, kind: EventKind) -> Result<Event, BusError> {
        let mut closed = self.closed_rx.clone();
        let wait_closed = async move {
            loop {
                let is_closed = *closed.borrow_and_update();
                if is_closed || closed.changed().await.is_err() {
                    break;
                }
            }
        };

        let topic = self.topic(kind);
        let next = async {
            let mut rx = topic.rx.lock().await;
            rx.recv().await
        };

        tokio::select! {
            biased;
            _ = wait_closed => Err(BusError::Transient(format!("topic {kind} closed"))),
            msg = next => match msg {
                Some(payload) => Ok(Event::new(kind, payload)),
                None => Err(BusError::Transient(format!("topic {kind} has no producers"))),
            },
        }
    }

    fn publish(&self, kind: EventKind, payload: &str) {
        if payload.is_empty() {
            return;
        }
        if self.is_closed() {
            tracing::warn!(target: "bus", %kind, payload, "publish on closed bus dropped");
            return;
        }
        if self.topic(kind).tx.send(payload.to_string()).is_err() {
            tracing::warn!(target: "bus", %kind, payload, "publish failed: receiver gone");
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
