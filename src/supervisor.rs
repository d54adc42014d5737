// src/supervisor.rs
//! Fixed-size consumer pool per event kind.
//!
//! Every slot runs `Running → Failed → Backoff → Running`. A worker lives in
//! its own task and exits only on a transient bus read failure (or a panic);
//! the slot then waits out the backoff and spawns exactly one replacement.
//! Permanent read errors are logged and the worker keeps reading.

use crate::bus::{BusError, EventBus};
use crate::event::{Event, EventKind};
use crate::pipeline::Pipeline;
use metrics::{counter, gauge};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_WORKERS_PER_KIND: usize = 10;
pub const DEFAULT_RESPAWN_BACKOFF: Duration = Duration::from_secs(300);

/// What a worker does with each received event.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event);
}

#[async_trait::async_trait]
impl EventHandler for Pipeline {
    async fn handle_event(&self, event: Event) {
        self.process(event).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Running,
    Failed,
    Backoff,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub workers_per_kind: usize,
    pub backoff: Duration,
    pub kinds: Vec<EventKind>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            workers_per_kind: DEFAULT_WORKERS_PER_KIND,
            backoff: DEFAULT_RESPAWN_BACKOFF,
            kinds: EventKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotInfo {
    state: SlotState,
    respawns: u64,
}

#[derive(Default)]
struct Registry {
    slots: Mutex<HashMap<EventKind, Vec<SlotInfo>>>,
}

impl Registry {
    fn set(&self, kind: EventKind, slot: usize, state: SlotState) {
        let mut map = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let Some(slots) = map.get_mut(&kind) else {
            return;
        };
        if let Some(info) = slots.get_mut(slot) {
            info.state = state;
        }
        let live = slots.iter().filter(|s| s.state == SlotState::Running).count();
        gauge!("supervisor_live_workers", "kind" => kind.topic()).set(live as f64);
    }

    fn respawned(&self, kind: EventKind, slot: usize) {
        let mut map = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(info) = map.get_mut(&kind).and_then(|s| s.get_mut(slot)) {
            info.respawns += 1;
        }
        counter!("supervisor_respawns_total", "kind" => kind.topic()).increment(1);
    }

    fn snapshot(&self, kind: EventKind) -> Vec<SlotInfo> {
        let map = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&kind).cloned().unwrap_or_default()
    }
}

pub struct Supervisor {
    bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    cfg: SupervisorConfig,
}

impl Supervisor {
    pub fn new(bus: Arc<dyn EventBus>, handler: Arc<dyn EventHandler>, cfg: SupervisorConfig) -> Self {
        Self { bus, handler, cfg }
    }

    /// Spawn `workers_per_kind` slots for every configured kind.
    pub fn start(self) -> SupervisorHandle {
        crate::metrics::ensure_metrics_described();
        let k = self.cfg.workers_per_kind.max(1);
        let registry = Arc::new(Registry::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        {
            let mut map = registry.slots.lock().unwrap_or_else(|e| e.into_inner());
            for kind in &self.cfg.kinds {
                map.insert(
                    *kind,
                    vec![
                        SlotInfo {
                            state: SlotState::Running,
                            respawns: 0,
                        };
                        k
                    ],
                );
            }
        }

        let mut tasks = Vec::new();
        for kind in self.cfg.kinds.iter().copied() {
            for slot in 0..k {
                let ctx = SlotCtx {
                    kind,
                    slot,
                    bus: self.bus.clone(),
                    handler: self.handler.clone(),
                    registry: registry.clone(),
                    backoff: self.cfg.backoff,
                    stop: stop_rx.clone(),
                };
                tasks.push(tokio::spawn(run_slot(ctx)));
            }
            tracing::info!(target: "supervisor", %kind, workers = k, bus = self.bus.name(), "consumers started");
        }

        SupervisorHandle {
            registry,
            stop: stop_tx,
            tasks,
        }
    }
}

pub struct SupervisorHandle {
    registry: Arc<Registry>,
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SupervisorHandle {
    pub fn live_workers(&self, kind: EventKind) -> usize {
        self.registry
            .snapshot(kind)
            .iter()
            .filter(|s| s.state == SlotState::Running)
            .count()
    }

    pub fn slot_states(&self, kind: EventKind) -> Vec<SlotState> {
        self.registry.snapshot(kind).iter().map(|s| s.state).collect()
    }

    pub fn respawns(&self, kind: EventKind) -> u64 {
        self.registry.snapshot(kind).iter().map(|s| s.respawns).sum()
    }

    /// Stop every slot. Workers finish the event in hand first.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for t in self.tasks {
            if let Err(e) = t.await {
                tracing::warn!(target: "supervisor", error = ?e, "slot task ended abnormally");
            }
        }
        tracing::info!(target: "supervisor", "all consumers stopped");
    }
}

struct SlotCtx {
    kind: EventKind,
    slot: usize,
    bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    registry: Arc<Registry>,
    backoff: Duration,
    stop: watch::Receiver<bool>,
}

enum WorkerExit {
    Stopped,
    BusDown(BusError),
}

async fn run_slot(mut ctx: SlotCtx) {
    let (kind, slot) = (ctx.kind, ctx.slot);
    loop {
        ctx.registry.set(kind, slot, SlotState::Running);
        let worker = tokio::spawn(worker_loop(
            kind,
            slot,
            ctx.bus.clone(),
            ctx.handler.clone(),
            ctx.stop.clone(),
        ));

        let reason = match worker.await {
            Ok(WorkerExit::Stopped) => break,
            Ok(WorkerExit::BusDown(e)) => format!("{e}"),
            Err(e) => format!("worker panicked: {e}"),
        };
        ctx.registry.set(kind, slot, SlotState::Failed);
        tracing::warn!(target: "supervisor", %kind, slot, error = %reason, backoff_secs = ctx.backoff.as_secs(), "worker failed, backing off");

        ctx.registry.set(kind, slot, SlotState::Backoff);
        tokio::select! {
            biased;
            _ = stopped(&mut ctx.stop) => break,
            _ = tokio::time::sleep(ctx.backoff) => {}
        }
        ctx.registry.respawned(kind, slot);
        tracing::info!(target: "supervisor", %kind, slot, "respawning worker");
    }
    ctx.registry.set(kind, slot, SlotState::Stopped);
}

async fn worker_loop(
    kind: EventKind,
    slot: usize,
    bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    mut stop: watch::Receiver<bool>,
) -> WorkerExit {
    loop {
        if *stop.borrow() {
            return WorkerExit::Stopped;
        }
        let received = tokio::select! {
            biased;
            _ = stopped(&mut stop) => return WorkerExit::Stopped,
            r = bus.receive(kind) => r,
        };
        match received {
            Ok(event) => handler.handle_event(event).await,
            Err(e) if e.is_transient() => return WorkerExit::BusDown(e),
            Err(e) => {
                tracing::warn!(target: "supervisor", %kind, slot, error = %e, "discarding malformed event");
            }
        }
    }
}

/// Resolves once shutdown is requested or the handle is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}
