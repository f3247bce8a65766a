//! Periodic background jobs.
//!
//! Each job runs on its own tokio task, ticks on a fixed interval and stops
//! when its [`JobHandle`] is stopped. A [`SingleFlight`] gate keeps a slow
//! run from overlapping the next one.

pub mod reaper;
pub mod sweeper;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use boxoffice_core::CoreResult;

#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> CoreResult<()>;
}

/// Non-blocking "already running" flag.
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another run holds the gate.
    pub fn try_enter(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { gate: self })
    }
}

pub struct FlightGuard<'a> {
    gate: &'a SingleFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.gate.running.store(false, Ordering::Release);
    }
}

pub struct JobHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl JobHandle {
    /// Signals the job and waits for its task. Safe to call more than once.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        if let Err(e) = task.await {
            error!("{} task ended abnormally: {}", self.name, e);
        }
        info!("{} stopped", self.name);
    }
}

/// Runs `task` immediately and then every `period` until stopped.
pub fn spawn_periodic<T: PeriodicTask>(task: Arc<T>, period: Duration) -> JobHandle {
    let name = task.name();
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("{} started (every {:?})", name, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = task.run_once().await {
                        error!("{} run failed: {}", name, e);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("{} received shutdown", name);
                        break;
                    }
                }
            }
        }
    });

    JobHandle {
        name,
        shutdown,
        task: Mutex::new(Some(handle)),
    }
}
