use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use boxoffice_core::repository::{ReservationStore, ReservationTx};
use boxoffice_core::CoreResult;

use super::{spawn_periodic, JobHandle, PeriodicTask, SingleFlight};

/// Deletes PENDING bookings that own no seat at all, e.g. a hold whose seat
/// assignment never happened.
pub struct OrphanBookingSweeper<S: ReservationStore> {
    store: Arc<S>,
    interval: Duration,
    gate: SingleFlight,
}

impl<S: ReservationStore> OrphanBookingSweeper<S> {
    pub fn new(store: Arc<S>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            gate: SingleFlight::new(),
        }
    }

    /// Number of bookings deleted, or `None` if a previous pass is running.
    pub async fn sweep(&self) -> CoreResult<Option<u64>> {
        let Some(_flight) = self.gate.try_enter() else {
            debug!("Orphan booking sweeper still running, skipping tick");
            return Ok(None);
        };

        let mut tx = self.store.begin().await?;
        let deleted = tx.delete_orphan_bookings().await?;
        tx.commit().await?;

        if deleted > 0 {
            info!("Cleaned up {} orphan bookings", deleted);
        }
        Ok(Some(deleted))
    }

    pub fn start(self: Arc<Self>) -> JobHandle {
        let interval = self.interval;
        spawn_periodic(self, interval)
    }
}

#[async_trait]
impl<S: ReservationStore> PeriodicTask for OrphanBookingSweeper<S> {
    fn name(&self) -> &'static str {
        "orphan-booking-sweeper"
    }

    async fn run_once(&self) -> CoreResult<()> {
        self.sweep().await.map(|_| ())
    }
}
