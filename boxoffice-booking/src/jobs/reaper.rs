use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use boxoffice_core::repository::{ReservationStore, ReservationTx};
use boxoffice_core::{Clock, CoreResult};

use super::{spawn_periodic, JobHandle, PeriodicTask, SingleFlight};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub released_seats: u64,
    pub expired_bookings: u64,
}

/// Returns every lapsed hold to AVAILABLE and expires PENDING bookings that
/// are left holding nothing, in one transaction.
///
/// `show_id` narrows the sweep to one show.
pub async fn release_expired_holds<S: ReservationStore>(
    store: &S,
    now: DateTime<Utc>,
    show_id: Option<i64>,
) -> CoreResult<ReapReport> {
    let mut tx = store.begin().await?;

    let lapsed = tx.lock_expired_holds(now, show_id).await?;
    if lapsed.is_empty() {
        tx.commit().await?;
        return Ok(ReapReport::default());
    }

    // held_by is cleared by the release, so collect owners first
    let owners: BTreeSet<i64> = lapsed.iter().filter_map(|s| s.held_by).collect();
    let seat_ids: Vec<i64> = lapsed.iter().map(|s| s.id).collect();

    let released_seats = tx.release_seats(&seat_ids, now).await?;

    let mut drained = Vec::with_capacity(owners.len());
    for booking_id in owners {
        if tx.count_held_seats(booking_id).await? == 0 {
            drained.push(booking_id);
        }
    }
    let expired_bookings = if drained.is_empty() {
        0
    } else {
        tx.expire_pending_bookings(&drained, now).await?
    };

    tx.commit().await?;
    Ok(ReapReport { released_seats, expired_bookings })
}

/// Periodically releases lapsed holds across all shows.
pub struct HoldExpiryReaper<S: ReservationStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    gate: SingleFlight,
}

impl<S: ReservationStore> HoldExpiryReaper<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
            gate: SingleFlight::new(),
        }
    }

    /// One pass. `None` when a previous pass is still running.
    pub async fn reap(&self) -> CoreResult<Option<ReapReport>> {
        let Some(_flight) = self.gate.try_enter() else {
            debug!("Hold expiry reaper still running, skipping tick");
            return Ok(None);
        };

        let report = release_expired_holds(self.store.as_ref(), self.clock.now(), None).await?;
        if report.released_seats > 0 || report.expired_bookings > 0 {
            info!(
                "Released {} expired seat holds, expired {} bookings",
                report.released_seats, report.expired_bookings
            );
        }
        Ok(Some(report))
    }

    pub fn start(self: Arc<Self>) -> JobHandle {
        let interval = self.interval;
        spawn_periodic(self, interval)
    }
}

#[async_trait]
impl<S: ReservationStore> PeriodicTask for HoldExpiryReaper<S> {
    fn name(&self) -> &'static str {
        "hold-expiry-reaper"
    }

    async fn run_once(&self) -> CoreResult<()> {
        self.reap().await.map(|_| ())
    }
}
