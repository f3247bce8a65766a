use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use boxoffice_core::models::{Booking, BookingStatus, Seat, SeatStatistics, Show};
use boxoffice_core::repository::{ReservationStore, ReservationTx};
use boxoffice_core::{Clock, CoreResult, ReservationError};

use crate::jobs::reaper::release_expired_holds;
use crate::models::ShowWithSeatStats;

/// Show creation and the seat-map reads.
///
/// Reads that report seat state first release this show's lapsed holds so a
/// caller never sees a hold the reaper simply has not reached yet.
pub struct ShowCatalog<S: ReservationStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ReservationStore> ShowCatalog<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates the show and seats numbered `1..=total_seats` atomically.
    pub async fn create_show_with_seats(
        &self,
        show_time: DateTime<Utc>,
        total_seats: i32,
    ) -> CoreResult<Show> {
        if total_seats <= 0 {
            return Err(ReservationError::validation("totalSeats must be a positive integer"));
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let show = tx.insert_show(show_time, total_seats, now).await?;
        let created = tx.insert_seats(show.id, total_seats, now).await?;
        tx.commit().await?;

        info!("Show {} created with {} seats at {}", show.id, created, show.show_time);
        Ok(show)
    }

    pub async fn show_with_seat_stats(
        &self,
        show_id: i64,
    ) -> CoreResult<Option<ShowWithSeatStats>> {
        let Some(show) = self.store.find_show(show_id).await? else {
            return Ok(None);
        };
        let seat_statistics = self.fresh_statistics(show_id).await?;
        Ok(Some(ShowWithSeatStats { show, seat_statistics }))
    }

    pub async fn seats_for_show(&self, show_id: i64) -> CoreResult<Vec<Seat>> {
        self.require_show(show_id).await?;
        self.release_lapsed(show_id).await?;
        Ok(self.store.seats_for_show(show_id).await?)
    }

    pub async fn seat_statistics(&self, show_id: i64) -> CoreResult<SeatStatistics> {
        self.require_show(show_id).await?;
        self.fresh_statistics(show_id).await
    }

    pub async fn bookings_for_show(
        &self,
        show_id: i64,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>> {
        self.require_show(show_id).await?;
        Ok(self.store.bookings_for_show(show_id, status).await?)
    }

    async fn fresh_statistics(&self, show_id: i64) -> CoreResult<SeatStatistics> {
        self.release_lapsed(show_id).await?;
        Ok(self.store.seat_statistics(show_id).await?)
    }

    async fn require_show(&self, show_id: i64) -> CoreResult<Show> {
        self.store
            .find_show(show_id)
            .await?
            .ok_or(ReservationError::ShowNotFound)
    }

    async fn release_lapsed(&self, show_id: i64) -> CoreResult<()> {
        let now = self.clock.now();
        let report = release_expired_holds(self.store.as_ref(), now, Some(show_id)).await?;
        if report.released_seats > 0 {
            debug!(
                "Released {} lapsed seats of show {} on read",
                report.released_seats, show_id
            );
        }
        Ok(())
    }
}
