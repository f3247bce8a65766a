//! Booking state machine.
//!
//! ```text
//! PENDING ──confirm──▶ CONFIRMED   (confirm again: no-op success)
//!    │
//!    ├──cancel───────▶ CANCELLED   (cancel again: no-op success)
//!    │
//!    └──lease lapse──▶ EXPIRED     (set by the reaper)
//! ```
//!
//! Confirm and cancel take the booking row lock first and the seat row locks
//! second, inside one transaction.

use std::sync::Arc;

use tracing::info;

use boxoffice_core::models::{Booking, BookingStatus};
use boxoffice_core::repository::{ReservationStore, ReservationTx};
use boxoffice_core::{Clock, CoreResult, ReservationError};

use crate::models::BookingDetails;

pub struct BookingLifecycle<S: ReservationStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ReservationStore> BookingLifecycle<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// PENDING → CONFIRMED, booking every seat the booking holds.
    pub async fn confirm(&self, booking_id: i64) -> CoreResult<Booking> {
        let mut tx = self.store.begin().await?;

        let booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or(ReservationError::BookingNotFound)?;

        match booking.status {
            BookingStatus::Confirmed => {
                tx.commit().await?;
                return Ok(booking);
            }
            BookingStatus::Pending => {}
            status => {
                return Err(ReservationError::InvalidTransition {
                    action: "confirm",
                    status,
                })
            }
        }

        let seats = tx.lock_held_seats(booking_id).await?;
        let now = self.clock.now();

        let Some(earliest_expiry) = seats.iter().filter_map(|s| s.hold_expires_at).min() else {
            // The seats went back to the pool without the booking being
            // expired; close it out under our row lock.
            tx.set_booking_status(booking_id, BookingStatus::Expired, now).await?;
            tx.commit().await?;
            info!("Booking {} expired on confirm: no held seats left", booking_id);
            return Err(ReservationError::NoHeldSeats);
        };

        if earliest_expiry < now {
            return Err(ReservationError::HoldExpired);
        }

        let booked = tx.book_held_seats(booking_id, now).await?;
        tx.set_booking_status(booking_id, BookingStatus::Confirmed, now).await?;
        tx.commit().await?;

        info!("Booking {} confirmed ({} seats booked)", booking_id, booked);
        Ok(Booking {
            status: BookingStatus::Confirmed,
            updated_at: now,
            ..booking
        })
    }

    /// PENDING → CANCELLED, returning held seats to AVAILABLE.
    ///
    /// Cancelling an already cancelled booking succeeds without writing.
    /// Expired bookings cannot be cancelled; confirmed ones never can.
    pub async fn cancel(&self, booking_id: i64) -> CoreResult<Booking> {
        let mut tx = self.store.begin().await?;

        let booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or(ReservationError::BookingNotFound)?;

        match booking.status {
            BookingStatus::Confirmed => return Err(ReservationError::CannotCancelConfirmed),
            BookingStatus::Cancelled => {
                tx.commit().await?;
                return Ok(booking);
            }
            BookingStatus::Expired => {
                return Err(ReservationError::InvalidTransition {
                    action: "cancel",
                    status: BookingStatus::Expired,
                })
            }
            BookingStatus::Pending => {}
        }

        let now = self.clock.now();
        let released = tx.release_held_seats(booking_id, now).await?;
        tx.set_booking_status(booking_id, BookingStatus::Cancelled, now).await?;
        tx.commit().await?;

        info!("Booking {} cancelled ({} seats released)", booking_id, released);
        Ok(Booking {
            status: BookingStatus::Cancelled,
            updated_at: now,
            ..booking
        })
    }

    /// `None` when the booking does not exist.
    pub async fn booking_details(&self, booking_id: i64) -> CoreResult<Option<BookingDetails>> {
        let Some(booking) = self.store.find_booking(booking_id).await? else {
            return Ok(None);
        };
        let show = self.store.find_show(booking.show_id).await?;
        let seats = self.store.seats_for_booking(booking_id).await?;
        Ok(Some(BookingDetails::new(booking, show, &seats)))
    }
}
