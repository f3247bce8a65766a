use std::error::Error;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Booking, BookingStatus, Seat, SeatStatistics, Show};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(#[source] Box<dyn Error + Send + Sync>),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        StoreError::Backend(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for shows, seats and bookings.
///
/// Reads outside a transaction live here; every mutation goes through a
/// [`ReservationTx`] obtained from [`ReservationStore::begin`].
#[async_trait]
pub trait ReservationStore: Send + Sync + 'static {
    type Tx: ReservationTx;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn find_show(&self, show_id: i64) -> StoreResult<Option<Show>>;

    async fn find_booking(&self, booking_id: i64) -> StoreResult<Option<Booking>>;

    /// All seats of a show ordered by seat number.
    async fn seats_for_show(&self, show_id: i64) -> StoreResult<Vec<Seat>>;

    /// Seats whose `held_by` points at the booking, whatever their status.
    async fn seats_for_booking(&self, booking_id: i64) -> StoreResult<Vec<Seat>>;

    async fn seat_statistics(&self, show_id: i64) -> StoreResult<SeatStatistics>;

    /// Bookings of a show that own at least one seat.
    async fn bookings_for_show(
        &self,
        show_id: i64,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>>;
}

/// A single atomic unit of work. Dropping without `commit` rolls back.
#[async_trait]
pub trait ReservationTx: Send + Sized {
    async fn insert_show(
        &mut self,
        show_time: DateTime<Utc>,
        total_seats: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Show>;

    /// Creates seats numbered `1..=total_seats`, all AVAILABLE.
    async fn insert_seats(
        &mut self,
        show_id: i64,
        total_seats: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn insert_pending_booking(
        &mut self,
        show_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Booking>;

    async fn delete_booking(&mut self, booking_id: i64) -> StoreResult<()>;

    /// Reads the booking under an exclusive row lock.
    async fn lock_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>>;

    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Conditional bulk update: AVAILABLE seats of `show_id` whose id is in
    /// `seat_ids` become HELD by `booking_id`. Returns the affected row count.
    async fn hold_available_seats(
        &mut self,
        show_id: i64,
        seat_ids: &[i64],
        booking_id: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// HELD seats of the booking, row-locked.
    async fn lock_held_seats(&mut self, booking_id: i64) -> StoreResult<Vec<Seat>>;

    /// HELD → BOOKED for the booking's seats; keeps `held_by`, clears the lease.
    async fn book_held_seats(&mut self, booking_id: i64, now: DateTime<Utc>) -> StoreResult<u64>;

    /// HELD → AVAILABLE for the booking's seats.
    async fn release_held_seats(&mut self, booking_id: i64, now: DateTime<Utc>) -> StoreResult<u64>;

    /// HELD seats whose lease ended strictly before `now`, row-locked,
    /// optionally limited to one show.
    async fn lock_expired_holds(
        &mut self,
        now: DateTime<Utc>,
        show_id: Option<i64>,
    ) -> StoreResult<Vec<Seat>>;

    /// HELD → AVAILABLE for the listed seats (rows no longer HELD are skipped).
    async fn release_seats(&mut self, seat_ids: &[i64], now: DateTime<Utc>) -> StoreResult<u64>;

    async fn count_held_seats(&mut self, booking_id: i64) -> StoreResult<i64>;

    /// PENDING → EXPIRED for the listed bookings; other statuses untouched.
    async fn expire_pending_bookings(
        &mut self,
        booking_ids: &[i64],
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Deletes PENDING bookings referenced by no seat.
    async fn delete_orphan_bookings(&mut self) -> StoreResult<u64>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}
