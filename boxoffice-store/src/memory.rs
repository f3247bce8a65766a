//! In-process backends with the same contracts as Postgres and Redis.
//!
//! A transaction owns the whole state mutex until it ends, so transactions
//! are trivially serializable. A snapshot taken at `begin` is restored on
//! rollback or drop.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use boxoffice_core::lock::{DistributedLock, LockError, LockToken};
use boxoffice_core::models::{Booking, BookingStatus, Seat, SeatStatistics, SeatStatus, Show};
use boxoffice_core::repository::{ReservationStore, ReservationTx, StoreResult};

#[derive(Debug, Clone, Default)]
struct MemState {
    last_show_id: i64,
    last_seat_id: i64,
    last_booking_id: i64,
    shows: BTreeMap<i64, Show>,
    seats: BTreeMap<i64, Seat>,
    bookings: BTreeMap<i64, Booking>,
}

impl MemState {
    fn held_by(&self, booking_id: i64) -> impl Iterator<Item = &Seat> {
        self.seats
            .values()
            .filter(move |s| s.held_by == Some(booking_id) && s.status == SeatStatus::Held)
    }

    fn owns_any_seat(&self, booking_id: i64) -> bool {
        self.seats.values().any(|s| s.held_by == Some(booking_id))
    }
}

#[derive(Clone, Default)]
pub struct MemoryReservationStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    type Tx = MemoryReservationTx;

    async fn begin(&self) -> StoreResult<MemoryReservationTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = Some(guard.clone());
        Ok(MemoryReservationTx { guard, snapshot })
    }

    async fn find_show(&self, show_id: i64) -> StoreResult<Option<Show>> {
        Ok(self.state.lock().await.shows.get(&show_id).cloned())
    }

    async fn find_booking(&self, booking_id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&booking_id).cloned())
    }

    async fn seats_for_show(&self, show_id: i64) -> StoreResult<Vec<Seat>> {
        let state = self.state.lock().await;
        let mut seats: Vec<Seat> = state
            .seats
            .values()
            .filter(|s| s.show_id == show_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.seat_number);
        Ok(seats)
    }

    async fn seats_for_booking(&self, booking_id: i64) -> StoreResult<Vec<Seat>> {
        let state = self.state.lock().await;
        let mut seats: Vec<Seat> = state
            .seats
            .values()
            .filter(|s| s.held_by == Some(booking_id))
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.seat_number);
        Ok(seats)
    }

    async fn seat_statistics(&self, show_id: i64) -> StoreResult<SeatStatistics> {
        let state = self.state.lock().await;
        let mut stats = SeatStatistics::default();
        for seat in state.seats.values().filter(|s| s.show_id == show_id) {
            stats.record(seat.status, 1);
        }
        Ok(stats)
    }

    async fn bookings_for_show(
        &self,
        show_id: i64,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .values()
            .filter(|b| b.show_id == show_id)
            .filter(|b| status.map_or(true, |wanted| b.status == wanted))
            .filter(|b| state.owns_any_seat(b.id))
            .cloned()
            .collect())
    }
}

pub struct MemoryReservationTx {
    guard: OwnedMutexGuard<MemState>,
    snapshot: Option<MemState>,
}

impl Drop for MemoryReservationTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl ReservationTx for MemoryReservationTx {
    async fn insert_show(
        &mut self,
        show_time: DateTime<Utc>,
        total_seats: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Show> {
        self.guard.last_show_id += 1;
        let show = Show {
            id: self.guard.last_show_id,
            show_time,
            total_seats,
            created_at: now,
            updated_at: now,
        };
        self.guard.shows.insert(show.id, show.clone());
        Ok(show)
    }

    async fn insert_seats(
        &mut self,
        show_id: i64,
        total_seats: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let state = &mut *self.guard;
        for seat_number in 1..=total_seats {
            state.last_seat_id += 1;
            state.seats.insert(
                state.last_seat_id,
                Seat {
                    id: state.last_seat_id,
                    show_id,
                    seat_number,
                    status: SeatStatus::Available,
                    held_by: None,
                    hold_expires_at: None,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        Ok(u64::try_from(total_seats.max(0)).unwrap_or_default())
    }

    async fn insert_pending_booking(
        &mut self,
        show_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Booking> {
        self.guard.last_booking_id += 1;
        let booking = Booking {
            id: self.guard.last_booking_id,
            show_id,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.guard.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn delete_booking(&mut self, booking_id: i64) -> StoreResult<()> {
        self.guard.bookings.remove(&booking_id);
        Ok(())
    }

    async fn lock_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.guard.bookings.get(&booking_id).cloned())
    }

    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(booking) = self.guard.bookings.get_mut(&booking_id) {
            booking.status = status;
            booking.updated_at = now;
        }
        Ok(())
    }

    async fn hold_available_seats(
        &mut self,
        show_id: i64,
        seat_ids: &[i64],
        booking_id: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut updated = 0;
        for seat in self.guard.seats.values_mut() {
            if seat.show_id == show_id
                && seat.status == SeatStatus::Available
                && seat_ids.contains(&seat.id)
            {
                seat.status = SeatStatus::Held;
                seat.held_by = Some(booking_id);
                seat.hold_expires_at = Some(expires_at);
                seat.updated_at = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn lock_held_seats(&mut self, booking_id: i64) -> StoreResult<Vec<Seat>> {
        Ok(self.guard.held_by(booking_id).cloned().collect())
    }

    async fn book_held_seats(&mut self, booking_id: i64, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut updated = 0;
        for seat in self.guard.seats.values_mut() {
            if seat.held_by == Some(booking_id) && seat.status == SeatStatus::Held {
                seat.status = SeatStatus::Booked;
                seat.hold_expires_at = None;
                seat.updated_at = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn release_held_seats(
        &mut self,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut updated = 0;
        for seat in self.guard.seats.values_mut() {
            if seat.held_by == Some(booking_id) && seat.status == SeatStatus::Held {
                release(seat, now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn lock_expired_holds(
        &mut self,
        now: DateTime<Utc>,
        show_id: Option<i64>,
    ) -> StoreResult<Vec<Seat>> {
        Ok(self
            .guard
            .seats
            .values()
            .filter(|s| s.status == SeatStatus::Held)
            .filter(|s| s.hold_expires_at.is_some_and(|at| at < now))
            .filter(|s| show_id.map_or(true, |id| s.show_id == id))
            .cloned()
            .collect())
    }

    async fn release_seats(&mut self, seat_ids: &[i64], now: DateTime<Utc>) -> StoreResult<u64> {
        let mut updated = 0;
        for id in seat_ids {
            if let Some(seat) = self.guard.seats.get_mut(id) {
                if seat.status == SeatStatus::Held {
                    release(seat, now);
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn count_held_seats(&mut self, booking_id: i64) -> StoreResult<i64> {
        Ok(self.guard.held_by(booking_id).count() as i64)
    }

    async fn expire_pending_bookings(
        &mut self,
        booking_ids: &[i64],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut updated = 0;
        for id in booking_ids {
            if let Some(booking) = self.guard.bookings.get_mut(id) {
                if booking.status == BookingStatus::Pending {
                    booking.status = BookingStatus::Expired;
                    booking.updated_at = now;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn delete_orphan_bookings(&mut self) -> StoreResult<u64> {
        let state = &mut *self.guard;
        let orphans: Vec<i64> = state
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending)
            .filter(|b| !state.owns_any_seat(b.id))
            .map(|b| b.id)
            .collect();
        for id in &orphans {
            state.bookings.remove(id);
        }
        Ok(orphans.len() as u64)
    }

    async fn commit(mut self) -> StoreResult<()> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        // Drop restores the snapshot.
        Ok(())
    }
}

fn release(seat: &mut Seat, now: DateTime<Utc>) {
    seat.status = SeatStatus::Available;
    seat.held_by = None;
    seat.hold_expires_at = None;
    seat.updated_at = now;
}

/// Lease lock kept in process memory; leases follow tokio's clock.
#[derive(Clone, Default)]
pub struct MemoryLock {
    leases: Arc<StdMutex<HashMap<String, (LockToken, Instant)>>>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, key: &str) -> bool {
        let leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        leases.get(key).is_some_and(|(_, until)| *until > Instant::now())
    }

    /// Holds `key` with a foreign token, as another process would.
    pub fn seize(&self, key: &str, ttl: Duration) -> LockToken {
        let token = LockToken::new();
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        leases.insert(key.to_string(), (token.clone(), Instant::now() + ttl));
        token
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, LockError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, until)) = leases.get(key) {
            if *until > now {
                return Ok(None);
            }
        }
        let token = LockToken::new();
        leases.insert(key.to_string(), (token.clone(), now + ttl));
        Ok(Some(token))
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<(), LockError> {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        if leases.get(key).is_some_and(|(owner, _)| owner == token) {
            leases.remove(key);
        }
        Ok(())
    }
}
