//! Hold creation: lock, conditional seat assignment, rollback on conflict.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use boxoffice_core::lock::{DistributedLock, LockToken};
use boxoffice_core::repository::{ReservationStore, ReservationTx};
use boxoffice_core::{Clock, CoreResult, ReservationError, ReservationSettings};

use crate::models::SeatHold;

pub struct SeatReservationEngine<S: ReservationStore> {
    store: Arc<S>,
    lock: Arc<dyn DistributedLock>,
    clock: Arc<dyn Clock>,
    settings: ReservationSettings,
}

impl<S: ReservationStore> SeatReservationEngine<S> {
    pub fn new(
        store: Arc<S>,
        lock: Arc<dyn DistributedLock>,
        clock: Arc<dyn Clock>,
        settings: ReservationSettings,
    ) -> Self {
        Self { store, lock, clock, settings }
    }

    pub fn settings(&self) -> &ReservationSettings {
        &self.settings
    }

    /// Holds exactly `seat_ids` of `show_id` for a new PENDING booking, or
    /// nothing at all.
    pub async fn hold_seats(&self, show_id: i64, seat_ids: &[i64]) -> CoreResult<SeatHold> {
        let seat_ids = canonical_seat_ids(seat_ids)?;

        let show = self
            .store
            .find_show(show_id)
            .await?
            .ok_or(ReservationError::ShowNotFound)?;

        if self.clock.now() >= show.show_time {
            return Err(ReservationError::ShowAlreadyStarted);
        }

        let key = lock_key(show_id, &seat_ids);
        let token = self.acquire_lock(&key).await?;

        let result = self.assign_seats(show_id, &seat_ids).await;

        // Always release, even when assignment failed.
        if let Err(e) = self.lock.release(&key, &token).await {
            warn!("Error releasing lock {}: {}", key, e);
        }

        result
    }

    async fn acquire_lock(&self, key: &str) -> CoreResult<LockToken> {
        let attempts = self.settings.lock_retries.max(1);

        for attempt in 1..=attempts {
            if let Some(token) = self.lock.acquire(key, self.settings.lock_ttl).await? {
                return Ok(token);
            }
            if attempt < attempts {
                debug!("Lock {} busy (attempt {}/{}), backing off", key, attempt, attempts);
                tokio::time::sleep(self.settings.lock_backoff).await;
            }
        }

        warn!("Lock {} not acquired after {} attempts", key, attempts);
        Err(ReservationError::LockConflict)
    }

    async fn assign_seats(&self, show_id: i64, seat_ids: &[i64]) -> CoreResult<SeatHold> {
        let now = self.clock.now();
        let expires_at = self.hold_expiry(now)?;

        let mut tx = self.store.begin().await?;
        let booking = tx.insert_pending_booking(show_id, now).await?;

        let held = tx
            .hold_available_seats(show_id, seat_ids, booking.id, expires_at, now)
            .await?;

        if held < seat_ids.len() as u64 {
            // Undo the partial hold explicitly before discarding the booking;
            // the rollback below then drops the booking row as well.
            tx.release_held_seats(booking.id, now).await?;
            tx.delete_booking(booking.id).await?;
            tx.rollback().await?;
            info!(
                "Hold for show {} seats {:?} rejected: {} of {} seats available",
                show_id,
                seat_ids,
                held,
                seat_ids.len()
            );
            return Err(ReservationError::SeatsUnavailable);
        }

        tx.commit().await?;
        info!(
            "Booking {} holds seats {:?} of show {} until {}",
            booking.id, seat_ids, show_id, expires_at
        );

        Ok(SeatHold {
            booking,
            seat_ids: seat_ids.to_vec(),
            hold_expires_at: expires_at,
        })
    }

    fn hold_expiry(&self, now: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
        chrono::Duration::from_std(self.settings.hold_duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| ReservationError::Misconfigured("hold duration out of range".into()))
    }
}

/// Sorted, duplicate-free, positive seat ids.
pub fn canonical_seat_ids(seat_ids: &[i64]) -> CoreResult<Vec<i64>> {
    if seat_ids.is_empty() {
        return Err(ReservationError::validation("showId and seatIds array are required"));
    }
    if let Some(bad) = seat_ids.iter().find(|id| **id <= 0) {
        return Err(ReservationError::validation(format!("invalid seat id: {}", bad)));
    }

    let mut sorted = seat_ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != seat_ids.len() {
        return Err(ReservationError::validation("duplicate seat ids in request"));
    }
    Ok(sorted)
}

/// Lock key scoped to the show and the exact (sorted) seat set.
pub fn lock_key(show_id: i64, sorted_seat_ids: &[i64]) -> String {
    let joined = sorted_seat_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<String>>()
        .join(",");
    format!("lock:show:{}:seats:{}", show_id, joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use boxoffice_core::models::SeatStatus;
    use boxoffice_core::ReservationStore;
    use std::time::Duration;

    #[test]
    fn test_canonical_seat_ids() {
        assert_eq!(canonical_seat_ids(&[3, 1, 2]).unwrap(), vec![1, 2, 3]);
        assert!(matches!(canonical_seat_ids(&[]), Err(ReservationError::ValidationError(_))));
        assert!(matches!(canonical_seat_ids(&[1, 1]), Err(ReservationError::ValidationError(_))));
        assert!(matches!(canonical_seat_ids(&[0, 2]), Err(ReservationError::ValidationError(_))));
    }

    #[test]
    fn test_lock_key_is_order_independent() {
        let a = lock_key(7, &canonical_seat_ids(&[3, 1, 2]).unwrap());
        let b = lock_key(7, &canonical_seat_ids(&[2, 3, 1]).unwrap());
        assert_eq!(a, b);
        assert_eq!(a, "lock:show:7:seats:1,2,3");
    }

    #[tokio::test]
    async fn test_hold_marks_seats_held_and_booking_pending() {
        let fx = Fixture::new();
        let show = fx.show_with_seats(5).await;
        let engine = fx.engine();

        let hold = engine.hold_seats(show.id, &[2, 1]).await.unwrap();

        assert_eq!(hold.seat_ids, vec![1, 2]);
        assert_eq!(hold.booking.status, boxoffice_core::BookingStatus::Pending);
        assert_eq!(hold.hold_expires_at, fx.clock.now() + chrono::Duration::minutes(5));

        let seats = fx.store.seats_for_booking(hold.booking.id).await.unwrap();
        assert_eq!(seats.len(), 2);
        for seat in &seats {
            assert_eq!(seat.status, SeatStatus::Held);
            assert_eq!(seat.hold_expires_at, Some(hold.hold_expires_at));
            assert!(seat.is_consistent());
        }
        fx.assert_statistics_consistent(show.id).await;
        assert!(!fx.lock.is_locked(&lock_key(show.id, &[1, 2])));
    }

    #[tokio::test]
    async fn test_overlapping_request_is_rejected_without_partial_assignment() {
        let fx = Fixture::new();
        let show = fx.show_with_seats(5).await;
        let engine = fx.engine();

        engine.hold_seats(show.id, &[1, 2, 3]).await.unwrap();
        let err = engine.hold_seats(show.id, &[3, 4]).await.unwrap_err();
        assert!(matches!(err, ReservationError::SeatsUnavailable));

        let seats = fx.store.seats_for_show(show.id).await.unwrap();
        assert_eq!(seats[3].status, SeatStatus::Available);
        assert_eq!(seats[3].held_by, None);

        let stats = fx.store.seat_statistics(show.id).await.unwrap();
        assert_eq!(stats.held, 3);
        assert_eq!(stats.available, 2);
        fx.assert_statistics_consistent(show.id).await;
    }

    #[tokio::test]
    async fn test_failed_hold_leaves_no_booking_behind() {
        let fx = Fixture::new();
        let show = fx.show_with_seats(3).await;
        let engine = fx.engine();

        let first = engine.hold_seats(show.id, &[1]).await.unwrap();
        engine.hold_seats(show.id, &[1, 2]).await.unwrap_err();

        // the rejected request's booking id was never committed
        assert!(fx.store.find_booking(first.booking.id + 1).await.unwrap().is_none());
        let bookings = fx.store.bookings_for_show(show.id, None).await.unwrap();
        assert_eq!(bookings.len(), 1);
    }

    #[tokio::test]
    async fn test_seats_of_another_show_are_not_assignable() {
        let fx = Fixture::new();
        let first = fx.show_with_seats(2).await;
        let second = fx.show_with_seats(2).await;
        let engine = fx.engine();

        // seat ids 3 and 4 belong to the second show
        let err = engine.hold_seats(first.id, &[3]).await.unwrap_err();
        assert!(matches!(err, ReservationError::SeatsUnavailable));
        assert!(engine.hold_seats(second.id, &[3, 4]).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_show_and_started_show() {
        let fx = Fixture::new();
        let engine = fx.engine();
        assert!(matches!(
            engine.hold_seats(99, &[1]).await.unwrap_err(),
            ReservationError::ShowNotFound
        ));

        let show = fx.show_with_seats(2).await;
        fx.clock.set(show.show_time);
        assert!(matches!(
            engine.hold_seats(show.id, &[1]).await.unwrap_err(),
            ReservationError::ShowAlreadyStarted
        ));
    }

    #[tokio::test]
    async fn test_unrepresentable_hold_duration_is_an_internal_error() {
        let mut fx = Fixture::new();
        fx.settings.hold_duration = Duration::MAX;
        let show = fx.show_with_seats(2).await;

        let err = fx.engine().hold_seats(show.id, &[1]).await.unwrap_err();
        assert!(matches!(err, ReservationError::Misconfigured(_)));
        assert_eq!(err.kind(), boxoffice_core::ErrorKind::Internal);

        assert!(!fx.lock.is_locked(&lock_key(show.id, &[1])));
        let stats = fx.store.seat_statistics(show.id).await.unwrap();
        assert_eq!(stats.available, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_conflict_after_retries() {
        let fx = Fixture::new();
        let show = fx.show_with_seats(3).await;
        let engine = fx.engine();

        let key = lock_key(show.id, &[1, 2]);
        fx.lock.seize(&key, Duration::from_secs(60));

        let started = tokio::time::Instant::now();
        let err = engine.hold_seats(show.id, &[2, 1]).await.unwrap_err();
        assert!(matches!(err, ReservationError::LockConflict));
        // two backoffs between three attempts
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(200) && waited < Duration::from_millis(300));

        let stats = fx.store.seat_statistics(show.id).await.unwrap();
        assert_eq!(stats.available, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_freed_during_backoff_is_picked_up() {
        let fx = Fixture::new();
        let show = fx.show_with_seats(3).await;
        let engine = fx.engine();

        // lease lapses before the second attempt
        fx.lock.seize(&lock_key(show.id, &[1]), Duration::from_millis(50));
        assert!(engine.hold_seats(show.id, &[1]).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_yield_one_winner() {
        let fx = Fixture::new();
        let show = fx.show_with_seats(10).await;
        let engine = Arc::new(fx.engine());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            let show_id = show.id;
            tasks.spawn(async move { engine.hold_seats(show_id, &[1, 2, 3]).await });
        }

        let mut wins = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                Ok(_) => wins += 1,
                Err(ReservationError::SeatsUnavailable) | Err(ReservationError::LockConflict) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        let stats = fx.store.seat_statistics(show.id).await.unwrap();
        assert_eq!(stats.held, 3);
        fx.assert_statistics_consistent(show.id).await;
    }

    #[tokio::test]
    async fn test_concurrent_overlapping_requests_yield_one_winner() {
        let fx = Fixture::new();
        let show = fx.show_with_seats(10).await;
        let engine = Arc::new(fx.engine());

        // different lock keys, all sharing seat 5
        let requests: Vec<Vec<i64>> = vec![vec![5], vec![4, 5], vec![5, 6], vec![3, 5, 7]];
        let mut tasks = tokio::task::JoinSet::new();
        for seats in requests {
            let engine = Arc::clone(&engine);
            let show_id = show.id;
            tasks.spawn(async move { engine.hold_seats(show_id, &seats).await });
        }

        let mut wins = 0;
        while let Some(joined) = tasks.join_next().await {
            if joined.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);

        let seats = fx.store.seats_for_show(show.id).await.unwrap();
        assert_eq!(seats[4].status, SeatStatus::Held);
        fx.assert_statistics_consistent(show.id).await;
    }
}
