use std::sync::Arc;

use chrono::Duration;

use boxoffice_core::models::Show;
use boxoffice_core::{Clock, ManualClock, ReservationSettings, ReservationStore};
use boxoffice_store::{MemoryLock, MemoryReservationStore};

use crate::{
    BookingLifecycle, HoldExpiryReaper, OrphanBookingSweeper, SeatReservationEngine, ShowCatalog,
};

pub(crate) struct Fixture {
    pub store: Arc<MemoryReservationStore>,
    pub lock: Arc<MemoryLock>,
    pub clock: Arc<ManualClock>,
    pub settings: ReservationSettings,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryReservationStore::new()),
            lock: Arc::new(MemoryLock::new()),
            clock: Arc::new(ManualClock::default()),
            settings: ReservationSettings::default(),
        }
    }

    pub fn engine(&self) -> SeatReservationEngine<MemoryReservationStore> {
        SeatReservationEngine::new(
            Arc::clone(&self.store),
            self.lock.clone(),
            self.clock.clone(),
            self.settings.clone(),
        )
    }

    pub fn lifecycle(&self) -> BookingLifecycle<MemoryReservationStore> {
        BookingLifecycle::new(Arc::clone(&self.store), self.clock.clone())
    }

    pub fn catalog(&self) -> ShowCatalog<MemoryReservationStore> {
        ShowCatalog::new(Arc::clone(&self.store), self.clock.clone())
    }

    pub fn reaper(&self) -> HoldExpiryReaper<MemoryReservationStore> {
        HoldExpiryReaper::new(
            Arc::clone(&self.store),
            self.clock.clone(),
            self.settings.reaper_interval,
        )
    }

    pub fn sweeper(&self) -> OrphanBookingSweeper<MemoryReservationStore> {
        OrphanBookingSweeper::new(Arc::clone(&self.store), self.settings.sweeper_interval)
    }

    /// A show one day out with seats numbered 1..=total.
    pub async fn show_with_seats(&self, total: i32) -> Show {
        let show_time = self.clock.now() + Duration::days(1);
        self.catalog().create_show_with_seats(show_time, total).await.unwrap()
    }

    pub fn pass_hold_duration(&self) {
        let hold = Duration::from_std(self.settings.hold_duration).unwrap();
        self.clock.advance(hold + Duration::seconds(1));
    }

    pub async fn assert_statistics_consistent(&self, show_id: i64) {
        let stats = self.store.seat_statistics(show_id).await.unwrap();
        assert_eq!(stats.available + stats.held + stats.booked, stats.total);
        let seats = self.store.seats_for_show(show_id).await.unwrap();
        assert_eq!(stats.total, seats.len() as i64);
        assert!(seats.iter().all(|s| s.is_consistent()), "seat invariant broken: {seats:?}");
    }
}
