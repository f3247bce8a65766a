use std::sync::Arc;

use boxoffice_booking::{BookingLifecycle, SeatReservationEngine, ShowCatalog};
use boxoffice_core::lock::DistributedLock;
use boxoffice_core::{Clock, ReservationSettings, ReservationStore};

pub struct AppState<S: ReservationStore> {
    pub engine: Arc<SeatReservationEngine<S>>,
    pub lifecycle: Arc<BookingLifecycle<S>>,
    pub catalog: Arc<ShowCatalog<S>>,
    pub settings: ReservationSettings,
}

// Derived Clone would demand S: Clone.
impl<S: ReservationStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            lifecycle: Arc::clone(&self.lifecycle),
            catalog: Arc::clone(&self.catalog),
            settings: self.settings.clone(),
        }
    }
}

impl<S: ReservationStore> AppState<S> {
    pub fn new(
        store: Arc<S>,
        lock: Arc<dyn DistributedLock>,
        clock: Arc<dyn Clock>,
        settings: ReservationSettings,
    ) -> Self {
        let engine = SeatReservationEngine::new(
            Arc::clone(&store),
            lock,
            Arc::clone(&clock),
            settings.clone(),
        );
        Self {
            engine: Arc::new(engine),
            lifecycle: Arc::new(BookingLifecycle::new(Arc::clone(&store), Arc::clone(&clock))),
            catalog: Arc::new(ShowCatalog::new(store, clock)),
            settings,
        }
    }
}
