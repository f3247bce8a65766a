pub mod catalog;
pub mod engine;
pub mod jobs;
pub mod lifecycle;
pub mod models;

pub use catalog::ShowCatalog;
pub use engine::SeatReservationEngine;
pub use jobs::reaper::{HoldExpiryReaper, ReapReport};
pub use jobs::sweeper::OrphanBookingSweeper;
pub use jobs::{spawn_periodic, JobHandle, PeriodicTask, SingleFlight};
pub use lifecycle::BookingLifecycle;
pub use models::{BookingDetails, SeatHold, SeatSummary, ShowWithSeatStats};

#[cfg(test)]
pub(crate) mod test_support;
