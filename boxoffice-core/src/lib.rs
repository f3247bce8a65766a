pub mod clock;
pub mod lock;
pub mod models;
pub mod repository;
pub mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lock::{DistributedLock, LockError, LockToken};
pub use models::{Booking, BookingStatus, Seat, SeatStatistics, SeatStatus, Show};
pub use repository::{ReservationStore, ReservationTx, StoreError, StoreResult};
pub use settings::ReservationSettings;

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Show not found")]
    ShowNotFound,
    #[error("Show has already started")]
    ShowAlreadyStarted,
    #[error("Unable to acquire lock. Another booking is in progress for these seats.")]
    LockConflict,
    #[error("Seats unavailable")]
    SeatsUnavailable,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Cannot {action} booking with status: {status}")]
    InvalidTransition {
        action: &'static str,
        status: BookingStatus,
    },
    #[error("No held seats found. The hold may have expired.")]
    NoHeldSeats,
    #[error("Booking hold has expired")]
    HoldExpired,
    #[error("Cannot cancel a confirmed booking")]
    CannotCancelConfirmed,
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Misconfigured: {0}")]
    Misconfigured(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl ReservationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReservationError::ShowNotFound | ReservationError::BookingNotFound => {
                ErrorKind::NotFound
            }
            ReservationError::LockConflict | ReservationError::SeatsUnavailable => {
                ErrorKind::Conflict
            }
            ReservationError::ShowAlreadyStarted
            | ReservationError::InvalidTransition { .. }
            | ReservationError::NoHeldSeats
            | ReservationError::HoldExpired
            | ReservationError::CannotCancelConfirmed
            | ReservationError::ValidationError(_) => ErrorKind::BadRequest,
            ReservationError::Misconfigured(_)
            | ReservationError::Store(_)
            | ReservationError::Lock(_) => ErrorKind::Internal,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ReservationError::ValidationError(msg.into())
    }
}

pub type CoreResult<T> = Result<T, ReservationError>;
