use chrono::{DateTime, Utc};
use serde::Serialize;

use boxoffice_core::models::{Booking, BookingStatus, Seat, SeatStatistics, SeatStatus, Show};

/// Outcome of a successful hold: a PENDING booking owning every requested seat.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatHold {
    pub booking: Booking,
    pub seat_ids: Vec<i64>,
    pub hold_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeatSummary {
    pub id: i64,
    pub seat_number: i32,
    pub status: SeatStatus,
}

impl From<&Seat> for SeatSummary {
    fn from(seat: &Seat) -> Self {
        Self {
            id: seat.id,
            seat_number: seat.seat_number,
            status: seat.status,
        }
    }
}

/// Read-only projection of a booking with its show and associated seats.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub id: i64,
    pub show_id: i64,
    pub status: BookingStatus,
    pub seats: Vec<SeatSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub show: Option<Show>,
}

impl BookingDetails {
    pub fn new(booking: Booking, show: Option<Show>, seats: &[Seat]) -> Self {
        Self {
            id: booking.id,
            show_id: booking.show_id,
            status: booking.status,
            seats: seats.iter().map(SeatSummary::from).collect(),
            created_at: booking.created_at,
            updated_at: booking.updated_at,
            show,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowWithSeatStats {
    pub show: Show,
    pub seat_statistics: SeatStatistics,
}
