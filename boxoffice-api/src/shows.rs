use std::str::FromStr;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boxoffice_core::models::{Booking, BookingStatus, Seat, SeatStatistics, SeatStatus};
use boxoffice_core::{ReservationError, ReservationStore};

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShowRequest {
    pub show_time: Option<DateTime<Utc>>,
    pub total_seats: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedShow {
    pub show_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowResponse {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub total_seats: i32,
    pub created_at: DateTime<Utc>,
    pub seat_statistics: SeatStatistics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatResponse {
    pub id: i64,
    pub seat_number: i32,
    pub status: SeatStatus,
    pub hold_expires_at: Option<DateTime<Utc>>,
}

impl From<Seat> for SeatResponse {
    fn from(seat: Seat) -> Self {
        Self {
            id: seat.id,
            seat_number: seat.seat_number,
            status: seat.status,
            hold_expires_at: seat.hold_expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
}

pub fn routes<S: ReservationStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/shows", post(create_show::<S>))
        .route("/api/shows/{show_id}", get(get_show::<S>))
        .route("/api/shows/{show_id}/seats", get(get_seats::<S>))
        .route("/api/shows/{show_id}/seats/stats", get(get_seat_stats::<S>))
        .route("/api/shows/{show_id}/bookings", get(get_show_bookings::<S>))
}

/// POST /api/shows
pub async fn create_show<S: ReservationStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<CreateShowRequest>, JsonRejection>,
) -> Result<ApiResponse<CreatedShow>, AppError> {
    let Json(req) = payload?;

    let (Some(show_time), Some(total_seats)) = (req.show_time, req.total_seats) else {
        return Err(ReservationError::validation("showTime and totalSeats are required").into());
    };
    let total_seats = i32::try_from(total_seats)
        .map_err(|_| ReservationError::validation("totalSeats is out of range"))?;

    let show = state.catalog.create_show_with_seats(show_time, total_seats).await?;

    Ok(ApiResponse::created(
        "Show created successfully",
        CreatedShow { show_id: show.id },
    ))
}

/// GET /api/shows/{show_id}
pub async fn get_show<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(show_id): Path<i64>,
) -> Result<ApiResponse<ShowResponse>, AppError> {
    let view = state
        .catalog
        .show_with_seat_stats(show_id)
        .await?
        .ok_or(ReservationError::ShowNotFound)?;

    Ok(ApiResponse::ok(
        "Show fetched successfully",
        ShowResponse {
            id: view.show.id,
            show_time: view.show.show_time,
            total_seats: view.show.total_seats,
            created_at: view.show.created_at,
            seat_statistics: view.seat_statistics,
        },
    ))
}

/// GET /api/shows/{show_id}/seats
pub async fn get_seats<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(show_id): Path<i64>,
) -> Result<ApiResponse<Vec<SeatResponse>>, AppError> {
    let seats = state.catalog.seats_for_show(show_id).await?;
    Ok(ApiResponse::ok(
        "Seats fetched successfully",
        seats.into_iter().map(SeatResponse::from).collect(),
    ))
}

/// GET /api/shows/{show_id}/seats/stats
pub async fn get_seat_stats<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(show_id): Path<i64>,
) -> Result<ApiResponse<SeatStatistics>, AppError> {
    let stats = state.catalog.seat_statistics(show_id).await?;
    Ok(ApiResponse::ok("Seat statistics fetched successfully", stats))
}

/// GET /api/shows/{show_id}/bookings?status=PENDING
pub async fn get_show_bookings<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(show_id): Path<i64>,
    query: Result<Query<BookingsQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<Booking>>, AppError> {
    let Query(query) = query?;
    let status = query
        .status
        .as_deref()
        .map(BookingStatus::from_str)
        .transpose()
        .map_err(|_| ReservationError::validation("unknown booking status"))?;

    let bookings = state.catalog.bookings_for_show(show_id, status).await?;
    Ok(ApiResponse::ok("Bookings fetched successfully", bookings))
}
