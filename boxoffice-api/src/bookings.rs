use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use boxoffice_booking::BookingDetails;
use boxoffice_core::models::BookingStatus;
use boxoffice_core::{ReservationError, ReservationStore};

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldSeatsRequest {
    pub show_id: Option<i64>,
    pub seat_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldSeatsResponse {
    pub booking_id: i64,
    pub show_id: i64,
    pub status: BookingStatus,
    pub seat_ids: Vec<i64>,
    pub hold_expires_at: DateTime<Utc>,
    pub expires_in: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusResponse {
    pub booking_id: i64,
    pub status: BookingStatus,
}

pub fn routes<S: ReservationStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/bookings", post(hold_seats::<S>))
        .route(
            "/api/bookings/{booking_id}",
            get(get_booking::<S>).delete(cancel_booking::<S>),
        )
        .route("/api/bookings/{booking_id}/confirm", post(confirm_booking::<S>))
}

/// POST /api/bookings
/// Holds the requested seats for a new PENDING booking.
pub async fn hold_seats<S: ReservationStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<HoldSeatsRequest>, JsonRejection>,
) -> Result<ApiResponse<HoldSeatsResponse>, AppError> {
    let Json(req) = payload?;
    let (Some(show_id), Some(seat_ids)) = (req.show_id, req.seat_ids) else {
        return Err(ReservationError::validation("showId and seatIds array are required").into());
    };

    let hold = state.engine.hold_seats(show_id, &seat_ids).await?;
    info!("Booking {} created for show {}", hold.booking.id, show_id);

    Ok(ApiResponse::created(
        "Seats held successfully",
        HoldSeatsResponse {
            booking_id: hold.booking.id,
            show_id: hold.booking.show_id,
            status: hold.booking.status,
            seat_ids: hold.seat_ids,
            hold_expires_at: hold.hold_expires_at,
            expires_in: state.settings.hold_duration_label(),
        },
    ))
}

/// GET /api/bookings/{booking_id}
pub async fn get_booking<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<i64>,
) -> Result<ApiResponse<BookingDetails>, AppError> {
    let details = state
        .lifecycle
        .booking_details(booking_id)
        .await?
        .ok_or(ReservationError::BookingNotFound)?;
    Ok(ApiResponse::ok("Booking fetched successfully", details))
}

/// POST /api/bookings/{booking_id}/confirm
pub async fn confirm_booking<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<i64>,
) -> Result<ApiResponse<BookingStatusResponse>, AppError> {
    let booking = state.lifecycle.confirm(booking_id).await?;
    Ok(ApiResponse::ok(
        "Booking confirmed successfully",
        BookingStatusResponse { booking_id: booking.id, status: booking.status },
    ))
}

/// DELETE /api/bookings/{booking_id}
pub async fn cancel_booking<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(booking_id): Path<i64>,
) -> Result<ApiResponse<BookingStatusResponse>, AppError> {
    let booking = state.lifecycle.cancel(booking_id).await?;
    Ok(ApiResponse::ok(
        "Booking cancelled successfully",
        BookingStatusResponse { booking_id: booking.id, status: booking.status },
    ))
}
