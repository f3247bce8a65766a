use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use boxoffice_core::{ErrorKind, ReservationError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        let msg = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => AppError::NotFound(msg),
            ErrorKind::Conflict => AppError::Conflict(msg),
            ErrorKind::BadRequest => AppError::BadRequest(msg),
            ErrorKind::Internal => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::{BookingStatus, StoreError};

    fn status_of(err: ReservationError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_reservation_errors_map_to_status_codes() {
        assert_eq!(status_of(ReservationError::BookingNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ReservationError::SeatsUnavailable), StatusCode::CONFLICT);
        assert_eq!(status_of(ReservationError::LockConflict), StatusCode::CONFLICT);
        assert_eq!(status_of(ReservationError::CannotCancelConfirmed), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ReservationError::InvalidTransition {
                action: "confirm",
                status: BookingStatus::Cancelled,
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ReservationError::Misconfigured("hold duration out of range".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ReservationError::Store(StoreError::Corrupt("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
