use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use boxoffice_api::{app, AppState};
use boxoffice_core::{Clock, ManualClock, ReservationSettings};
use boxoffice_store::{MemoryLock, MemoryReservationStore};

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()));
        let state = AppState::new(
            Arc::new(MemoryReservationStore::new()),
            Arc::new(MemoryLock::new()),
            clock.clone(),
            ReservationSettings::default(),
        );
        Self { router: app(state), clock }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn create_show(&self, total_seats: i64) -> i64 {
        let show_time = self.clock.now() + Duration::days(2);
        let (status, body) = self
            .send(
                "POST",
                "/api/shows",
                Some(json!({ "showTime": show_time, "totalSeats": total_seats })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["showId"].as_i64().unwrap()
    }

    async fn hold(&self, show_id: i64, seat_ids: &[i64]) -> (StatusCode, Value) {
        self.send("POST", "/api/bookings", Some(json!({ "showId": show_id, "seatIds": seat_ids })))
            .await
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_show_creation_and_seat_map() {
    let app = TestApp::new();
    let show_id = app.create_show(50).await;

    let (status, body) = app.send("GET", &format!("/api/shows/{show_id}/seats"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let seats = body["data"].as_array().unwrap();
    assert_eq!(seats.len(), 50);
    assert_eq!(seats[0]["seatNumber"], json!(1));
    assert_eq!(seats[49]["seatNumber"], json!(50));
    assert!(seats.iter().all(|s| s["status"] == json!("AVAILABLE")));

    let (status, body) = app.send("GET", &format!("/api/shows/{show_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalSeats"], json!(50));
    assert_eq!(body["data"]["seatStatistics"]["available"], json!(50));
}

#[tokio::test]
async fn test_show_validation() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            "POST",
            "/api/shows",
            Some(json!({ "showTime": "2025-04-01T20:00:00Z", "totalSeats": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, _) = app
        .send("POST", "/api/shows", Some(json!({ "showTime": "2025-04-01T20:00:00Z" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send("GET", "/api/shows/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Show not found"));
}

#[tokio::test]
async fn test_hold_confirm_confirm_scenario() {
    let app = TestApp::new();
    let show_id = app.create_show(5).await;

    let (status, body) = app.hold(show_id, &[1, 2]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], json!("Seats held successfully"));
    assert_eq!(body["data"]["status"], json!("PENDING"));
    assert_eq!(body["data"]["seatIds"], json!([1, 2]));
    assert_eq!(body["data"]["expiresIn"], json!("5 minutes"));
    let booking_id = body["data"]["bookingId"].as_i64().unwrap();

    let (status, body) = app.send("GET", &format!("/api/shows/{show_id}/seats/stats"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "available": 3, "held": 2, "booked": 0, "total": 5 }));

    for _ in 0..2 {
        let uri = format!("/api/bookings/{booking_id}/confirm");
        let (status, body) = app.send("POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], json!("CONFIRMED"));
    }

    let (status, body) = app.send("GET", &format!("/api/bookings/{booking_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("CONFIRMED"));
    assert_eq!(body["data"]["seats"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["show"]["id"], json!(show_id));

    let (status, body) = app.send("DELETE", &format!("/api/bookings/{booking_id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Cannot cancel a confirmed booking"));
}

#[tokio::test]
async fn test_overlapping_hold_is_a_conflict() {
    let app = TestApp::new();
    let show_id = app.create_show(5).await;

    let (status, _) = app.hold(show_id, &[1, 2, 3]).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.hold(show_id, &[3, 4]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("Seats unavailable"));

    let (_, body) = app.send("GET", &format!("/api/shows/{show_id}/seats"), None).await;
    assert_eq!(body["data"][3]["status"], json!("AVAILABLE"));
}

#[tokio::test]
async fn test_hold_validation() {
    let app = TestApp::new();
    let show_id = app.create_show(3).await;

    let (status, body) = app.hold(show_id, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, _) = app.send("POST", "/api/bookings", Some(json!({ "seatIds": [1] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.hold(show_id + 1, &[1]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lapsed_hold_is_released_on_read_and_cannot_be_confirmed() {
    let app = TestApp::new();
    let show_id = app.create_show(2).await;
    let (_, body) = app.hold(show_id, &[1]).await;
    let booking_id = body["data"]["bookingId"].as_i64().unwrap();

    app.clock.advance(Duration::minutes(6));

    let uri = format!("/api/bookings/{booking_id}/confirm");
    let (status, body) = app.send("POST", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Booking hold has expired"));

    let (_, body) = app.send("GET", &format!("/api/shows/{show_id}/seats"), None).await;
    assert_eq!(body["data"][0]["status"], json!("AVAILABLE"));
    assert_eq!(body["data"][0]["holdExpiresAt"], Value::Null);

    let (_, body) = app.send("GET", &format!("/api/bookings/{booking_id}"), None).await;
    assert_eq!(body["data"]["status"], json!("EXPIRED"));
}

#[tokio::test]
async fn test_cancel_and_list_bookings() {
    let app = TestApp::new();
    let show_id = app.create_show(4).await;
    let (_, first) = app.hold(show_id, &[1, 2]).await;
    let (_, second) = app.hold(show_id, &[3]).await;
    let first_id = first["data"]["bookingId"].as_i64().unwrap();
    let second_id = second["data"]["bookingId"].as_i64().unwrap();

    let (status, body) = app.send("DELETE", &format!("/api/bookings/{first_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("CANCELLED"));

    let (_, body) = app.send("GET", &format!("/api/shows/{show_id}/seats/stats"), None).await;
    assert_eq!(body["data"]["available"], json!(3));

    let (status, body) = app
        .send("GET", &format!("/api/shows/{show_id}/bookings?status=PENDING"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second_id]);

    let (status, _) = app
        .send("GET", &format!("/api/shows/{show_id}/bookings?status=BOGUS"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_booking_is_not_found() {
    let app = TestApp::new();
    for (method, uri) in [
        ("GET", "/api/bookings/77"),
        ("POST", "/api/bookings/77/confirm"),
        ("DELETE", "/api/bookings/77"),
    ] {
        let (status, body) = app.send(method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body["error"], json!("Booking not found"));
    }
}
