use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::state::AppState;

pub mod bookings;
pub mod events;
pub mod health;
pub mod rooms;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/bookings", post(bookings::create))
        .route("/api/bookings", get(bookings::list_mine))
        .route("/api/bookings/near-expiry", get(bookings::near_expiry))
        .route("/api/bookings/:id", get(bookings::get_one))
        .route("/api/bookings/:id/cancel", post(bookings::cancel))
        .route(
            "/api/bookings/:id/cancellation-request",
            post(bookings::request_cancellation),
        )
        .route(
            "/api/bookings/:id/cancellation/approve",
            post(bookings::approve_cancellation),
        )
        .route(
            "/api/bookings/:id/cancellation/reject",
            post(bookings::reject_cancellation),
        )
        .route(
            "/api/cancellation-requests",
            get(bookings::cancellation_requests),
        )
        .route(
            "/api/cancellation-policy",
            get(bookings::cancellation_policy),
        )
        .route("/api/rooms/:id/bookings", get(rooms::room_bookings))
        .route("/api/rooms/:id/occupied-times", get(rooms::room_occupied))
        .route(
            "/api/branches/:id/occupied-times",
            get(rooms::branch_occupied),
        )
        .route("/api/events", get(events::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Identity arrives from the upstream gateway as headers. Requests without
/// a user id are rejected; the role defaults to customer.
pub fn actor(headers: &HeaderMap) -> Result<(String, String), AppError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthorized)?;
    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("customer");
    Ok((user_id.to_string(), role.to_string()))
}
