use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::lifecycle::{self, CreateBookingRequest};
use crate::services::{cleanup, refund};
use crate::state::AppState;

use super::actor;

// POST /api/bookings
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<lifecycle::BookingConfirmation>), AppError> {
    let (user_id, _) = actor(&headers)?;
    let confirmation = lifecycle::create_booking(&state, &user_id, &req)?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

// GET /api/bookings/:id
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<crate::models::Booking>, AppError> {
    actor(&headers)?;
    Ok(Json(lifecycle::get_booking(&state, &id)?))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

// GET /api/bookings
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<crate::models::Booking>>, AppError> {
    let (user_id, _) = actor(&headers)?;
    let bookings = lifecycle::user_bookings(
        &state,
        &user_id,
        query.status.as_deref(),
        query.limit.unwrap_or(50),
    )?;
    Ok(Json(bookings))
}

#[derive(Deserialize)]
pub struct CancellationBody {
    pub reason: Option<String>,
}

// POST /api/bookings/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<crate::models::Booking>, AppError> {
    let (user_id, role) = actor(&headers)?;
    Ok(Json(lifecycle::cancel_booking(&state, &id, &user_id, &role)?))
}

// POST /api/bookings/:id/cancellation-request
pub async fn request_cancellation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<CancellationBody>>,
) -> Result<Json<lifecycle::CancellationRequestOutcome>, AppError> {
    let (user_id, _) = actor(&headers)?;
    let reason = body.as_ref().and_then(|b| b.reason.clone());
    let outcome = lifecycle::request_cancellation(&state, &id, &user_id, reason.as_deref())?;
    Ok(Json(outcome))
}

// POST /api/bookings/:id/cancellation/approve
pub async fn approve_cancellation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<lifecycle::ApprovalOutcome>, AppError> {
    let (user_id, _) = actor(&headers)?;
    let outcome = lifecycle::approve_cancellation(&state, &id, &user_id).await?;
    Ok(Json(outcome))
}

// POST /api/bookings/:id/cancellation/reject
pub async fn reject_cancellation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<CancellationBody>>,
) -> Result<Json<crate::models::Booking>, AppError> {
    let (user_id, _) = actor(&headers)?;
    let reason = body.as_ref().and_then(|b| b.reason.clone());
    let booking = lifecycle::reject_cancellation(&state, &id, &user_id, reason.as_deref())?;
    Ok(Json(booking))
}

// GET /api/cancellation-requests
pub async fn cancellation_requests(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<crate::models::Booking>>, AppError> {
    let (user_id, _) = actor(&headers)?;
    Ok(Json(lifecycle::pending_cancellation_requests(
        &state, &user_id,
    )?))
}

// GET /api/cancellation-policy
pub async fn cancellation_policy() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "policy": refund::cancellation_policy_message() }))
}

#[derive(Deserialize)]
pub struct NearExpiryQuery {
    pub minutes: Option<i64>,
}

// GET /api/bookings/near-expiry
pub async fn near_expiry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<NearExpiryQuery>,
) -> Result<Json<Vec<cleanup::NearExpiry>>, AppError> {
    actor(&headers)?;
    let now = state.clock.now();
    let conn = state.db.lock().unwrap();
    let near = cleanup::pending_near_expiry(
        &conn,
        &now,
        state.config.payment_window_minutes,
        query.minutes.unwrap_or(10),
    )?;
    Ok(Json(near))
}
