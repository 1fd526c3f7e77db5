use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::lifecycle::{self, OccupiedScope, OccupiedSlot};
use crate::state::AppState;

use super::actor;

#[derive(Deserialize)]
pub struct OccupiedQuery {
    pub date: Option<String>,
    pub status: Option<String>,
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    raw.map(|d| {
        NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|_| AppError::Validation(format!("invalid date: {d}")))
    })
    .transpose()
}

// GET /api/rooms/:id/bookings
pub async fn room_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Query(query): Query<OccupiedQuery>,
) -> Result<Json<Vec<crate::models::Booking>>, AppError> {
    actor(&headers)?;
    let date = parse_date(query.date.as_deref())?;
    Ok(Json(lifecycle::room_bookings(&state, &room_id, date)?))
}

// GET /api/rooms/:id/occupied-times
pub async fn room_occupied(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Query(query): Query<OccupiedQuery>,
) -> Result<Json<Vec<OccupiedSlot>>, AppError> {
    actor(&headers)?;
    let date = parse_date(query.date.as_deref())?;
    let slots = lifecycle::occupied_times(
        &state,
        OccupiedScope::Room(&room_id),
        date,
        query.status.as_deref(),
    )?;
    Ok(Json(slots))
}

// GET /api/branches/:id/occupied-times
pub async fn branch_occupied(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(branch_id): Path<String>,
    Query(query): Query<OccupiedQuery>,
) -> Result<Json<Vec<OccupiedSlot>>, AppError> {
    actor(&headers)?;
    let date = parse_date(query.date.as_deref())?;
    let slots = lifecycle::occupied_times(
        &state,
        OccupiedScope::Branch(&branch_id),
        date,
        query.status.as_deref(),
    )?;
    Ok(Json(slots))
}
