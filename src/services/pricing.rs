use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Promotion, Room};

#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    pub base_price: f64,
    pub total_price: f64,
    pub discount_percent: f64,
    pub promotion_id: Option<String>,
    pub promotion_title: Option<String>,
}

/// Prices a booking: hourly rate times fractional duration, then the single
/// best applicable discount. Promotions never stack; a room-level promotion
/// is only displaced by a strictly better branch-level or code one.
pub fn quote(
    conn: &Connection,
    room: &Room,
    customer_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    promo_code: Option<&str>,
    now: &DateTime<Utc>,
) -> Result<PriceQuote, AppError> {
    let hours = (*end - *start).num_seconds() as f64 / 3600.0;
    let base_price = room.price_per_hour * hours;

    let mut best: Option<Promotion> = queries::room_promotion(conn, &room.id, start, end)?;

    if let Some(branch_promo) = queries::branch_promotion(conn, &room.branch_id, start, end)? {
        if better_than(&branch_promo, best.as_ref()) {
            best = Some(branch_promo);
        }
    }

    if let Some(code) = promo_code {
        let code_promo = queries::promotion_by_code(conn, code, start, end)?
            .ok_or(AppError::InvalidPromoCode)?;

        let used = queries::promo_usage_count(conn, customer_id, &code_promo.id)?;
        if used >= code_promo.per_user_limit {
            return Err(AppError::PromoCodeExhausted);
        }

        // Usage is consumed as soon as the code validates, even when an
        // automatic promotion ends up winning. Expiration and cancellation
        // return the slot.
        queries::record_promo_usage(conn, customer_id, &code_promo.id, now)?;

        if better_than(&code_promo, best.as_ref()) {
            best = Some(code_promo);
        }
    }

    let discount_percent = best.as_ref().map(|p| p.discount_percent).unwrap_or(0.0);
    let total_price = round3(base_price * (1.0 - discount_percent / 100.0));

    Ok(PriceQuote {
        base_price: round3(base_price),
        total_price,
        discount_percent,
        promotion_id: best.as_ref().map(|p| p.id.clone()),
        promotion_title: best.map(|p| p.title),
    })
}

fn better_than(candidate: &Promotion, current: Option<&Promotion>) -> bool {
    match current {
        Some(p) => candidate.discount_percent > p.discount_percent,
        None => true,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
