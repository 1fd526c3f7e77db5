use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::services::cleanup;

/// Checks whether [start, end) collides with any blocking booking for the
/// room. Pending bookings whose payment window has lapsed are expired on the
/// spot rather than waiting for the reaper, so a stale hold never blocks a
/// paying customer.
pub fn has_blocking_overlap(
    conn: &Connection,
    room_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    exclude_booking_id: Option<&str>,
    now: &DateTime<Utc>,
    payment_window: Duration,
) -> anyhow::Result<bool> {
    let candidates = queries::overlapping_bookings(conn, room_id, start, end, exclude_booking_id)?;

    for booking in candidates {
        if booking.is_payment_overdue(now, payment_window) {
            if cleanup::expire_booking(conn, &booking, now)? {
                tracing::info!(
                    booking_id = %booking.id,
                    room_id,
                    "lazily expired overdue pending booking during overlap check"
                );
                continue;
            }
            // Lost the race with the reaper; the slot is free either way.
            continue;
        }
        return Ok(true);
    }

    Ok(false)
}
