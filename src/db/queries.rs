use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingStatus, Branch, BranchSchedule, CancellationStats, Payment, PaymentStatus,
    Promotion, PromotionTarget, RefundStatus, Room,
};

pub const DT_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_dt(dt: &DateTime<Utc>) -> String {
    dt.naive_utc().format(DT_FMT).to_string()
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, DT_FMT)
        .map(|n| n.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_dt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|v| parse_dt(&v))
}

fn day_bounds(date: NaiveDate) -> (String, String) {
    (
        format!("{} 00:00:00", date.format("%Y-%m-%d")),
        format!("{} 23:59:59", date.format("%Y-%m-%d")),
    )
}

// ── Bookings ──

const BOOKING_COLS: &str = "id, room_id, customer_id, start_time, end_time, status, total_price, \
     promotion_id, refund_percentage, cancellation_reason, cancelled_at, cancelled_by, \
     cancellation_requested_at, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let status_str: String = row.get(5)?;
    Ok(Booking {
        id: row.get(0)?,
        room_id: row.get(1)?,
        customer_id: row.get(2)?,
        start_time: parse_dt(&row.get::<_, String>(3)?),
        end_time: parse_dt(&row.get::<_, String>(4)?),
        status: BookingStatus::parse(&status_str),
        total_price: row.get(6)?,
        promotion_id: row.get(7)?,
        refund_percentage: row.get(8)?,
        cancellation_reason: row.get(9)?,
        cancelled_at: parse_opt_dt(row.get(10)?),
        cancelled_by: row.get(11)?,
        cancellation_requested_at: parse_opt_dt(row.get(12)?),
        created_at: parse_dt(&row.get::<_, String>(13)?),
        updated_at: parse_dt(&row.get::<_, String>(14)?),
    })
}

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, room_id, customer_id, start_time, end_time, status, total_price, \
         promotion_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            booking.id,
            booking.room_id,
            booking.customer_id,
            fmt_dt(&booking.start_time),
            fmt_dt(&booking.end_time),
            booking.status.as_str(),
            booking.total_price,
            booking.promotion_id,
            fmt_dt(&booking.created_at),
            fmt_dt(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    );

    match result {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings on a room that intersect [start, end) under closed-open
/// semantics and still occupy the room (not cancelled/expired/failed).
pub fn overlapping_bookings(
    conn: &Connection,
    room_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE room_id = ?1
           AND status NOT IN ('cancelled', 'expired', 'failed')
           AND start_time < ?2
           AND end_time > ?3
           AND (?4 IS NULL OR id != ?4)
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![room_id, fmt_dt(end), fmt_dt(start), exclude_booking_id],
        parse_booking_row,
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

/// Status-guarded transition to expired. Returns false when the booking was
/// no longer pending, which makes the reaper and the lazy overlap-check
/// expiration idempotent against each other.
pub fn mark_expired_if_pending(
    conn: &Connection,
    id: &str,
    now: &DateTime<Utc>,
    reason: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'expired', cancelled_at = ?1, cancellation_reason = ?2, updated_at = ?1
         WHERE id = ?3 AND status = 'pending'",
        params![fmt_dt(now), reason, id],
    )?;
    Ok(count > 0)
}

pub fn expired_pending_bookings(
    conn: &Connection,
    cutoff: &DateTime<Utc>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE status = 'pending' AND created_at <= ?1
         ORDER BY created_at ASC"
    ))?;

    let rows = stmt.query_map(params![fmt_dt(cutoff)], parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

/// Pending bookings that have not expired yet but will within the next
/// `minutes_from_now` minutes. Monitoring helper for the reaper.
pub fn pending_near_expiry(
    conn: &Connection,
    now: &DateTime<Utc>,
    window_minutes: i64,
    minutes_from_now: i64,
) -> anyhow::Result<Vec<Booking>> {
    let created_after = *now - chrono::Duration::minutes(window_minutes);
    let created_before = *now + chrono::Duration::minutes(minutes_from_now - window_minutes);

    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE status = 'pending' AND created_at > ?1 AND created_at <= ?2
         ORDER BY created_at ASC LIMIT 20"
    ))?;

    let rows = stmt.query_map(
        params![fmt_dt(&created_after), fmt_dt(&created_before)],
        parse_booking_row,
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

pub fn set_cancellation_requested(
    conn: &Connection,
    id: &str,
    refund_percentage: f64,
    reason: Option<&str>,
    requested_by: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'cancellation_requested', refund_percentage = ?1, cancellation_reason = ?2,
             cancellation_requested_at = ?3, cancelled_by = ?4, updated_at = ?3
         WHERE id = ?5 AND status IN ('pending', 'completed')",
        params![refund_percentage, reason, fmt_dt(now), requested_by, id],
    )?;
    Ok(count > 0)
}

pub fn mark_cancelled(
    conn: &Connection,
    id: &str,
    expected_status: BookingStatus,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'cancelled', cancelled_at = ?1, updated_at = ?1
         WHERE id = ?2 AND status = ?3",
        params![fmt_dt(now), id, expected_status.as_str()],
    )?;
    Ok(count > 0)
}

pub fn cancel_pending(
    conn: &Connection,
    id: &str,
    cancelled_by: &str,
    reason: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'cancelled', cancelled_at = ?1, cancelled_by = ?2,
             cancellation_reason = ?3, updated_at = ?1
         WHERE id = ?4 AND status = 'pending'",
        params![fmt_dt(now), cancelled_by, reason, id],
    )?;
    Ok(count > 0)
}

/// Reverts a rejected cancellation request back to completed, clearing the
/// request audit fields and prefixing the stored reason.
pub fn revert_cancellation_request(
    conn: &Connection,
    id: &str,
    rejection_reason: Option<&str>,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let reason = match rejection_reason {
        Some(r) => format!("REJECTED: {r}"),
        None => "REJECTED".to_string(),
    };
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'completed', cancellation_reason = ?1, cancellation_requested_at = NULL,
             refund_percentage = NULL, cancelled_by = NULL, updated_at = ?2
         WHERE id = ?3 AND status = 'cancellation_requested'",
        params![reason, fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

pub fn get_user_bookings(
    conn: &Connection,
    customer_id: &str,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE customer_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY start_time DESC LIMIT ?3"
    ))?;

    let rows = stmt.query_map(params![customer_id, status_filter, limit], parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

pub fn get_room_bookings(
    conn: &Connection,
    room_id: &str,
    date: Option<NaiveDate>,
) -> anyhow::Result<Vec<Booking>> {
    let (day_start, day_end) = match date {
        Some(d) => {
            let (s, e) = day_bounds(d);
            (Some(s), Some(e))
        }
        None => (None, None),
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE room_id = ?1
           AND status NOT IN ('cancelled', 'expired', 'failed')
           AND (?2 IS NULL OR (start_time >= ?2 AND start_time <= ?3))
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(params![room_id, day_start, day_end], parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

/// Bookings with the given status on any of the given rooms, filtered to a
/// single day when `date` is set and to current/future ones otherwise.
pub fn occupied_bookings(
    conn: &Connection,
    room_ids: &[String],
    date: Option<NaiveDate>,
    status: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<Vec<Booking>> {
    if room_ids.is_empty() {
        return Ok(vec![]);
    }

    let in_list = |first: usize| {
        (0..room_ids.len())
            .map(|i| format!("?{}", first + i))
            .collect::<Vec<String>>()
            .join(", ")
    };

    // Two SQL shapes: a day window when a date is given, otherwise only
    // current and future bookings.
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(status.to_string())];
    let sql = match date {
        Some(d) => {
            let (day_start, day_end) = day_bounds(d);
            params_vec.push(Box::new(day_start));
            params_vec.push(Box::new(day_end));
            let in_list = in_list(4);
            format!(
                "SELECT {BOOKING_COLS} FROM bookings
                 WHERE status = ?1 AND start_time >= ?2 AND start_time < ?3
                   AND room_id IN ({in_list})
                 ORDER BY start_time ASC"
            )
        }
        None => {
            params_vec.push(Box::new(fmt_dt(now)));
            let in_list = in_list(3);
            format!(
                "SELECT {BOOKING_COLS} FROM bookings
                 WHERE status = ?1 AND end_time >= ?2
                   AND room_id IN ({in_list})
                 ORDER BY start_time ASC"
            )
        }
    };

    let mut stmt = conn.prepare(&sql)?;
    for id in room_ids {
        params_vec.push(Box::new(id.clone()));
    }
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let rows = stmt.query_map(params_refs.as_slice(), parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

pub fn pending_cancellation_requests(
    conn: &Connection,
    owner_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {cols} FROM bookings b
         INNER JOIN rooms r ON b.room_id = r.id
         INNER JOIN branches br ON r.branch_id = br.id
         WHERE b.status = 'cancellation_requested' AND br.owner_id = ?1
         ORDER BY b.cancellation_requested_at ASC",
        cols = "b.id, b.room_id, b.customer_id, b.start_time, b.end_time, b.status, \
                b.total_price, b.promotion_id, b.refund_percentage, b.cancellation_reason, \
                b.cancelled_at, b.cancelled_by, b.cancellation_requested_at, b.created_at, \
                b.updated_at",
    ))?;

    let rows = stmt.query_map(params![owner_id], parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

pub fn count_bookings(conn: &Connection, customer_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE customer_id = ?1",
        params![customer_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Cancelled-after-payment bookings: the abuse signal counts cancellations
/// that went through the refund workflow, not abandoned pending holds.
pub fn count_paid_cancellations(conn: &Connection, customer_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE customer_id = ?1 AND status = 'cancelled' AND refund_percentage IS NOT NULL",
        params![customer_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ── Payments ──

fn parse_payment_row(row: &rusqlite::Row) -> rusqlite::Result<Payment> {
    let payment_status: String = row.get(4)?;
    let refund_status: String = row.get(5)?;
    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        transaction_id: row.get(2)?,
        amount: row.get(3)?,
        payment_status: PaymentStatus::parse(&payment_status),
        refund_status: RefundStatus::parse(&refund_status),
        refund_amount: row.get(6)?,
        gateway_fee_amount: row.get(7)?,
        created_at: parse_dt(&row.get::<_, String>(8)?),
    })
}

pub fn create_payment(conn: &Connection, payment: &Payment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, transaction_id, amount, payment_status, \
         refund_status, refund_amount, gateway_fee_amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            payment.id,
            payment.booking_id,
            payment.transaction_id,
            payment.amount,
            payment.payment_status.as_str(),
            payment.refund_status.as_str(),
            payment.refund_amount,
            payment.gateway_fee_amount,
            fmt_dt(&payment.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        "SELECT id, booking_id, transaction_id, amount, payment_status, refund_status, \
         refund_amount, gateway_fee_amount, created_at
         FROM payments WHERE booking_id = ?1",
        params![booking_id],
        parse_payment_row,
    );

    match result {
        Ok(payment) => Ok(Some(payment)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn expire_payment_if_pending(conn: &Connection, booking_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET payment_status = 'expired'
         WHERE booking_id = ?1 AND payment_status = 'pending'",
        params![booking_id],
    )?;
    Ok(count > 0)
}

/// Claims the refund for one in-flight approval. The guard means two
/// concurrent approvals cannot both reach the gateway: the loser sees zero
/// rows updated and fails fast. A failed attempt may be claimed again.
pub fn claim_refund_processing(conn: &Connection, booking_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET refund_status = 'processing'
         WHERE booking_id = ?1 AND refund_status IN ('none', 'failed')",
        params![booking_id],
    )?;
    Ok(count > 0)
}

/// Releases a refund claim after a gateway failure so the owner can retry.
pub fn release_refund_claim(conn: &Connection, booking_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET refund_status = 'failed'
         WHERE booking_id = ?1 AND refund_status = 'processing'",
        params![booking_id],
    )?;
    Ok(count > 0)
}

pub fn record_refund_result(
    conn: &Connection,
    booking_id: &str,
    refund_status: RefundStatus,
    refund_amount: f64,
    gateway_fee: f64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET refund_status = ?1, refund_amount = ?2, gateway_fee_amount = ?3
         WHERE booking_id = ?4",
        params![refund_status.as_str(), refund_amount, gateway_fee, booking_id],
    )?;
    Ok(count > 0)
}

// ── Promotions ──

fn parse_promotion_row(row: &rusqlite::Row) -> rusqlite::Result<Promotion> {
    let target: String = row.get(3)?;
    Ok(Promotion {
        id: row.get(0)?,
        title: row.get(1)?,
        discount_percent: row.get(2)?,
        target_type: PromotionTarget::parse(&target),
        promo_code: row.get(4)?,
        room_id: row.get(5)?,
        branch_id: row.get(6)?,
        start_date: parse_dt(&row.get::<_, String>(7)?),
        end_date: parse_dt(&row.get::<_, String>(8)?),
        per_user_limit: row.get(9)?,
        is_active: row.get::<_, i32>(10)? != 0,
    })
}

const PROMOTION_COLS: &str = "id, title, discount_percent, target_type, promo_code, room_id, \
     branch_id, start_date, end_date, per_user_limit, is_active";

pub fn create_promotion(conn: &Connection, promotion: &Promotion) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO promotions ({PROMOTION_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            promotion.id,
            promotion.title,
            promotion.discount_percent,
            promotion.target_type.as_str(),
            promotion.promo_code,
            promotion.room_id,
            promotion.branch_id,
            fmt_dt(&promotion.start_date),
            fmt_dt(&promotion.end_date),
            promotion.per_user_limit,
            promotion.is_active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_promotion(conn: &Connection, id: &str) -> anyhow::Result<Option<Promotion>> {
    let result = conn.query_row(
        &format!("SELECT {PROMOTION_COLS} FROM promotions WHERE id = ?1"),
        params![id],
        parse_promotion_row,
    );

    match result {
        Ok(promotion) => Ok(Some(promotion)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Active automatic room promotion whose window fully contains [start, end].
pub fn room_promotion(
    conn: &Connection,
    room_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> anyhow::Result<Option<Promotion>> {
    let result = conn.query_row(
        &format!(
            "SELECT {PROMOTION_COLS} FROM promotions
             WHERE room_id = ?1 AND target_type = 'room' AND promo_code IS NULL
               AND is_active = 1 AND start_date <= ?2 AND end_date >= ?3
             LIMIT 1"
        ),
        params![room_id, fmt_dt(start), fmt_dt(end)],
        parse_promotion_row,
    );

    match result {
        Ok(promotion) => Ok(Some(promotion)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn branch_promotion(
    conn: &Connection,
    branch_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> anyhow::Result<Option<Promotion>> {
    let result = conn.query_row(
        &format!(
            "SELECT {PROMOTION_COLS} FROM promotions
             WHERE branch_id = ?1 AND target_type = 'branch' AND promo_code IS NULL
               AND is_active = 1 AND start_date <= ?2 AND end_date >= ?3
             LIMIT 1"
        ),
        params![branch_id, fmt_dt(start), fmt_dt(end)],
        parse_promotion_row,
    );

    match result {
        Ok(promotion) => Ok(Some(promotion)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn promotion_by_code(
    conn: &Connection,
    code: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> anyhow::Result<Option<Promotion>> {
    let result = conn.query_row(
        &format!(
            "SELECT {PROMOTION_COLS} FROM promotions
             WHERE promo_code = ?1 AND target_type = 'global'
               AND is_active = 1 AND start_date <= ?2 AND end_date >= ?3
             LIMIT 1"
        ),
        params![code, fmt_dt(start), fmt_dt(end)],
        parse_promotion_row,
    );

    match result {
        Ok(promotion) => Ok(Some(promotion)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn promo_usage_count(
    conn: &Connection,
    user_id: &str,
    promotion_id: &str,
) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM promo_code_usage WHERE user_id = ?1 AND promotion_id = ?2",
        params![user_id, promotion_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn record_promo_usage(
    conn: &Connection,
    user_id: &str,
    promotion_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO promo_code_usage (user_id, promotion_id, used_at) VALUES (?1, ?2, ?3)",
        params![user_id, promotion_id, fmt_dt(now)],
    )?;
    Ok(())
}

/// Returns the consumed slot(s) to the customer. Deleting zero rows is fine:
/// a second reversal after a race is a no-op.
pub fn release_promo_usage(
    conn: &Connection,
    user_id: &str,
    promotion_id: &str,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM promo_code_usage WHERE user_id = ?1 AND promotion_id = ?2",
        params![user_id, promotion_id],
    )?;
    Ok(count)
}

// ── Rooms & branches ──

pub fn create_room(conn: &Connection, room: &Room) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO rooms (id, branch_id, room_no, price_per_hour, is_available)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            room.id,
            room.branch_id,
            room.room_no,
            room.price_per_hour,
            room.is_available as i32,
        ],
    )?;
    Ok(())
}

pub fn get_room(conn: &Connection, id: &str) -> anyhow::Result<Option<Room>> {
    let result = conn.query_row(
        "SELECT id, branch_id, room_no, price_per_hour, is_available FROM rooms WHERE id = ?1",
        params![id],
        |row| {
            Ok(Room {
                id: row.get(0)?,
                branch_id: row.get(1)?,
                room_no: row.get(2)?,
                price_per_hour: row.get(3)?,
                is_available: row.get::<_, i32>(4)? != 0,
            })
        },
    );

    match result {
        Ok(room) => Ok(Some(room)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn room_ids_for_branch(conn: &Connection, branch_id: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM rooms WHERE branch_id = ?1")?;
    let rows = stmt.query_map(params![branch_id], |row| row.get(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn create_branch(conn: &Connection, branch: &Branch) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO branches (id, branch_name, owner_id, is_active, work_days, open_time, \
         close_time, timezone)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            branch.id,
            branch.branch_name,
            branch.owner_id,
            branch.is_active as i32,
            branch.schedule.work_days.join(","),
            branch.schedule.open_time.format("%H:%M").to_string(),
            branch.schedule.close_time.format("%H:%M").to_string(),
            branch.schedule.timezone.name(),
        ],
    )?;
    Ok(())
}

pub fn get_branch(conn: &Connection, id: &str) -> anyhow::Result<Option<Branch>> {
    let result = conn.query_row(
        "SELECT id, branch_name, owner_id, is_active, work_days, open_time, close_time, timezone
         FROM branches WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)? != 0,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        },
    );

    match result {
        Ok((id, branch_name, owner_id, is_active, work_days, open, close, tz)) => {
            let schedule = BranchSchedule::from_row(&work_days, &open, &close, &tz)?;
            Ok(Some(Branch {
                id,
                branch_name,
                owner_id,
                is_active,
                schedule,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Cancellation stats ──

pub fn upsert_cancellation_stats(
    conn: &Connection,
    stats: &CancellationStats,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO cancellation_stats (user_id, total_bookings, total_cancellations, \
         cancellation_rate, is_flagged, last_cancellation_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET
           total_bookings = excluded.total_bookings,
           total_cancellations = excluded.total_cancellations,
           cancellation_rate = excluded.cancellation_rate,
           is_flagged = excluded.is_flagged,
           last_cancellation_at = excluded.last_cancellation_at,
           updated_at = datetime('now')",
        params![
            stats.user_id,
            stats.total_bookings,
            stats.total_cancellations,
            stats.cancellation_rate,
            stats.is_flagged as i32,
            stats.last_cancellation_at.as_ref().map(fmt_dt),
        ],
    )?;
    Ok(())
}

pub fn get_cancellation_stats(
    conn: &Connection,
    user_id: &str,
) -> anyhow::Result<Option<CancellationStats>> {
    let result = conn.query_row(
        "SELECT user_id, total_bookings, total_cancellations, cancellation_rate, is_flagged, \
         last_cancellation_at
         FROM cancellation_stats WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(CancellationStats {
                user_id: row.get(0)?,
                total_bookings: row.get(1)?,
                total_cancellations: row.get(2)?,
                cancellation_rate: row.get(3)?,
                is_flagged: row.get::<_, i32>(4)? != 0,
                last_cancellation_at: parse_opt_dt(row.get(5)?),
            })
        },
    );

    match result {
        Ok(stats) => Ok(Some(stats)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
