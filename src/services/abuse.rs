use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::CancellationStats;
use crate::services::refund;

/// Re-derives a customer's cancellation statistics from ground-truth booking
/// counts. Never incremented in place, so a missed update cannot cause the
/// stored rate to drift.
pub fn recompute(
    conn: &Connection,
    customer_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<CancellationStats> {
    let total_bookings = queries::count_bookings(conn, customer_id)?;
    let total_cancellations = queries::count_paid_cancellations(conn, customer_id)?;

    let (is_flagged, cancellation_rate) =
        refund::should_flag_for_abuse(total_bookings, total_cancellations);

    let stats = CancellationStats {
        user_id: customer_id.to_string(),
        total_bookings,
        total_cancellations,
        cancellation_rate,
        is_flagged,
        last_cancellation_at: Some(*now),
    };
    queries::upsert_cancellation_stats(conn, &stats)?;

    if is_flagged {
        tracing::warn!(
            customer_id,
            rate = cancellation_rate,
            "customer flagged for high cancellation rate"
        );
    }

    Ok(stats)
}
