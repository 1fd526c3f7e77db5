use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-customer cancellation statistics, always re-derived from
/// ground-truth booking counts rather than incremented in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationStats {
    pub user_id: String,
    pub total_bookings: i64,
    pub total_cancellations: i64,
    pub cancellation_rate: f64,
    pub is_flagged: bool,
    pub last_cancellation_at: Option<DateTime<Utc>>,
}
