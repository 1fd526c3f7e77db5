use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outbound notification emitted by the expiration reaper. A separate
/// delivery component (SSE here) fans these out to interested clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub kind: String,
    pub booking_id: String,
    pub room_id: String,
    pub customer_id: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl BookingEvent {
    pub fn expired(
        booking_id: &str,
        room_id: &str,
        customer_id: &str,
        reason: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: "booking:expired".to_string(),
            booking_id: booking_id.to_string(),
            room_id: room_id.to_string(),
            customer_id: customer_id.to_string(),
            reason: reason.to_string(),
            timestamp,
        }
    }
}
