use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub room_id: String,
    pub customer_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub total_price: f64,
    pub promotion_id: Option<String>,
    pub refund_percentage: Option<f64>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A pending booking past the payment window is dead weight: it no
    /// longer reserves the slot and may be expired by whoever notices first.
    pub fn is_payment_overdue(&self, now: &DateTime<Utc>, window: chrono::Duration) -> bool {
        self.status == BookingStatus::Pending && *now - self.created_at > window
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Completed,
    Cancelled,
    Expired,
    Failed,
    CancellationRequested,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
            BookingStatus::Failed => "failed",
            BookingStatus::CancellationRequested => "cancellation_requested",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            "expired" => BookingStatus::Expired,
            "failed" => BookingStatus::Failed,
            "cancellation_requested" => BookingStatus::CancellationRequested,
            _ => BookingStatus::Pending,
        }
    }

    /// Whether a booking in this status occupies its room's timeline.
    pub fn blocks_room(&self) -> bool {
        !matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Expired | BookingStatus::Failed
        )
    }
}
