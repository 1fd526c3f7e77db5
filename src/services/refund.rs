use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Booking, BookingStatus};

/// Share of the transaction the gateway keeps; the customer bears it.
pub const GATEWAY_FEE_PERCENT: f64 = 2.0;

/// A paid booking may only be cancelled with at least this much notice.
pub const MINIMUM_CANCELLATION_HOURS: f64 = 2.0;

/// Cancellation-rate threshold above which a customer is flagged.
pub const ABUSE_THRESHOLD_PERCENT: f64 = 30.0;

#[derive(Debug, Clone, Serialize)]
pub struct RefundQuote {
    pub allowed: bool,
    pub percentage: f64,
    pub hours_until_start: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RefundAmounts {
    pub base_refund: f64,
    pub gateway_fee: f64,
    pub total_refund: f64,
}

#[derive(Debug, Clone)]
pub struct CancellationEligibility {
    pub allowed: bool,
    pub reason: Option<String>,
    pub refund_percentage: f64,
    pub has_payment: bool,
}

/// Tiered percentage-of-total refund schedule keyed by hours until start.
pub fn calculate_percentage(start_time: &DateTime<Utc>, now: &DateTime<Utc>) -> RefundQuote {
    let hours_until_start = (*start_time - *now).num_seconds() as f64 / 3600.0;

    if hours_until_start <= 0.0 {
        return RefundQuote {
            allowed: false,
            percentage: 0.0,
            hours_until_start,
            reason: Some("Check-in time has passed. Cancellation not allowed.".to_string()),
        };
    }

    if hours_until_start < MINIMUM_CANCELLATION_HOURS {
        return RefundQuote {
            allowed: false,
            percentage: 0.0,
            hours_until_start,
            reason: Some(format!(
                "Cancellation requires at least {MINIMUM_CANCELLATION_HOURS:.0} hours notice."
            )),
        };
    }

    let percentage = if hours_until_start > 48.0 {
        100.0
    } else if hours_until_start >= 24.0 {
        75.0
    } else if hours_until_start >= 6.0 {
        50.0
    } else {
        25.0
    };

    RefundQuote {
        allowed: true,
        percentage,
        hours_until_start,
        reason: None,
    }
}

/// Splits a total into refundable base, gateway fee and net refund (2dp).
pub fn calculate_amount(total_price: f64, refund_percentage: f64) -> RefundAmounts {
    let base_refund = total_price * refund_percentage / 100.0;
    let gateway_fee = total_price * GATEWAY_FEE_PERCENT / 100.0;
    let total_refund = (base_refund - gateway_fee).max(0.0);

    RefundAmounts {
        base_refund: round2(base_refund),
        gateway_fee: round2(gateway_fee),
        total_refund: round2(total_refund),
    }
}

/// Whether a booking may enter the cancellation workflow, and at what
/// refund percentage. Pending bookings carry no payment, so they are always
/// eligible at 0%; completed ones defer to the time-window schedule.
pub fn validate_cancellation(booking: &Booking, now: &DateTime<Utc>) -> CancellationEligibility {
    match booking.status {
        BookingStatus::Cancelled => refused("Booking is already cancelled."),
        BookingStatus::Failed | BookingStatus::Expired => refused(&format!(
            "Booking with status '{}' cannot be cancelled.",
            booking.status.as_str()
        )),
        BookingStatus::CancellationRequested => {
            refused("Cancellation is already in process for this booking.")
        }
        BookingStatus::Pending => CancellationEligibility {
            allowed: true,
            reason: None,
            refund_percentage: 0.0,
            has_payment: false,
        },
        BookingStatus::Completed => {
            let quote = calculate_percentage(&booking.start_time, now);
            if !quote.allowed {
                return CancellationEligibility {
                    allowed: false,
                    reason: quote.reason,
                    refund_percentage: 0.0,
                    has_payment: true,
                };
            }
            CancellationEligibility {
                allowed: true,
                reason: None,
                refund_percentage: quote.percentage,
                has_payment: true,
            }
        }
    }
}

pub fn should_flag_for_abuse(total_bookings: i64, total_cancellations: i64) -> (bool, f64) {
    if total_bookings == 0 {
        return (false, 0.0);
    }

    let rate = round2(total_cancellations as f64 / total_bookings as f64 * 100.0);
    (rate > ABUSE_THRESHOLD_PERCENT, rate)
}

pub fn cancellation_policy_message() -> String {
    format!(
        "Cancellation Policy:\n\
         - More than 48 hours before check-in: 100% refund\n\
         - 24-48 hours before check-in: 75% refund\n\
         - 6-24 hours before check-in: 50% refund\n\
         - 2-6 hours before check-in: 25% refund\n\
         - Less than 2 hours before check-in: Cancellation not allowed\n\n\
         Note: A {GATEWAY_FEE_PERCENT:.0}% payment gateway fee will be deducted from all refunds."
    )
}

fn refused(reason: &str) -> CancellationEligibility {
    CancellationEligibility {
        allowed: false,
        reason: Some(reason.to_string()),
        refund_percentage: 0.0,
        has_payment: false,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
