use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::{Booking, BookingEvent};
use crate::state::AppState;

/// Stored on every booking the payment-window sweep expires.
pub const EXPIRY_REASON: &str =
    "Auto-cancelled: Payment not received within 5 minutes of booking creation";

#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub expired: usize,
    pub events: Vec<BookingEvent>,
}

/// Expires one overdue pending booking: status-guarded booking transition,
/// payment marked expired if still pending, promo-code usage returned.
/// Returns false when the booking was no longer pending (lost a race with
/// the other expiration path), in which case nothing is touched.
pub fn expire_booking(
    conn: &Connection,
    booking: &Booking,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    if !queries::mark_expired_if_pending(conn, &booking.id, now, EXPIRY_REASON)? {
        return Ok(false);
    }

    queries::expire_payment_if_pending(conn, &booking.id)?;

    if let Some(promotion_id) = &booking.promotion_id {
        if let Some(promotion) = queries::get_promotion(conn, promotion_id)? {
            if promotion.promo_code.is_some() {
                queries::release_promo_usage(conn, &booking.customer_id, promotion_id)?;
                tracing::info!(
                    customer_id = %booking.customer_id,
                    promotion_id = %promotion_id,
                    "returned promo code usage for expired booking"
                );
            }
        }
    }

    Ok(true)
}

/// One reaper pass: expire every pending booking whose payment window has
/// lapsed. Each expiration runs in its own transaction, so the booking
/// transition and the promo-usage return land together or not at all, and
/// per-booking failures are logged and skipped so one bad row cannot abort
/// the whole sweep.
pub fn sweep(conn: &Connection, now: &DateTime<Utc>, payment_window: Duration) -> SweepOutcome {
    let cutoff = *now - payment_window;

    let stale = match queries::expired_pending_bookings(conn, &cutoff) {
        Ok(bookings) => bookings,
        Err(e) => {
            tracing::error!(error = %e, "failed to query overdue pending bookings");
            return SweepOutcome::default();
        }
    };

    let mut outcome = SweepOutcome::default();
    for booking in stale {
        let expired = conn
            .unchecked_transaction()
            .map_err(anyhow::Error::from)
            .and_then(|tx| {
                let expired = expire_booking(&tx, &booking, now)?;
                tx.commit()?;
                Ok(expired)
            });
        match expired {
            Ok(true) => {
                outcome.expired += 1;
                outcome.events.push(BookingEvent::expired(
                    &booking.id,
                    &booking.room_id,
                    &booking.customer_id,
                    EXPIRY_REASON,
                    *now,
                ));
            }
            Ok(false) => {} // already handled by a concurrent overlap check
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "failed to expire booking, skipping");
            }
        }
    }

    if outcome.expired > 0 {
        tracing::info!(expired = outcome.expired, "expired overdue pending bookings");
    }
    outcome
}

/// Periodic reaper task. Each tick runs a sweep and broadcasts an event per
/// expired booking for the notification layer to deliver.
pub async fn run(state: Arc<AppState>) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(state.config.reaper_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(
        interval_secs = state.config.reaper_interval_secs,
        window_minutes = state.config.payment_window_minutes,
        "booking expiration reaper started"
    );

    loop {
        interval.tick().await;

        let now = state.clock.now();
        let window = state.payment_window();
        let outcome = {
            let db = state.db.lock().unwrap();
            sweep(&db, &now, window)
        };

        for event in outcome.events {
            // Send only fails when nobody is subscribed, which is fine.
            let _ = state.events_tx.send(event);
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NearExpiry {
    pub booking_id: String,
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub seconds_until_expiry: i64,
}

/// Pending bookings that will hit the payment deadline within the next
/// `minutes_from_now` minutes. Monitoring aid, no side effects.
pub fn pending_near_expiry(
    conn: &Connection,
    now: &DateTime<Utc>,
    payment_window_minutes: i64,
    minutes_from_now: i64,
) -> anyhow::Result<Vec<NearExpiry>> {
    let bookings =
        queries::pending_near_expiry(conn, now, payment_window_minutes, minutes_from_now)?;

    Ok(bookings
        .into_iter()
        .map(|b| {
            let expires_at = b.created_at + Duration::minutes(payment_window_minutes);
            NearExpiry {
                booking_id: b.id,
                room_id: b.room_id,
                created_at: b.created_at,
                start_time: b.start_time,
                expires_at,
                seconds_until_expiry: (expires_at - *now).num_seconds(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{
        Booking, BookingStatus, Branch, BranchSchedule, Payment, PaymentStatus, Promotion,
        PromotionTarget, RefundStatus, Room,
    };

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        let branch = Branch {
            id: "branch-1".to_string(),
            branch_name: "Central".to_string(),
            owner_id: "owner-1".to_string(),
            is_active: true,
            schedule: BranchSchedule::from_row(
                "mon,tue,wed,thu,fri,sat,sun",
                "00:00",
                "23:59",
                "Asia/Phnom_Penh",
            )
            .unwrap(),
        };
        queries::create_branch(&conn, &branch).unwrap();
        queries::create_room(
            &conn,
            &Room {
                id: "room-1".to_string(),
                branch_id: "branch-1".to_string(),
                room_no: "A1".to_string(),
                price_per_hour: 10.0,
                is_available: true,
            },
        )
        .unwrap();
        conn
    }

    fn seed_pending(
        conn: &Connection,
        id: &str,
        created_at: DateTime<Utc>,
        promotion_id: Option<&str>,
    ) -> Booking {
        let booking = Booking {
            id: id.to_string(),
            room_id: "room-1".to_string(),
            customer_id: "cust-1".to_string(),
            start_time: created_at + Duration::hours(24),
            end_time: created_at + Duration::hours(25),
            status: BookingStatus::Pending,
            total_price: 10.0,
            promotion_id: promotion_id.map(|p| p.to_string()),
            refund_percentage: None,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_requested_at: None,
            created_at,
            updated_at: created_at,
        };
        queries::create_booking(conn, &booking).unwrap();
        booking
    }

    fn seed_code_promotion(conn: &Connection, now: DateTime<Utc>) {
        let promotion = Promotion {
            id: "promo-1".to_string(),
            title: "Welcome".to_string(),
            discount_percent: 10.0,
            target_type: PromotionTarget::Global,
            promo_code: Some("WELCOME10".to_string()),
            room_id: None,
            branch_id: None,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(30),
            per_user_limit: 1,
            is_active: true,
        };
        queries::create_promotion(conn, &promotion).unwrap();
    }

    #[test]
    fn test_sweep_expires_overdue_pending() {
        let conn = setup_db();
        let now = Utc::now();
        seed_pending(&conn, "b-1", now - Duration::minutes(6), None);
        seed_pending(&conn, "b-2", now - Duration::minutes(1), None);

        let outcome = sweep(&conn, &now, Duration::minutes(5));
        assert_eq!(outcome.expired, 1);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].booking_id, "b-1");

        let expired = queries::get_booking_by_id(&conn, "b-1").unwrap().unwrap();
        assert_eq!(expired.status, BookingStatus::Expired);
        assert_eq!(
            expired.cancellation_reason.as_deref(),
            Some("Auto-cancelled: Payment not received within 5 minutes of booking creation")
        );

        let fresh = queries::get_booking_by_id(&conn, "b-2").unwrap().unwrap();
        assert_eq!(fresh.status, BookingStatus::Pending);
    }

    #[test]
    fn test_sweep_marks_pending_payment_expired() {
        let conn = setup_db();
        let now = Utc::now();
        seed_pending(&conn, "b-1", now - Duration::minutes(10), None);
        queries::create_payment(
            &conn,
            &Payment {
                id: "pay-1".to_string(),
                booking_id: "b-1".to_string(),
                transaction_id: None,
                amount: 10.0,
                payment_status: PaymentStatus::Pending,
                refund_status: RefundStatus::None,
                refund_amount: None,
                gateway_fee_amount: None,
                created_at: now,
            },
        )
        .unwrap();

        sweep(&conn, &now, Duration::minutes(5));

        let payment = queries::get_payment_for_booking(&conn, "b-1")
            .unwrap()
            .unwrap();
        assert_eq!(payment.payment_status, PaymentStatus::Expired);
    }

    #[test]
    fn test_second_sweep_is_noop() {
        let conn = setup_db();
        let now = Utc::now();
        seed_code_promotion(&conn, now);
        seed_pending(&conn, "b-1", now - Duration::minutes(10), Some("promo-1"));
        queries::record_promo_usage(&conn, "cust-1", "promo-1", &now).unwrap();

        let first = sweep(&conn, &now, Duration::minutes(5));
        assert_eq!(first.expired, 1);
        assert_eq!(
            queries::promo_usage_count(&conn, "cust-1", "promo-1").unwrap(),
            0
        );

        // A usage recorded after the first sweep must survive the second:
        // re-expiring an already-expired booking cannot double-reverse.
        queries::record_promo_usage(&conn, "cust-1", "promo-1", &now).unwrap();
        let second = sweep(&conn, &now, Duration::minutes(5));
        assert_eq!(second.expired, 0);
        assert_eq!(
            queries::promo_usage_count(&conn, "cust-1", "promo-1").unwrap(),
            1
        );
    }

    #[test]
    fn test_expire_booking_rolls_back_as_a_unit() {
        let conn = setup_db();
        let now = Utc::now();
        seed_code_promotion(&conn, now);
        let booking = seed_pending(&conn, "b-1", now - Duration::minutes(10), Some("promo-1"));
        queries::record_promo_usage(&conn, "cust-1", "promo-1", &now).unwrap();

        // All of expire_booking's statements must run on the caller's
        // transaction: a rollback leaves the booking pending with its promo
        // usage intact, never an expired booking that still holds the usage.
        {
            let tx = conn.unchecked_transaction().unwrap();
            assert!(expire_booking(&tx, &booking, &now).unwrap());
            drop(tx);
        }

        let after = queries::get_booking_by_id(&conn, "b-1").unwrap().unwrap();
        assert_eq!(after.status, BookingStatus::Pending);
        assert_eq!(
            queries::promo_usage_count(&conn, "cust-1", "promo-1").unwrap(),
            1
        );

        // The real sweep then expires it for good.
        let outcome = sweep(&conn, &now, Duration::minutes(5));
        assert_eq!(outcome.expired, 1);
        assert_eq!(
            queries::promo_usage_count(&conn, "cust-1", "promo-1").unwrap(),
            0
        );
    }

    #[test]
    fn test_near_expiry_window() {
        let conn = setup_db();
        let now = Utc::now();
        seed_pending(&conn, "soon", now - Duration::minutes(3), None);
        seed_pending(&conn, "late", now - Duration::minutes(10), None);
        seed_pending(&conn, "fresh", now - Duration::seconds(10), None);

        let near = pending_near_expiry(&conn, &now, 5, 10).unwrap();
        let ids: Vec<&str> = near.iter().map(|n| n.booking_id.as_str()).collect();
        assert!(ids.contains(&"soon"));
        assert!(ids.contains(&"fresh"));
        assert!(!ids.contains(&"late"));

        let soon = near.iter().find(|n| n.booking_id == "soon").unwrap();
        assert!(soon.seconds_until_expiry <= 2 * 60);
        assert!(soon.seconds_until_expiry > 0);
    }
}
