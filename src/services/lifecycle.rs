use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingStatus, Branch, Payment, PaymentStatus, RefundStatus, Room,
};
use crate::services::refund::{self, RefundAmounts};
use crate::services::{abuse, hours, overlap, pricing};
use crate::state::AppState;

pub const USER_CANCEL_REASON: &str = "Cancelled by user";

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub room_id: String,
    pub start_time: String,
    pub end_time: String,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingConfirmation {
    pub booking: Booking,
    pub payment: Payment,
    pub price: pricing::PriceQuote,
}

#[derive(Debug, Serialize)]
pub struct CancellationRequestOutcome {
    pub booking: Booking,
    pub refund_estimate: Option<RefundAmounts>,
    pub owner_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApprovalOutcome {
    pub booking: Booking,
    pub amounts: RefundAmounts,
    pub refund_reference: Option<String>,
}

/// Validates and creates a pending booking with its payment record. Runs
/// inside one transaction under the shared connection lock, so the overlap
/// check and the insert cannot interleave with another writer.
pub fn create_booking(
    state: &AppState,
    customer_id: &str,
    req: &CreateBookingRequest,
) -> Result<BookingConfirmation, AppError> {
    let now = state.clock.now();
    let conn = state.db.lock().unwrap();
    let tx = conn.unchecked_transaction()?;

    let room = queries::get_room(&tx, &req.room_id)?
        .ok_or_else(|| AppError::NotFound(format!("room {}", req.room_id)))?;
    if !room.is_available {
        return Err(AppError::ResourceUnavailable);
    }

    let branch = queries::get_branch(&tx, &room.branch_id)?
        .ok_or_else(|| AppError::NotFound(format!("branch {}", room.branch_id)))?;
    if !branch.is_active {
        return Err(AppError::FacilityInactive);
    }

    let start = hours::parse_civil_timestamp(&req.start_time, branch.schedule.timezone)?;
    let end = hours::parse_civil_timestamp(&req.end_time, branch.schedule.timezone)?;

    if end <= start {
        return Err(AppError::Validation(
            "end time must be after start time".to_string(),
        ));
    }
    if start < now {
        return Err(AppError::PastBooking);
    }
    hours::validate_branch_hours(&branch.schedule, &start, &end)?;

    if overlap::has_blocking_overlap(
        &tx,
        &room.id,
        &start,
        &end,
        None,
        &now,
        state.payment_window(),
    )? {
        return Err(AppError::SlotTaken);
    }

    let price = pricing::quote(
        &tx,
        &room,
        customer_id,
        &start,
        &end,
        req.promo_code.as_deref(),
        &now,
    )?;

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        room_id: room.id.clone(),
        customer_id: customer_id.to_string(),
        start_time: start,
        end_time: end,
        status: BookingStatus::Pending,
        total_price: price.total_price,
        promotion_id: price.promotion_id.clone(),
        refund_percentage: None,
        cancellation_reason: None,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_requested_at: None,
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(&tx, &booking)?;

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        booking_id: booking.id.clone(),
        transaction_id: None,
        amount: price.total_price,
        payment_status: PaymentStatus::Pending,
        refund_status: RefundStatus::None,
        refund_amount: None,
        gateway_fee_amount: None,
        created_at: now,
    };
    queries::create_payment(&tx, &payment)?;

    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        room_id = %room.id,
        customer_id,
        total = price.total_price,
        "created pending booking"
    );

    Ok(BookingConfirmation {
        booking,
        payment,
        price,
    })
}

/// Opens a cancellation request for the customer's own booking. The refund
/// percentage is computed now, from the notice the customer actually gave,
/// and frozen on the row for the owner's approval step.
pub fn request_cancellation(
    state: &AppState,
    booking_id: &str,
    customer_id: &str,
    reason: Option<&str>,
) -> Result<CancellationRequestOutcome, AppError> {
    let now = state.clock.now();
    let conn = state.db.lock().unwrap();

    let booking = queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.customer_id != customer_id {
        return Err(AppError::Unauthorized);
    }

    let eligibility = refund::validate_cancellation(&booking, &now);
    if !eligibility.allowed {
        return Err(match booking.status {
            BookingStatus::Cancelled => AppError::AlreadyCancelled,
            BookingStatus::Completed => AppError::TooLateToCancel(
                eligibility.reason.unwrap_or_else(|| "too late to cancel".to_string()),
            ),
            _ => AppError::Validation(
                eligibility.reason.unwrap_or_else(|| "cannot cancel booking".to_string()),
            ),
        });
    }

    if !queries::set_cancellation_requested(
        &conn,
        booking_id,
        eligibility.refund_percentage,
        reason,
        customer_id,
        &now,
    )? {
        // Status moved underneath us between read and write.
        return Err(AppError::Validation(
            "booking can no longer be cancelled".to_string(),
        ));
    }

    let refund_estimate = eligibility
        .has_payment
        .then(|| refund::calculate_amount(booking.total_price, eligibility.refund_percentage));

    let (_, branch) = room_and_branch(&conn, &booking.room_id)?;
    let updated = queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    tracing::info!(
        booking_id,
        customer_id,
        refund_percentage = eligibility.refund_percentage,
        "cancellation requested"
    );

    Ok(CancellationRequestOutcome {
        booking: updated,
        refund_estimate,
        owner_id: branch.owner_id,
    })
}

/// Branch-owner approval of a cancellation request. The refund is claimed
/// under the connection lock before the gateway call, so a concurrent
/// approval of the same request fails fast instead of refunding twice; the
/// gateway itself is called with no lock held, and a failure releases the
/// claim for a retry.
pub async fn approve_cancellation(
    state: &AppState,
    booking_id: &str,
    approver_id: &str,
) -> Result<ApprovalOutcome, AppError> {
    let now = state.clock.now();

    // Phase 1: validate, and claim the refund before dropping the lock.
    let (booking, amounts, refund_target) = {
        let conn = state.db.lock().unwrap();

        let booking = queries::get_booking_by_id(&conn, booking_id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
        if booking.status != BookingStatus::CancellationRequested {
            return Err(AppError::NoPendingRequest);
        }

        let (_, branch) = room_and_branch(&conn, &booking.room_id)?;
        if branch.owner_id != approver_id {
            return Err(AppError::Unauthorized);
        }

        let percentage = booking.refund_percentage.unwrap_or(0.0);
        let amounts = refund::calculate_amount(booking.total_price, percentage);

        let payment = queries::get_payment_for_booking(&conn, booking_id)?;
        let refund_target = payment.and_then(|p| {
            (p.payment_status == PaymentStatus::Completed && amounts.total_refund > 0.0)
                .then_some(p.transaction_id)
                .flatten()
        });

        if refund_target.is_some() && !queries::claim_refund_processing(&conn, booking_id)? {
            return Err(AppError::RefundFailed(
                "a refund is already being processed for this booking".to_string(),
            ));
        }

        (booking, amounts, refund_target)
    };

    // Phase 2: talk to the gateway with no lock held. On failure the claim
    // is released and the request stays open for a retry.
    let refund_reference = match &refund_target {
        Some(transaction_id) => {
            let result = state
                .gateway
                .refund(transaction_id, amounts.total_refund, amounts.gateway_fee)
                .await;
            match result {
                Ok(receipt) => Some(receipt.reference),
                Err(e) => {
                    let conn = state.db.lock().unwrap();
                    queries::release_refund_claim(&conn, booking_id)?;
                    return Err(AppError::RefundFailed(e.to_string()));
                }
            }
        }
        None => None,
    };

    // Phase 3: commit the cancellation, guarded on the request still being
    // open. Losing that race after a successful refund is logged loudly.
    let conn = state.db.lock().unwrap();
    let tx = conn.unchecked_transaction()?;

    if !queries::mark_cancelled(&tx, booking_id, BookingStatus::CancellationRequested, &now)? {
        if refund_reference.is_some() {
            tracing::error!(
                booking_id,
                reference = ?refund_reference,
                "refund issued but cancellation request no longer open"
            );
        }
        return Err(AppError::NoPendingRequest);
    }

    if refund_reference.is_some() {
        queries::record_refund_result(
            &tx,
            booking_id,
            RefundStatus::Completed,
            amounts.total_refund,
            amounts.gateway_fee,
        )?;
    }

    release_code_promo_usage(&tx, &booking)?;
    abuse::recompute(&tx, &booking.customer_id, &now)?;

    tx.commit()?;

    let booking = queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    tracing::info!(
        booking_id,
        approver_id,
        refund = amounts.total_refund,
        "cancellation approved"
    );

    Ok(ApprovalOutcome {
        booking,
        amounts,
        refund_reference,
    })
}

/// Branch-owner rejection: the booking returns to completed with the
/// request audit fields cleared and the reason prefixed REJECTED.
pub fn reject_cancellation(
    state: &AppState,
    booking_id: &str,
    approver_id: &str,
    reason: Option<&str>,
) -> Result<Booking, AppError> {
    let now = state.clock.now();
    let conn = state.db.lock().unwrap();

    let booking = queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.status != BookingStatus::CancellationRequested {
        return Err(AppError::NoPendingRequest);
    }

    let (_, branch) = room_and_branch(&conn, &booking.room_id)?;
    if branch.owner_id != approver_id {
        return Err(AppError::Unauthorized);
    }

    if !queries::revert_cancellation_request(&conn, booking_id, reason, &now)? {
        return Err(AppError::NoPendingRequest);
    }

    tracing::info!(booking_id, approver_id, "cancellation request rejected");

    queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

/// Direct cancellation of an unpaid pending booking. Paid bookings must go
/// through the request/approval workflow instead.
pub fn cancel_booking(
    state: &AppState,
    booking_id: &str,
    actor_id: &str,
    actor_role: &str,
) -> Result<Booking, AppError> {
    let now = state.clock.now();
    let conn = state.db.lock().unwrap();

    let booking = queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    let (_, branch) = room_and_branch(&conn, &booking.room_id)?;
    let authorized =
        booking.customer_id == actor_id || branch.owner_id == actor_id || actor_role == "admin";
    if !authorized {
        return Err(AppError::Unauthorized);
    }

    match booking.status {
        BookingStatus::Cancelled | BookingStatus::Expired => {
            return Err(AppError::AlreadyCancelled)
        }
        BookingStatus::Completed => return Err(AppError::CannotCancelCompleted),
        BookingStatus::CancellationRequested => {
            return Err(AppError::Validation(
                "cancellation is already in process for this booking".to_string(),
            ))
        }
        BookingStatus::Failed => {
            return Err(AppError::Validation(
                "a failed booking cannot be cancelled".to_string(),
            ))
        }
        BookingStatus::Pending => {}
    }

    let tx = conn.unchecked_transaction()?;
    if !queries::cancel_pending(&tx, booking_id, actor_id, USER_CANCEL_REASON, &now)? {
        return Err(AppError::AlreadyCancelled);
    }
    queries::expire_payment_if_pending(&tx, booking_id)?;
    release_code_promo_usage(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(booking_id, actor_id, "pending booking cancelled");

    queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

pub fn pending_cancellation_requests(
    state: &AppState,
    owner_id: &str,
) -> Result<Vec<Booking>, AppError> {
    let conn = state.db.lock().unwrap();
    Ok(queries::pending_cancellation_requests(&conn, owner_id)?)
}

pub fn get_booking(state: &AppState, booking_id: &str) -> Result<Booking, AppError> {
    let conn = state.db.lock().unwrap();
    queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

pub fn user_bookings(
    state: &AppState,
    customer_id: &str,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<Booking>, AppError> {
    let conn = state.db.lock().unwrap();
    Ok(queries::get_user_bookings(&conn, customer_id, status, limit)?)
}

pub fn room_bookings(
    state: &AppState,
    room_id: &str,
    date: Option<NaiveDate>,
) -> Result<Vec<Booking>, AppError> {
    let conn = state.db.lock().unwrap();
    queries::get_room(&conn, room_id)?
        .ok_or_else(|| AppError::NotFound(format!("room {room_id}")))?;
    Ok(queries::get_room_bookings(&conn, room_id, date)?)
}

#[derive(Debug, Serialize)]
pub struct OccupiedSlot {
    pub booking_id: String,
    pub room_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub slot: String,
    pub duration_hours: f64,
    pub is_current: bool,
    pub status: String,
}

pub enum OccupiedScope<'a> {
    Room(&'a str),
    Branch(&'a str),
}

/// Occupied time slots for a room or every room of a branch, formatted for
/// display. Without a date filter only current and future slots appear.
pub fn occupied_times(
    state: &AppState,
    scope: OccupiedScope<'_>,
    date: Option<NaiveDate>,
    status: Option<&str>,
) -> Result<Vec<OccupiedSlot>, AppError> {
    let now = state.clock.now();
    let conn = state.db.lock().unwrap();

    let room_ids = match scope {
        OccupiedScope::Room(room_id) => {
            queries::get_room(&conn, room_id)?
                .ok_or_else(|| AppError::NotFound(format!("room {room_id}")))?;
            vec![room_id.to_string()]
        }
        OccupiedScope::Branch(branch_id) => {
            let ids = queries::room_ids_for_branch(&conn, branch_id)?;
            if ids.is_empty() {
                return Err(AppError::NotFound(format!(
                    "no rooms found for branch {branch_id}"
                )));
            }
            ids
        }
    };

    let status = status.unwrap_or("completed");
    let bookings = queries::occupied_bookings(&conn, &room_ids, date, status, &now)?;

    Ok(bookings
        .into_iter()
        .map(|b| {
            let duration_hours =
                (b.end_time - b.start_time).num_seconds() as f64 / 3600.0;
            OccupiedSlot {
                slot: format!(
                    "{} - {}",
                    b.start_time.format("%Y-%m-%d %H:%M"),
                    b.end_time.format("%H:%M")
                ),
                duration_hours: (duration_hours * 100.0).round() / 100.0,
                is_current: b.start_time <= now && now < b.end_time,
                booking_id: b.id,
                room_id: b.room_id,
                start_time: b.start_time,
                end_time: b.end_time,
                status: b.status.as_str().to_string(),
            }
        })
        .collect())
}

fn room_and_branch(
    conn: &rusqlite::Connection,
    room_id: &str,
) -> Result<(Room, Branch), AppError> {
    let room = queries::get_room(conn, room_id)?
        .ok_or_else(|| AppError::NotFound(format!("room {room_id}")))?;
    let branch = queries::get_branch(conn, &room.branch_id)?
        .ok_or_else(|| AppError::NotFound(format!("branch {}", room.branch_id)))?;
    Ok((room, branch))
}

/// Promo-code slots are returned when the booking dies; automatic
/// promotions have no usage rows to reverse.
fn release_code_promo_usage(
    conn: &rusqlite::Connection,
    booking: &Booking,
) -> Result<(), AppError> {
    if let Some(promotion_id) = &booking.promotion_id {
        if let Some(promotion) = queries::get_promotion(conn, promotion_id)? {
            if promotion.promo_code.is_some() {
                queries::release_promo_usage(conn, &booking.customer_id, promotion_id)?;
            }
        }
    }
    Ok(())
}
