use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    OutOfHours(String),

    #[error("cannot book in the past")]
    PastBooking,

    #[error("time slot is already booked")]
    SlotTaken,

    #[error("room is not available")]
    ResourceUnavailable,

    #[error("branch is not active")]
    FacilityInactive,

    #[error("invalid or expired promo code")]
    InvalidPromoCode,

    #[error("you have already used this promo code")]
    PromoCodeExhausted,

    #[error("booking is already cancelled")]
    AlreadyCancelled,

    #[error("cannot cancel a completed booking; use the cancellation request workflow")]
    CannotCancelCompleted,

    #[error("{0}")]
    TooLateToCancel(String),

    #[error("no pending cancellation request for this booking")]
    NoPendingRequest,

    #[error("unauthorized")]
    Unauthorized,

    #[error("refund failed: {0}")]
    RefundFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::OutOfHours(_) => "out_of_hours",
            AppError::PastBooking => "past_booking",
            AppError::SlotTaken => "slot_taken",
            AppError::ResourceUnavailable => "resource_unavailable",
            AppError::FacilityInactive => "facility_inactive",
            AppError::InvalidPromoCode => "invalid_promo_code",
            AppError::PromoCodeExhausted => "promo_code_exhausted",
            AppError::AlreadyCancelled => "already_cancelled",
            AppError::CannotCancelCompleted => "cannot_cancel_completed",
            AppError::TooLateToCancel(_) => "too_late_to_cancel",
            AppError::NoPendingRequest => "no_pending_request",
            AppError::Unauthorized => "unauthorized",
            AppError::RefundFailed(_) => "refund_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_)
            | AppError::OutOfHours(_)
            | AppError::PastBooking
            | AppError::InvalidPromoCode => StatusCode::BAD_REQUEST,
            AppError::SlotTaken
            | AppError::PromoCodeExhausted
            | AppError::AlreadyCancelled
            | AppError::CannotCancelCompleted
            | AppError::TooLateToCancel(_)
            | AppError::NoPendingRequest => StatusCode::CONFLICT,
            AppError::ResourceUnavailable | AppError::FacilityInactive => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RefundFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string(), "kind": self.kind() });
        (status, axum::Json(body)).into_response()
    }
}
