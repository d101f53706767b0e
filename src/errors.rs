use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;
use crate::services::i18n::{Locale, Translator};

/// Every failure a use case can surface. Each variant owns a stable message
/// key (`code`) and an HTTP status; storage details stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Validation ──
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid room id {0}")]
    InvalidRoomId(i64),

    #[error("end date must be after start date")]
    InvalidDateRange,

    #[error("start date is in the past")]
    StartDateInPast,

    #[error("client ip is missing")]
    MissingClientIp,

    #[error("client ip {0:?} is not a valid address")]
    InvalidClientIp(String),

    #[error("invalid payment amount {0}")]
    InvalidAmount(i64),

    #[error("payment amount {0} exceeds provider limit")]
    AmountExceedsLimit(i64),

    #[error("unknown booking status {0:?}")]
    InvalidStatus(String),

    #[error("rating {0} is outside 1..=5")]
    InvalidRating(i32),

    #[error("invalid payment callback parameters")]
    InvalidCallback,

    // ── Not found ──
    #[error("room {0} not found")]
    RoomNotFound(i64),

    #[error("booking {0} not found")]
    BookingNotFound(i64),

    #[error("payment {0} not found")]
    PaymentNotFound(String),

    #[error("staff member {0} not found")]
    StaffNotFound(i64),

    // ── Conflict ──
    #[error("room {0} is not available for the requested dates")]
    RoomNotAvailable(i64),

    #[error("booking {0} has already been paid")]
    BookingAlreadyPaid(i64),

    #[error("payment {0} has already been processed")]
    PaymentAlreadyProcessed(String),

    #[error("booking {id} cannot be cancelled while {status}")]
    BookingNotCancellable { id: i64, status: BookingStatus },

    #[error("booking {id} is {status} and can no longer change status")]
    BookingStatusLocked { id: i64, status: BookingStatus },

    #[error("booking {0} has not been checked out")]
    BookingNotCheckedOut(i64),

    #[error("booking {0} has already been reviewed")]
    ReviewAlreadyExists(i64),

    #[error("email {0:?} is already registered")]
    EmailExists(String),

    #[error("room {0} is referenced by bookings")]
    RoomHasBookings(i64),

    // ── Auth ──
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid payment signature")]
    InvalidSignature,

    // ── Infrastructure ──
    #[error("failed to look up price of room {0}")]
    PriceLookupFailed(i64),

    #[error("failed to create booking")]
    BookingInsertFailed,

    #[error("failed to create payment url: {0}")]
    PaymentUrlCreationFailed(String),

    #[error("failed to update booking {0}")]
    BookingUpdateFailed(i64),

    #[error("failed to update payment {0}")]
    PaymentUpdateFailed(String),

    #[error("failed to create bill for booking {0}")]
    BillCreationFailed(i64),

    #[error("failed to commit transaction")]
    CommitFailed,

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl AppError {
    /// Stable identifier, also used as the translation key.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "error.invalid_request",
            AppError::InvalidRoomId(_) => "error.invalid_room_id",
            AppError::InvalidDateRange => "error.start_date_must_be_before_end_date",
            AppError::StartDateInPast => "error.start_date_must_be_today_or_future",
            AppError::MissingClientIp => "error.invalid_client_ip",
            AppError::InvalidClientIp(_) => "error.invalid_ip_address",
            AppError::InvalidAmount(_) => "error.invalid_amount",
            AppError::AmountExceedsLimit(_) => "error.amount_exceeds_limit",
            AppError::InvalidStatus(_) => "error.invalid_booking_status",
            AppError::InvalidRating(_) => "error.invalid_rating",
            AppError::InvalidCallback => "error.invalid_vnpay_callback_parameters",
            AppError::RoomNotFound(_) => "error.room_not_found",
            AppError::BookingNotFound(_) => "error.booking_not_found",
            AppError::PaymentNotFound(_) => "error.payment_not_found",
            AppError::RoomNotAvailable(_) => "error.room_is_not_available",
            AppError::BookingAlreadyPaid(_) => "error.booking_has_paid",
            AppError::PaymentAlreadyProcessed(_) => "error.payment_already_processed",
            AppError::BookingNotCancellable { .. } => "error.failed_to_cancel_booking",
            AppError::BookingStatusLocked { status, .. } => match status {
                BookingStatus::CheckedOut => {
                    "error.failed_to_update_booking_status_because_checked_out"
                }
                BookingStatus::Cancelled => {
                    "error.failed_to_update_booking_status_because_cancelled"
                }
                _ => "error.failed_to_update_booking_status_because_no_show",
            },
            AppError::BookingNotCheckedOut(_) => "error.booking_not_checked_out",
            AppError::ReviewAlreadyExists(_) => "error.review_already_exists",
            AppError::StaffNotFound(_) => "error.staff_not_found",
            AppError::EmailExists(_) => "error.email_exists",
            AppError::RoomHasBookings(_) => "error.room_has_bookings",
            AppError::Unauthorized => "error.unauthorized",
            AppError::Forbidden => "error.forbidden",
            AppError::InvalidSignature => "error.invalid_signature",
            AppError::PriceLookupFailed(_) => "error.failed_to_get_room_price",
            AppError::BookingInsertFailed => "error.failed_to_create_booking",
            AppError::PaymentUrlCreationFailed(_) => "error.failed_to_create_vnpay_payment",
            AppError::BookingUpdateFailed(_) => "error.failed_to_update_booking",
            AppError::PaymentUpdateFailed(_) => "error.failed_to_update_payment",
            AppError::BillCreationFailed(_) => "error.failed_to_create_bill",
            AppError::CommitFailed => "error.failed_to_commit_transaction",
            AppError::Storage(_) => "error.internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_)
            | AppError::InvalidRoomId(_)
            | AppError::InvalidDateRange
            | AppError::StartDateInPast
            | AppError::MissingClientIp
            | AppError::InvalidClientIp(_)
            | AppError::InvalidAmount(_)
            | AppError::AmountExceedsLimit(_)
            | AppError::InvalidStatus(_)
            | AppError::InvalidRating(_)
            | AppError::InvalidCallback => StatusCode::BAD_REQUEST,

            AppError::RoomNotFound(_)
            | AppError::BookingNotFound(_)
            | AppError::PaymentNotFound(_)
            | AppError::StaffNotFound(_) => StatusCode::NOT_FOUND,

            AppError::RoomNotAvailable(_)
            | AppError::BookingAlreadyPaid(_)
            | AppError::PaymentAlreadyProcessed(_)
            | AppError::BookingNotCancellable { .. }
            | AppError::BookingStatusLocked { .. }
            | AppError::BookingNotCheckedOut(_)
            | AppError::ReviewAlreadyExists(_)
            | AppError::EmailExists(_)
            | AppError::RoomHasBookings(_) => StatusCode::CONFLICT,

            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::InvalidSignature => StatusCode::FORBIDDEN,

            AppError::PriceLookupFailed(_)
            | AppError::BookingInsertFailed
            | AppError::PaymentUrlCreationFailed(_)
            | AppError::BookingUpdateFailed(_)
            | AppError::PaymentUpdateFailed(_)
            | AppError::BillCreationFailed(_)
            | AppError::CommitFailed
            | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render with a translated message for the caller's locale.
    pub fn localized(self, i18n: &Translator, locale: Locale) -> Response {
        if self.status().is_server_error() {
            tracing::error!(error = ?self, code = self.code(), "request failed");
        }
        let code = self.code();
        let body = serde_json::json!({
            "code": code,
            "error": i18n.t(locale, code),
        });
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Storage(e)
    }
}
