pub mod vnpay;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, PaymentStatus};

pub use vnpay::VnpayGateway;

/// What the gateway needs to build a checkout link.
#[derive(Debug, Clone)]
pub struct CheckoutOrder<'a> {
    pub txn_ref: &'a str,
    pub booking_id: i64,
    pub amount: i64,
    pub client_ip: &'a str,
    pub order_type: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Fields extracted from a verified provider redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCallback {
    pub txn_ref: String,
    pub response_code: String,
    pub transaction_no: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("amount {0} must be positive")]
    InvalidAmount(i64),
    #[error("amount {0} exceeds provider limit")]
    AmountExceedsLimit(i64),
    #[error("client ip is missing")]
    MissingClientIp,
    #[error("client ip {0:?} is not a valid address")]
    InvalidClientIp(String),
    #[error("signature does not match")]
    InvalidSignature,
    #[error("callback is missing {0}")]
    MissingCallbackParam(&'static str),
    #[error("failed to initialise signer")]
    Signing,
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidAmount(amount) => AppError::InvalidAmount(amount),
            GatewayError::AmountExceedsLimit(amount) => AppError::AmountExceedsLimit(amount),
            GatewayError::MissingClientIp => AppError::MissingClientIp,
            GatewayError::InvalidClientIp(ip) => AppError::InvalidClientIp(ip),
            GatewayError::InvalidSignature => AppError::InvalidSignature,
            GatewayError::MissingCallbackParam(_) => AppError::InvalidCallback,
            GatewayError::Signing => {
                AppError::PaymentUrlCreationFailed("failed to initialise signer".into())
            }
        }
    }
}

/// A hosted-checkout payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Stored in `payments.method`.
    fn method(&self) -> &'static str;

    fn checkout_url(&self, order: &CheckoutOrder<'_>) -> Result<String, GatewayError>;

    /// Verifies the signature on a return/IPN request and pulls out the fields
    /// reconciliation needs.
    fn parse_callback(&self, params: &HashMap<String, String>)
        -> Result<ProviderCallback, GatewayError>;

    fn is_success(&self, callback: &ProviderCallback) -> bool;
}

/// Issues a checkout URL for an unpaid booking and records the pending
/// payment. Runs on whatever transaction the caller holds.
pub fn create_payment_url(
    conn: &Connection,
    gateway: &dyn PaymentGateway,
    booking_id: i64,
    client_ip: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let booking =
        queries::get_booking(conn, booking_id)?.ok_or(AppError::BookingNotFound(booking_id))?;
    if booking.is_paid {
        return Err(AppError::BookingAlreadyPaid(booking_id));
    }

    let txn_ref = format!("{}-{}", booking.id, Uuid::new_v4());
    let url = gateway.checkout_url(&CheckoutOrder {
        txn_ref: &txn_ref,
        booking_id: booking.id,
        amount: booking.total_price,
        client_ip,
        order_type: vnpay::HOTEL_ORDER_TYPE,
        created_at: now,
    })?;

    queries::insert_payment(
        conn,
        booking.id,
        gateway.method(),
        &txn_ref,
        booking.total_price,
        &now,
    )
    .map_err(|e| {
        error!(booking_id, error = %e, "failed to record pending payment");
        AppError::PaymentUrlCreationFailed("failed to record payment".into())
    })?;

    info!(booking_id, txn_ref = %txn_ref, amount = booking.total_price, "payment url issued");
    Ok(url)
}

/// Standalone checkout for a booking the caller already owns, used to retry
/// after an abandoned or failed payment.
pub fn request_payment(
    db: &mut Connection,
    gateway: &dyn PaymentGateway,
    booking_id: i64,
    user_id: i64,
    client_ip: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let tx = db
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::Storage(e.into()))?;

    if queries::get_booking_for_user(&tx, booking_id, user_id)?.is_none() {
        return Err(AppError::BookingNotFound(booking_id));
    }
    let url = create_payment_url(&tx, gateway, booking_id, client_ip, now)?;

    tx.commit().map_err(|e| {
        error!(booking_id, error = %e, "failed to commit payment request");
        AppError::CommitFailed
    })?;
    Ok(url)
}

/// Applies a verified provider result to the payment, its booking and the
/// bill, all in one immediate transaction. A payment is settled at most once.
pub fn handle_callback(
    db: &mut Connection,
    gateway: &dyn PaymentGateway,
    callback: &ProviderCallback,
    now: DateTime<Utc>,
) -> Result<PaymentStatus, AppError> {
    let tx = db
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::Storage(e.into()))?;

    let txn_ref = callback.txn_ref.as_str();
    let payment = queries::get_payment_by_txn_ref(&tx, txn_ref)?
        .ok_or_else(|| AppError::PaymentNotFound(txn_ref.to_string()))?;
    let booking = queries::get_booking(&tx, payment.booking_id)?
        .ok_or(AppError::BookingNotFound(payment.booking_id))?;

    if payment.status != PaymentStatus::Pending {
        warn!(txn_ref, status = payment.status.as_str(), "duplicate payment callback");
        return Err(AppError::PaymentAlreadyProcessed(txn_ref.to_string()));
    }

    let outcome = if gateway.is_success(callback) {
        if booking.is_paid {
            warn!(txn_ref, booking_id = booking.id, "second successful payment for paid booking");
            return Err(AppError::BookingAlreadyPaid(booking.id));
        }

        let updated = queries::update_booking_state(&tx, booking.id, BookingStatus::Booked, true, &now)
            .map_err(|e| {
                error!(booking_id = booking.id, error = %e, "failed to mark booking paid");
                AppError::BookingUpdateFailed(booking.id)
            })?;
        if !updated {
            return Err(AppError::BookingUpdateFailed(booking.id));
        }

        queries::insert_bill(&tx, booking.id, booking.total_price, &now).map_err(|e| {
            error!(booking_id = booking.id, error = %e, "failed to create bill");
            AppError::BillCreationFailed(booking.id)
        })?;
        PaymentStatus::Success
    } else {
        PaymentStatus::Failed
    };

    let settled = queries::settle_payment(
        &tx,
        payment.id,
        outcome,
        Some(callback.transaction_no.as_str()),
        &now,
    )
    .map_err(|e| {
        error!(txn_ref, error = %e, "failed to settle payment");
        AppError::PaymentUpdateFailed(txn_ref.to_string())
    })?;
    if !settled {
        return Err(AppError::PaymentAlreadyProcessed(txn_ref.to_string()));
    }

    tx.commit().map_err(|e| {
        error!(txn_ref, error = %e, "failed to commit payment callback");
        AppError::CommitFailed
    })?;

    info!(
        txn_ref,
        booking_id = booking.id,
        response_code = %callback.response_code,
        status = outcome.as_str(),
        "payment reconciled"
    );
    Ok(outcome)
}
