use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db::queries::{self, BookedRoom, NewBooking};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::availability;
use crate::services::payment::{self, vnpay, PaymentGateway};
use crate::services::pricing::{price_for, StayRange};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub room_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookingHistoryEntry {
    pub id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_price: i64,
    pub status: BookingStatus,
    pub is_paid: bool,
    pub rooms: Vec<BookedRoom>,
}

fn validate(
    req: &CreateBookingRequest,
    client_ip: &str,
    now: DateTime<Utc>,
) -> Result<StayRange, AppError> {
    vnpay::normalize_client_ip(client_ip)?;
    if req.room_ids.is_empty() {
        return Err(AppError::InvalidRequest("room_ids must not be empty".into()));
    }
    let mut seen = HashSet::new();
    for &room_id in &req.room_ids {
        if room_id <= 0 || !seen.insert(room_id) {
            return Err(AppError::InvalidRoomId(room_id));
        }
    }

    let range = StayRange::new(req.start_date.trunc_subsecs(0), req.end_date.trunc_subsecs(0))?;
    if range.start() < now.trunc_subsecs(0) {
        return Err(AppError::StartDateInPast);
    }
    Ok(range)
}

/// Reserves every requested room for one stay and issues a checkout URL.
///
/// Availability checks, price capture, the booking rows and the pending
/// payment all share one immediate transaction: either everything is
/// persisted or nothing is. The booking stays `pending` and unpaid until the
/// provider confirms payment.
pub fn create_booking(
    db: &mut Connection,
    gateway: &dyn PaymentGateway,
    user_id: i64,
    req: &CreateBookingRequest,
    client_ip: &str,
    now: DateTime<Utc>,
) -> Result<(Booking, String), AppError> {
    let range = validate(req, client_ip, now)?;

    let tx = db
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::Storage(e.into()))?;

    let mut lines = Vec::with_capacity(req.room_ids.len());
    let mut total: i64 = 0;
    for &room_id in &req.room_ids {
        if !availability::is_room_available(&tx, room_id, &range)? {
            return Err(AppError::RoomNotAvailable(room_id));
        }

        let (rate, bookable) = queries::get_room_rate(&tx, room_id)
            .map_err(|e| {
                error!(room_id, error = %e, "failed to look up room price");
                AppError::PriceLookupFailed(room_id)
            })?
            .ok_or(AppError::RoomNotFound(room_id))?;
        if !bookable {
            return Err(AppError::RoomNotAvailable(room_id));
        }

        total = total.saturating_add(price_for(rate, &range));
        lines.push((room_id, rate));
    }

    let insert_failed = |e: anyhow::Error| {
        error!(user_id, error = %e, "failed to insert booking");
        AppError::BookingInsertFailed
    };
    let booking_id = queries::insert_booking(
        &tx,
        &NewBooking {
            user_id,
            total_price: total,
            start_date: range.start(),
            end_date: range.end(),
        },
        &now,
    )
    .map_err(insert_failed)?;
    for &(room_id, rate) in &lines {
        queries::insert_booking_room(&tx, booking_id, room_id, rate).map_err(insert_failed)?;
    }

    let payment_url = payment::create_payment_url(&tx, gateway, booking_id, client_ip, now)
        .map_err(|e| {
            error!(booking_id, error = %e, "failed to create payment url");
            match e {
                failed @ AppError::PaymentUrlCreationFailed(_) => failed,
                other => AppError::PaymentUrlCreationFailed(other.to_string()),
            }
        })?;

    let booking = queries::get_booking(&tx, booking_id)
        .map_err(insert_failed)?
        .ok_or(AppError::BookingInsertFailed)?;

    tx.commit().map_err(|e| {
        error!(booking_id, error = %e, "failed to commit booking");
        AppError::CommitFailed
    })?;

    info!(
        booking_id,
        user_id,
        rooms = lines.len(),
        total_price = total,
        "booking created"
    );
    Ok((booking, payment_url))
}

/// All bookings of `user_id`, newest first, each with its rooms.
pub fn booking_history(
    conn: &Connection,
    user_id: i64,
) -> Result<Vec<BookingHistoryEntry>, AppError> {
    let bookings = queries::get_bookings_for_user(conn, user_id)?;
    let mut history = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let rooms = queries::get_booked_rooms(conn, booking.id)?;
        history.push(BookingHistoryEntry {
            id: booking.id,
            start_date: booking.start_date,
            end_date: booking.end_date,
            total_price: booking.total_price,
            status: booking.status,
            is_paid: booking.is_paid,
            rooms,
        });
    }
    Ok(history)
}

/// Customer cancellation. A booking owned by someone else reads as missing.
pub fn cancel_booking(
    db: &mut Connection,
    booking_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    if booking_id <= 0 {
        return Err(AppError::InvalidRequest("invalid booking id".into()));
    }

    let tx = db
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::Storage(e.into()))?;

    let booking = queries::get_booking_for_user(&tx, booking_id, user_id)?
        .ok_or(AppError::BookingNotFound(booking_id))?;
    if !booking.status.is_customer_cancellable() {
        return Err(AppError::BookingNotCancellable {
            id: booking_id,
            status: booking.status,
        });
    }

    let updated = queries::update_booking_state(
        &tx,
        booking_id,
        BookingStatus::Cancelled,
        booking.is_paid,
        &now,
    )
    .map_err(|e| {
        error!(booking_id, error = %e, "failed to cancel booking");
        AppError::BookingUpdateFailed(booking_id)
    })?;
    if !updated {
        return Err(AppError::BookingUpdateFailed(booking_id));
    }

    let cancelled = queries::get_booking(&tx, booking_id)?
        .ok_or(AppError::BookingNotFound(booking_id))?;
    tx.commit().map_err(|e| {
        error!(booking_id, error = %e, "failed to commit cancellation");
        AppError::CommitFailed
    })?;

    info!(booking_id, user_id, "booking cancelled");
    Ok(cancelled)
}
