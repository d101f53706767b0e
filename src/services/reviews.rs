use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use tracing::{error, info};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, Review};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: i64,
    pub room_id: i64,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

/// A guest may review one room of a finished stay, once per booking.
pub fn create_review(
    db: &mut Connection,
    user_id: i64,
    req: &CreateReviewRequest,
) -> Result<Review, AppError> {
    if !(1..=5).contains(&req.rating) {
        return Err(AppError::InvalidRating(req.rating));
    }

    let tx = db
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::Storage(e.into()))?;

    let booking = queries::get_booking_for_user(&tx, req.booking_id, user_id)?
        .ok_or(AppError::BookingNotFound(req.booking_id))?;
    if booking.status != BookingStatus::CheckedOut {
        return Err(AppError::BookingNotCheckedOut(booking.id));
    }
    if !queries::booking_has_room(&tx, booking.id, req.room_id)? {
        return Err(AppError::InvalidRoomId(req.room_id));
    }
    if queries::review_exists_for_booking(&tx, booking.id)? {
        return Err(AppError::ReviewAlreadyExists(booking.id));
    }

    let review_id = queries::insert_review(
        &tx,
        user_id,
        booking.id,
        req.room_id,
        req.rating,
        req.comment.trim(),
    )?;
    let review = queries::get_review(&tx, review_id)?
        .ok_or_else(|| AppError::Storage(anyhow::anyhow!("review {review_id} vanished")))?;

    tx.commit().map_err(|e| {
        error!(booking_id = booking.id, error = %e, "failed to commit review");
        AppError::CommitFailed
    })?;
    info!(booking_id = booking.id, room_id = req.room_id, rating = req.rating, "review created");
    Ok(review)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;
    use chrono::Utc;

    fn stay(conn: &Connection, status: BookingStatus) -> (i64, i64, i64) {
        let user = testing::customer(conn, "guest@example.com");
        let room = testing::room(conn, "101", 300_000);
        let booking = testing::pending_booking(conn, user, room, 2);
        queries::update_booking_state(conn, booking, status, true, &Utc::now()).unwrap();
        (user, room, booking)
    }

    fn review(booking_id: i64, room_id: i64, rating: i32) -> CreateReviewRequest {
        CreateReviewRequest {
            booking_id,
            room_id,
            rating,
            comment: " Lovely view ".into(),
        }
    }

    #[test]
    fn test_review_after_checkout() {
        let mut conn = testing::conn();
        let (user, room, booking) = stay(&conn, BookingStatus::CheckedOut);

        let created = create_review(&mut conn, user, &review(booking, room, 5)).unwrap();
        assert_eq!(created.rating, 5);
        assert_eq!(created.comment, "Lovely view");

        let err = create_review(&mut conn, user, &review(booking, room, 4)).unwrap_err();
        assert!(matches!(err, AppError::ReviewAlreadyExists(_)));
    }

    #[test]
    fn test_review_requires_finished_owned_stay() {
        let mut conn = testing::conn();
        let (user, room, booking) = stay(&conn, BookingStatus::Booked);

        let err = create_review(&mut conn, user, &review(booking, room, 4)).unwrap_err();
        assert!(matches!(err, AppError::BookingNotCheckedOut(_)));

        let stranger = testing::customer(&conn, "other@example.com");
        let err = create_review(&mut conn, stranger, &review(booking, room, 4)).unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(_)));
    }

    #[test]
    fn test_review_validates_rating_and_room() {
        let mut conn = testing::conn();
        let (user, room, booking) = stay(&conn, BookingStatus::CheckedOut);
        let other_room = testing::room(&conn, "102", 300_000);

        let err = create_review(&mut conn, user, &review(booking, room, 6)).unwrap_err();
        assert!(matches!(err, AppError::InvalidRating(6)));
        let err = create_review(&mut conn, user, &review(booking, other_room, 3)).unwrap_err();
        assert!(matches!(err, AppError::InvalidRoomId(id) if id == other_room));
    }
}
