use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{error, info};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Review, Room, RoomFilter, RoomInput};
use crate::services::pricing::StayRange;

/// Rooms on sale that no `booked` or `checked_in` booking holds during the
/// requested stay.
pub fn search_rooms(
    conn: &Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    filter: &RoomFilter,
) -> Result<Vec<Room>, AppError> {
    let range = StayRange::new(start, end)?;
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            return Err(AppError::InvalidRequest("min_price exceeds max_price".into()));
        }
    }
    Ok(queries::search_available_rooms(
        conn,
        &range.start(),
        &range.end(),
        filter,
    )?)
}

pub fn room_detail(conn: &Connection, room_id: i64) -> Result<Room, AppError> {
    queries::get_room(conn, room_id)?.ok_or(AppError::RoomNotFound(room_id))
}

pub fn room_reviews(conn: &Connection, room_id: i64) -> Result<Vec<Review>, AppError> {
    room_detail(conn, room_id)?;
    Ok(queries::get_reviews_for_room(conn, room_id)?)
}

pub fn list_rooms(conn: &Connection) -> Result<Vec<Room>, AppError> {
    Ok(queries::list_rooms(conn)?)
}

fn validate_room(input: &RoomInput) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("name is required".into()));
    }
    if input.room_type.trim().is_empty() {
        return Err(AppError::InvalidRequest("type is required".into()));
    }
    if input.view_type.trim().is_empty() {
        return Err(AppError::InvalidRequest("view_type is required".into()));
    }
    if input.price_per_night < 0 {
        return Err(AppError::InvalidRequest("price_per_night must not be negative".into()));
    }
    if input.bed_num < 1 {
        return Err(AppError::InvalidRequest("bed_num must be at least 1".into()));
    }
    Ok(())
}

pub fn create_room(conn: &Connection, input: &RoomInput) -> Result<Room, AppError> {
    validate_room(input)?;
    let id = queries::create_room(conn, input).map_err(|e| {
        error!(error = %e, "failed to create room");
        AppError::Storage(e)
    })?;
    info!(room_id = id, name = %input.name, "room created");
    room_detail(conn, id)
}

/// Rewrites a room. Rates already captured on bookings are unaffected.
pub fn update_room(conn: &Connection, room_id: i64, input: &RoomInput) -> Result<Room, AppError> {
    validate_room(input)?;
    if !queries::update_room(conn, room_id, input)? {
        return Err(AppError::RoomNotFound(room_id));
    }
    info!(room_id, price_per_night = input.price_per_night, "room updated");
    room_detail(conn, room_id)
}

/// Removes a room that no booking has ever referenced. Rooms with history
/// are retired by marking them unavailable instead.
pub fn delete_room(db: &mut Connection, room_id: i64) -> Result<(), AppError> {
    let tx = db
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::Storage(e.into()))?;
    room_detail(&tx, room_id)?;
    if queries::count_bookings_for_room(&tx, room_id)? > 0 {
        return Err(AppError::RoomHasBookings(room_id));
    }

    let reviews = queries::delete_reviews_for_room(&tx, room_id)?;
    if !queries::delete_room(&tx, room_id)? {
        return Err(AppError::RoomNotFound(room_id));
    }
    tx.commit().map_err(|e| {
        error!(room_id, error = %e, "failed to commit room deletion");
        AppError::CommitFailed
    })?;

    info!(room_id, reviews, "room deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use crate::services::testing;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, d, 14, 0, 0).unwrap()
    }

    fn hold(conn: &Connection, room: i64, start: u32, end: u32, status: BookingStatus) {
        let user = testing::customer(conn, &format!("{room}-{start}@example.com"));
        let id = queries::insert_booking(
            conn,
            &queries::NewBooking {
                user_id: user,
                total_price: 1,
                start_date: day(start),
                end_date: day(end),
            },
            &Utc::now(),
        )
        .unwrap();
        queries::insert_booking_room(conn, id, room, 1).unwrap();
        queries::update_booking_state(conn, id, status, true, &Utc::now()).unwrap();
    }

    #[test]
    fn test_search_excludes_held_and_closed_rooms() {
        let conn = testing::conn();
        let free = testing::room(&conn, "101", 300_000);
        let held = testing::room(&conn, "102", 300_000);
        let cancelled = testing::room(&conn, "103", 300_000);
        queries::create_room(
            &conn,
            &RoomInput {
                is_available: false,
                ..testing::room_input("104", 300_000)
            },
        )
        .unwrap();
        hold(&conn, held, 2, 5, BookingStatus::CheckedIn);
        hold(&conn, cancelled, 2, 5, BookingStatus::Cancelled);

        let ids: Vec<i64> = search_rooms(&conn, day(3), day(4), &RoomFilter::default())
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![free, cancelled]);
    }

    #[test]
    fn test_search_filters_by_attributes_and_price() {
        let conn = testing::conn();
        let cheap = testing::room(&conn, "101", 200_000);
        testing::room(&conn, "102", 800_000);
        queries::create_room(
            &conn,
            &RoomInput {
                bed_num: 1,
                ..testing::room_input("103", 250_000)
            },
        )
        .unwrap();

        let filter = RoomFilter {
            bed_num: Some(2),
            max_price: Some(500_000),
            ..RoomFilter::default()
        };
        let rooms = search_rooms(&conn, day(1), day(2), &filter).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, cheap);

        let bad = RoomFilter {
            min_price: Some(10),
            max_price: Some(5),
            ..RoomFilter::default()
        };
        assert!(matches!(
            search_rooms(&conn, day(1), day(2), &bad),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            search_rooms(&conn, day(2), day(1), &RoomFilter::default()),
            Err(AppError::InvalidDateRange)
        ));
    }

    #[test]
    fn test_room_validation() {
        let conn = testing::conn();
        let err = create_room(
            &conn,
            &RoomInput {
                bed_num: 0,
                ..testing::room_input("101", 1)
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        let err = update_room(&conn, 42, &testing::room_input("101", 1)).unwrap_err();
        assert!(matches!(err, AppError::RoomNotFound(42)));
    }

    #[test]
    fn test_reviews_of_missing_room() {
        let conn = testing::conn();
        assert!(matches!(room_reviews(&conn, 7), Err(AppError::RoomNotFound(7))));
    }

    #[test]
    fn test_delete_unbooked_room() {
        let mut conn = testing::conn();
        let room = testing::room(&conn, "101", 300_000);

        delete_room(&mut conn, room).unwrap();
        assert!(matches!(room_detail(&conn, room), Err(AppError::RoomNotFound(_))));
        assert!(matches!(delete_room(&mut conn, room), Err(AppError::RoomNotFound(_))));
    }

    #[test]
    fn test_room_with_bookings_cannot_be_deleted() {
        let mut conn = testing::conn();
        let room = testing::room(&conn, "101", 300_000);
        hold(&conn, room, 2, 5, BookingStatus::Cancelled);

        let err = delete_room(&mut conn, room).unwrap_err();
        assert!(matches!(err, AppError::RoomHasBookings(id) if id == room));
        assert!(room_detail(&conn, room).is_ok());
    }
}
