use rusqlite::Connection;

use crate::db::queries;
use crate::services::pricing::StayRange;

/// Whether `room_id` is free for `range`. Only `booked` and `checked_in`
/// bookings hold a room. Callers that go on to book the room must run this on
/// an immediate transaction so the write lock is held from check to insert.
pub fn is_room_available(
    conn: &Connection,
    room_id: i64,
    range: &StayRange,
) -> anyhow::Result<bool> {
    let blocking = queries::count_blocking_bookings(conn, room_id, &range.start(), &range.end())?;
    Ok(blocking == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BookingStatus, Role, RoomInput};
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, d, 12, 0, 0).unwrap()
    }

    fn setup() -> (Connection, i64, i64) {
        let conn = db::init_db(":memory:").unwrap();
        let user = queries::create_user(
            &conn,
            &queries::NewUser {
                name: "Guest",
                email: "guest@example.com",
                phone: "",
                role: Role::Customer,
                api_token: "tok",
            },
        )
        .unwrap();
        let room = queries::create_room(
            &conn,
            &RoomInput {
                name: "101".into(),
                room_type: "double".into(),
                price_per_night: 500_000,
                bed_num: 2,
                has_aircon: true,
                view_type: "sea".into(),
                description: String::new(),
                is_available: true,
            },
        )
        .unwrap();
        (conn, user, room)
    }

    fn book(conn: &Connection, user: i64, room: i64, start: u32, end: u32, status: BookingStatus) {
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
        queries::update_booking_state(conn, id, status, false, &Utc::now()).unwrap();
    }

    #[test]
    fn test_overlapping_booked_stay_blocks() {
        let (conn, user, room) = setup();
        book(&conn, user, room, 10, 13, BookingStatus::Booked);

        let range = StayRange::new(day(12), day(15)).unwrap();
        assert!(!is_room_available(&conn, room, &range).unwrap());

        let inside = StayRange::new(day(11), day(12)).unwrap();
        assert!(!is_room_available(&conn, room, &inside).unwrap());
    }

    #[test]
    fn test_checked_in_stay_blocks() {
        let (conn, user, room) = setup();
        book(&conn, user, room, 10, 13, BookingStatus::CheckedIn);

        let range = StayRange::new(day(9), day(11)).unwrap();
        assert!(!is_room_available(&conn, room, &range).unwrap());
    }

    #[test]
    fn test_back_to_back_is_available() {
        let (conn, user, room) = setup();
        book(&conn, user, room, 10, 13, BookingStatus::Booked);

        let after = StayRange::new(day(13), day(15)).unwrap();
        assert!(is_room_available(&conn, room, &after).unwrap());
        let before = StayRange::new(day(8), day(10)).unwrap();
        assert!(is_room_available(&conn, room, &before).unwrap());
    }

    #[test]
    fn test_non_blocking_statuses_do_not_block() {
        let (conn, user, room) = setup();
        for status in [
            BookingStatus::Pending,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
            BookingStatus::CheckedOut,
        ] {
            book(&conn, user, room, 10, 13, status);
        }

        let range = StayRange::new(day(10), day(13)).unwrap();
        assert!(is_room_available(&conn, room, &range).unwrap());
    }
}
