//! Fixtures shared by the service tests.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::VnpayConfig;
use crate::db::{self, queries};
use crate::models::{Role, RoomInput};
use crate::services::payment::VnpayGateway;

pub fn conn() -> Connection {
    db::init_db(":memory:").unwrap()
}

pub fn vnpay_config() -> VnpayConfig {
    VnpayConfig {
        tmn_code: "HOTEL01".into(),
        hash_secret: "SECRETKEY".into(),
        url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
        return_url: "http://localhost:3000/payments/vnpay_return".into(),
    }
}

pub fn gateway() -> VnpayGateway {
    VnpayGateway::new(vnpay_config())
}

pub fn customer(conn: &Connection, email: &str) -> i64 {
    user_with_role(conn, email, Role::Customer)
}

pub fn user_with_role(conn: &Connection, email: &str, role: Role) -> i64 {
    queries::create_user(
        conn,
        &queries::NewUser {
            name: "Guest",
            email,
            phone: "",
            role,
            api_token: &Uuid::new_v4().to_string(),
        },
    )
    .unwrap()
}

pub fn room_input(name: &str, price: i64) -> RoomInput {
    RoomInput {
        name: name.into(),
        room_type: "double".into(),
        price_per_night: price,
        bed_num: 2,
        has_aircon: true,
        view_type: "sea".into(),
        description: String::new(),
        is_available: true,
    }
}

pub fn room(conn: &Connection, name: &str, price: i64) -> i64 {
    queries::create_room(conn, &room_input(name, price)).unwrap()
}

/// A pending booking of `room` for `nights` nights starting a week from now.
pub fn pending_booking(conn: &Connection, user: i64, room: i64, nights: i64) -> i64 {
    let rate = queries::get_room_rate(conn, room).unwrap().unwrap().0;
    let start = Utc::now() + Duration::days(7);
    let id = queries::insert_booking(
        conn,
        &queries::NewBooking {
            user_id: user,
            total_price: rate * nights,
            start_date: start,
            end_date: start + Duration::days(nights),
        },
        &Utc::now(),
    )
    .unwrap();
    queries::insert_booking_room(conn, id, room, rate).unwrap();
    id
}
