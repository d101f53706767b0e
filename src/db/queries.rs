use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::config::MERCHANT_UTC_OFFSET_HOURS;
use crate::models::{
    Bill, BillSummary, Booking, BookingStatus, Payment, PaymentStatus, Review, Role, Room,
    RoomFilter, RoomInput, User,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .with_context(|| format!("malformed timestamp {s:?}"))?;
    Ok(naive.and_utc())
}

fn blocking_statuses_sql() -> String {
    BookingStatus::BLOCKING
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Users ──

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub role: Role,
    pub api_token: &'a str,
}

pub fn create_user(conn: &Connection, user: &NewUser) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO users (name, email, phone, role, api_token) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.name, user.email, user.phone, user.role.as_str(), user.api_token],
    )?;
    Ok(conn.last_insert_rowid())
}

const USER_COLUMNS: &str = "id, name, email, phone, role, api_token, is_active";

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        role: Role::parse(&role).unwrap_or(Role::Customer),
        api_token: row.get(5)?,
        is_active: row.get::<_, i32>(6)? != 0,
    })
}

pub fn get_user_by_token(conn: &Connection, token: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE api_token = ?1"),
            params![token],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn email_exists(conn: &Connection, email: &str) -> anyhow::Result<bool> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Active users holding `role`, oldest first.
pub fn list_users_by_role(conn: &Connection, role: Role) -> anyhow::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 AND is_active = 1 ORDER BY id"
    ))?;
    let users = stmt
        .query_map(params![role.as_str()], parse_user_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn get_active_user_with_role(
    conn: &Connection,
    id: i64,
    role: Role,
) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND role = ?2 AND is_active = 1"),
            params![id, role.as_str()],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

/// Returns false when no active user with `role` has this id.
pub fn update_user_profile(
    conn: &Connection,
    id: i64,
    role: Role,
    name: &str,
    phone: &str,
) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET name = ?3, phone = ?4 WHERE id = ?1 AND role = ?2 AND is_active = 1",
        params![id, role.as_str(), name, phone],
    )?;
    Ok(changed > 0)
}

/// Soft delete: the row stays for booking history, the token stops working.
pub fn deactivate_user(conn: &Connection, id: i64, role: Role) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET is_active = 0 WHERE id = ?1 AND role = ?2 AND is_active = 1",
        params![id, role.as_str()],
    )?;
    Ok(changed > 0)
}

/// Make sure an administrator holding `token` exists.
pub fn ensure_admin(conn: &Connection, token: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (name, email, role, api_token) VALUES ('Administrator', 'admin@localhost', 'admin', ?1)
         ON CONFLICT(email) DO UPDATE SET api_token = excluded.api_token, role = 'admin', is_active = 1",
        params![token],
    )?;
    Ok(())
}

// ── Rooms ──

const ROOM_COLUMNS: &str = "id, name, type, price_per_night, bed_num, has_aircon, view_type, description, is_available, created_at, updated_at";

fn parse_room_row(row: &rusqlite::Row) -> anyhow::Result<Room> {
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        room_type: row.get(2)?,
        price_per_night: row.get(3)?,
        bed_num: row.get(4)?,
        has_aircon: row.get::<_, i32>(5)? != 0,
        view_type: row.get(6)?,
        description: row.get(7)?,
        is_available: row.get::<_, i32>(8)? != 0,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

pub fn create_room(conn: &Connection, room: &RoomInput) -> anyhow::Result<i64> {
    let now = format_ts(&Utc::now());
    conn.execute(
        "INSERT INTO rooms (name, type, price_per_night, bed_num, has_aircon, view_type, description, is_available, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            room.name,
            room.room_type,
            room.price_per_night,
            room.bed_num,
            room.has_aircon as i32,
            room.view_type,
            room.description,
            room.is_available as i32,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_room(conn: &Connection, id: i64, room: &RoomInput) -> anyhow::Result<bool> {
    let now = format_ts(&Utc::now());
    let count = conn.execute(
        "UPDATE rooms SET name = ?1, type = ?2, price_per_night = ?3, bed_num = ?4, has_aircon = ?5,
                view_type = ?6, description = ?7, is_available = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            room.name,
            room.room_type,
            room.price_per_night,
            room.bed_num,
            room.has_aircon as i32,
            room.view_type,
            room.description,
            room.is_available as i32,
            now,
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn get_room(conn: &Connection, id: i64) -> anyhow::Result<Option<Room>> {
    let result = conn.query_row(
        &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
        params![id],
        |row| Ok(parse_room_row(row)),
    );

    match result {
        Ok(room) => Ok(Some(room?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_rooms(conn: &Connection) -> anyhow::Result<Vec<Room>> {
    let mut stmt = conn.prepare(&format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY id ASC"))?;
    let rows = stmt.query_map([], |row| Ok(parse_room_row(row)))?;

    let mut rooms = vec![];
    for row in rows {
        rooms.push(row??);
    }
    Ok(rooms)
}

/// Current nightly rate and availability flag of a room.
pub fn get_room_rate(conn: &Connection, id: i64) -> anyhow::Result<Option<(i64, bool)>> {
    let rate = conn
        .query_row(
            "SELECT price_per_night, is_available FROM rooms WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get::<_, i32>(1)? != 0)),
        )
        .optional()?;
    Ok(rate)
}

pub fn count_bookings_for_room(conn: &Connection, room_id: i64) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM booking_rooms WHERE room_id = ?1",
        params![room_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_reviews_for_room(conn: &Connection, room_id: i64) -> anyhow::Result<usize> {
    Ok(conn.execute("DELETE FROM reviews WHERE room_id = ?1", params![room_id])?)
}

pub fn delete_room(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let deleted = conn.execute("DELETE FROM rooms WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

/// Bookings that hold `room_id` at any instant of `[start, end)`.
pub fn count_blocking_bookings(
    conn: &Connection,
    room_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM booking_rooms br
             JOIN bookings b ON b.id = br.booking_id
             WHERE br.room_id = ?1
               AND b.start_date < ?3 AND b.end_date > ?2
               AND b.status IN ({})",
            blocking_statuses_sql()
        ),
        params![room_id, format_ts(start), format_ts(end)],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn search_available_rooms(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    filter: &RoomFilter,
) -> anyhow::Result<Vec<Room>> {
    let mut sql = format!(
        "SELECT {ROOM_COLUMNS} FROM rooms
         WHERE is_available = 1
           AND id NOT IN (
             SELECT br.room_id FROM booking_rooms br
             JOIN bookings b ON b.id = br.booking_id
             WHERE b.start_date < ?2 AND b.end_date > ?1 AND b.status IN ({})
           )",
        blocking_statuses_sql()
    );
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(format_ts(start)), Box::new(format_ts(end))];

    if let Some(bed_num) = filter.bed_num {
        params_vec.push(Box::new(bed_num));
        sql.push_str(&format!(" AND bed_num = ?{}", params_vec.len()));
    }
    if let Some(has_aircon) = filter.has_aircon {
        params_vec.push(Box::new(has_aircon as i32));
        sql.push_str(&format!(" AND has_aircon = ?{}", params_vec.len()));
    }
    if let Some(view_type) = &filter.view_type {
        params_vec.push(Box::new(view_type.clone()));
        sql.push_str(&format!(" AND view_type = ?{}", params_vec.len()));
    }
    if let Some(min) = filter.min_price {
        params_vec.push(Box::new(min));
        sql.push_str(&format!(" AND price_per_night >= ?{}", params_vec.len()));
    }
    if let Some(max) = filter.max_price {
        params_vec.push(Box::new(max));
        sql.push_str(&format!(" AND price_per_night <= ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY price_per_night ASC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_room_row(row)))?;

    let mut rooms = vec![];
    for row in rows {
        rooms.push(row??);
    }
    Ok(rooms)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str =
    "b.id, b.user_id, b.status, b.total_price, b.is_paid, b.start_date, b.end_date, b.created_at, b.updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(2)?;
    let start_date: String = row.get(5)?;
    let end_date: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status {status_str:?}"))?,
        total_price: row.get(3)?,
        is_paid: row.get::<_, i32>(4)? != 0,
        start_date: parse_ts(&start_date)?,
        end_date: parse_ts(&end_date)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

pub struct NewBooking {
    pub user_id: i64,
    pub total_price: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Inserts a pending, unpaid booking and returns its id.
pub fn insert_booking(
    conn: &Connection,
    booking: &NewBooking,
    now: &DateTime<Utc>,
) -> anyhow::Result<i64> {
    let now = format_ts(now);
    conn.execute(
        "INSERT INTO bookings (user_id, status, total_price, is_paid, start_date, end_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)",
        params![
            booking.user_id,
            BookingStatus::Pending.as_str(),
            booking.total_price,
            format_ts(&booking.start_date),
            format_ts(&booking.end_date),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_booking(conn: &Connection, id: i64) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking_for_user(
    conn: &Connection,
    id: i64,
    user_id: i64,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1 AND b.user_id = ?2"),
        params![id, user_id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_bookings_for_user(conn: &Connection, user_id: i64) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.user_id = ?1 ORDER BY b.created_at DESC, b.id DESC"
    ))?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_state(
    conn: &Connection,
    id: i64,
    status: BookingStatus,
    is_paid: bool,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, is_paid = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), is_paid as i32, format_ts(now), id],
    )?;
    Ok(count > 0)
}

#[derive(Debug, Serialize)]
pub struct BookingOverview {
    #[serde(flatten)]
    pub booking: Booking,
    pub user_name: String,
    pub user_email: String,
}

pub fn search_bookings(
    conn: &Connection,
    user_name: Option<&str>,
    status: Option<BookingStatus>,
) -> anyhow::Result<Vec<BookingOverview>> {
    let mut sql = format!(
        "SELECT {BOOKING_COLUMNS}, u.name, u.email FROM bookings b
         JOIN users u ON u.id = b.user_id WHERE 1 = 1"
    );
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(name) = user_name.filter(|n| !n.is_empty()) {
        params_vec.push(Box::new(format!("%{name}%")));
        sql.push_str(&format!(" AND u.name LIKE ?{}", params_vec.len()));
    }
    if let Some(status) = status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND b.status = ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY b.created_at DESC, b.id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(parse_booking_row(row).and_then(|booking| {
            Ok(BookingOverview {
                booking,
                user_name: row.get(9)?,
                user_email: row.get(10)?,
            })
        }))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_booking_overview(conn: &Connection, id: i64) -> anyhow::Result<Option<BookingOverview>> {
    let result = conn.query_row(
        &format!(
            "SELECT {BOOKING_COLUMNS}, u.name, u.email FROM bookings b
             JOIN users u ON u.id = b.user_id WHERE b.id = ?1"
        ),
        params![id],
        |row| {
            Ok(parse_booking_row(row).and_then(|booking| {
                Ok(BookingOverview {
                    booking,
                    user_name: row.get(9)?,
                    user_email: row.get(10)?,
                })
            }))
        },
    );

    match result {
        Ok(overview) => Ok(Some(overview?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Booking rooms ──

pub fn insert_booking_room(
    conn: &Connection,
    booking_id: i64,
    room_id: i64,
    price: i64,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO booking_rooms (booking_id, room_id, price) VALUES (?1, ?2, ?3)",
        params![booking_id, room_id, price],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A booked room as shown to customers and staff: the room's descriptive
/// fields next to the rate locked in at booking time.
#[derive(Debug, Clone, Serialize)]
pub struct BookedRoom {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub bed_num: i32,
    pub price: i64,
}

pub fn get_booked_rooms(conn: &Connection, booking_id: i64) -> anyhow::Result<Vec<BookedRoom>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.name, r.type, r.bed_num, br.price
         FROM booking_rooms br JOIN rooms r ON r.id = br.room_id
         WHERE br.booking_id = ?1 ORDER BY br.id ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok(BookedRoom {
            id: row.get(0)?,
            name: row.get(1)?,
            room_type: row.get(2)?,
            bed_num: row.get(3)?,
            price: row.get(4)?,
        })
    })?;

    let mut rooms = vec![];
    for row in rows {
        rooms.push(row?);
    }
    Ok(rooms)
}

pub fn booking_has_room(conn: &Connection, booking_id: i64, room_id: i64) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM booking_rooms WHERE booking_id = ?1 AND room_id = ?2",
        params![booking_id, room_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ── Payments ──

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    let status_str: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        method: row.get(2)?,
        txn_ref: row.get(3)?,
        transaction_id: row.get(4)?,
        status: PaymentStatus::parse(&status_str)
            .with_context(|| format!("unknown payment status {status_str:?}"))?,
        amount: row.get(6)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

pub fn insert_payment(
    conn: &Connection,
    booking_id: i64,
    method: &str,
    txn_ref: &str,
    amount: i64,
    now: &DateTime<Utc>,
) -> anyhow::Result<i64> {
    let now = format_ts(now);
    conn.execute(
        "INSERT INTO payments (booking_id, method, txn_ref, status, amount, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            booking_id,
            method,
            txn_ref,
            PaymentStatus::Pending.as_str(),
            amount,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_payment_by_txn_ref(conn: &Connection, txn_ref: &str) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        "SELECT id, booking_id, method, txn_ref, transaction_id, status, amount, created_at, updated_at
         FROM payments WHERE txn_ref = ?1",
        params![txn_ref],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_payments_for_booking(conn: &Connection, booking_id: i64) -> anyhow::Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, method, txn_ref, transaction_id, status, amount, created_at, updated_at
         FROM payments WHERE booking_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| Ok(parse_payment_row(row)))?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok(payments)
}

/// Moves a pending payment to its final status. Returns false when the row
/// was no longer pending.
pub fn settle_payment(
    conn: &Connection,
    id: i64,
    status: PaymentStatus,
    transaction_id: Option<&str>,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = ?1, transaction_id = ?2, updated_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![status.as_str(), transaction_id, format_ts(now), id],
    )?;
    Ok(count > 0)
}

// ── Bills ──

pub fn insert_bill(
    conn: &Connection,
    booking_id: i64,
    total_amount: i64,
    export_at: &DateTime<Utc>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO bills (booking_id, total_amount, export_at) VALUES (?1, ?2, ?3)",
        params![booking_id, total_amount, format_ts(export_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_bill_for_booking(conn: &Connection, booking_id: i64) -> anyhow::Result<Option<Bill>> {
    let row = conn
        .query_row(
            "SELECT id, booking_id, total_amount, export_at FROM bills WHERE booking_id = ?1",
            params![booking_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, booking_id, total_amount, export_at)) => Ok(Some(Bill {
            id,
            booking_id,
            total_amount,
            export_at: parse_ts(&export_at)?,
        })),
        None => Ok(None),
    }
}

pub fn search_bills(
    conn: &Connection,
    user_name: Option<&str>,
    booking_id: Option<i64>,
    export_date: Option<NaiveDate>,
) -> anyhow::Result<Vec<BillSummary>> {
    let mut sql = String::from(
        "SELECT bl.id, bl.booking_id, bl.total_amount, bl.export_at, u.id, u.name
         FROM bills bl
         JOIN bookings b ON b.id = bl.booking_id
         JOIN users u ON u.id = b.user_id
         WHERE 1 = 1",
    );
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(name) = user_name.filter(|n| !n.is_empty()) {
        params_vec.push(Box::new(format!("%{name}%")));
        sql.push_str(&format!(" AND u.name LIKE ?{}", params_vec.len()));
    }
    if let Some(booking_id) = booking_id {
        params_vec.push(Box::new(booking_id));
        sql.push_str(&format!(" AND bl.booking_id = ?{}", params_vec.len()));
    }
    if let Some(date) = export_date {
        params_vec.push(Box::new(date.format("%Y-%m-%d").to_string()));
        // export_at is stored in UTC; the calendar day is the merchant's.
        sql.push_str(&format!(
            " AND date(bl.export_at, '+{MERCHANT_UTC_OFFSET_HOURS} hours') = ?{}",
            params_vec.len()
        ));
    }
    sql.push_str(" ORDER BY bl.export_at DESC, bl.id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let export_at: String = row.get(3)?;
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            export_at,
            row.get::<_, i64>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut bills = vec![];
    for row in rows {
        let (id, booking_id, total_amount, export_at, user_id, user_name) = row?;
        bills.push(BillSummary {
            bill: Bill {
                id,
                booking_id,
                total_amount,
                export_at: parse_ts(&export_at)?,
            },
            user_id,
            user_name,
        });
    }
    Ok(bills)
}

// ── Reviews ──

pub fn insert_review(
    conn: &Connection,
    user_id: i64,
    booking_id: i64,
    room_id: i64,
    rating: i32,
    comment: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO reviews (user_id, booking_id, room_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            booking_id,
            room_id,
            rating,
            comment,
            format_ts(&Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn review_exists_for_booking(conn: &Connection, booking_id: i64) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE booking_id = ?1",
        params![booking_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_reviews_for_room(conn: &Connection, room_id: i64) -> anyhow::Result<Vec<Review>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, booking_id, room_id, rating, comment, created_at
         FROM reviews WHERE room_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![room_id], |row| {
        let created_at: String = row.get(6)?;
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i32>(4)?,
            row.get::<_, String>(5)?,
            created_at,
        ))
    })?;

    let mut reviews = vec![];
    for row in rows {
        let (id, user_id, booking_id, room_id, rating, comment, created_at) = row?;
        reviews.push(Review {
            id,
            user_id,
            booking_id,
            room_id,
            rating,
            comment,
            created_at: parse_ts(&created_at)?,
        });
    }
    Ok(reviews)
}

pub fn get_review(conn: &Connection, id: i64) -> anyhow::Result<Option<Review>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, booking_id, room_id, rating, comment, created_at
             FROM reviews WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i32>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, user_id, booking_id, room_id, rating, comment, created_at)) => Ok(Some(Review {
            id,
            user_id,
            booking_id,
            room_id,
            rating,
            comment,
            created_at: parse_ts(&created_at)?,
        })),
        None => Ok(None),
    }
}

// ── Statistics ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_rooms: i64,
    pub total_customers: i64,
    pub total_bookings: i64,
    /// Sum of every paid booking's captured price, in VND.
    pub total_revenue: i64,
}

pub fn dashboard_stats(conn: &Connection) -> anyhow::Result<DashboardStats> {
    let stats = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM rooms),
            (SELECT COUNT(*) FROM users WHERE role = 'customer'),
            (SELECT COUNT(*) FROM bookings),
            (SELECT COALESCE(SUM(total_price), 0) FROM bookings WHERE is_paid = 1)",
        [],
        |row| {
            Ok(DashboardStats {
                total_rooms: row.get(0)?,
                total_customers: row.get(1)?,
                total_bookings: row.get(2)?,
                total_revenue: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}
