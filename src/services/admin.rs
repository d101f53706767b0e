use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{error, info};

use crate::db::queries::{self, BookedRoom, BookingOverview, DashboardStats};
use crate::errors::AppError;
use crate::models::{Bill, BillSummary, Booking, BookingStatus, Payment};

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub overview: BookingOverview,
    pub rooms: Vec<BookedRoom>,
    pub payments: Vec<Payment>,
    pub bill: Option<Bill>,
}

/// Back-office status change. Re-applying the current status is a no-op even
/// for terminal bookings; otherwise terminal bookings are locked.
pub fn update_booking_status(
    db: &mut Connection,
    booking_id: i64,
    new_status: BookingStatus,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    let tx = db
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::Storage(e.into()))?;

    let booking =
        queries::get_booking(&tx, booking_id)?.ok_or(AppError::BookingNotFound(booking_id))?;
    if booking.status == new_status {
        return Ok(booking);
    }
    if !booking.status.can_transition_to(new_status) {
        return Err(AppError::BookingStatusLocked {
            id: booking_id,
            status: booking.status,
        });
    }

    let updated =
        queries::update_booking_state(&tx, booking_id, new_status, booking.is_paid, &now)
            .map_err(|e| {
                error!(booking_id, error = %e, "failed to update booking status");
                AppError::BookingUpdateFailed(booking_id)
            })?;
    if !updated {
        return Err(AppError::BookingUpdateFailed(booking_id));
    }
    let booking =
        queries::get_booking(&tx, booking_id)?.ok_or(AppError::BookingNotFound(booking_id))?;

    tx.commit().map_err(|e| {
        error!(booking_id, error = %e, "failed to commit status update");
        AppError::CommitFailed
    })?;

    info!(booking_id, status = new_status.as_str(), "booking status updated");
    Ok(booking)
}

pub fn search_bookings(
    conn: &Connection,
    user_name: Option<&str>,
    status: Option<&str>,
) -> Result<Vec<BookingOverview>, AppError> {
    let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            Some(BookingStatus::parse(raw).ok_or_else(|| AppError::InvalidStatus(raw.to_string()))?)
        }
        None => None,
    };
    Ok(queries::search_bookings(conn, user_name.map(str::trim), status)?)
}

pub fn booking_detail(conn: &Connection, booking_id: i64) -> Result<BookingDetail, AppError> {
    let overview = queries::get_booking_overview(conn, booking_id)?
        .ok_or(AppError::BookingNotFound(booking_id))?;
    Ok(BookingDetail {
        rooms: queries::get_booked_rooms(conn, booking_id)?,
        payments: queries::get_payments_for_booking(conn, booking_id)?,
        bill: queries::get_bill_for_booking(conn, booking_id)?,
        overview,
    })
}

pub fn search_bills(
    conn: &Connection,
    user_name: Option<&str>,
    booking_id: Option<i64>,
    export_date: Option<&str>,
) -> Result<Vec<BillSummary>, AppError> {
    let export_date = match export_date.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::InvalidRequest(format!("export_date {raw:?} is not YYYY-MM-DD"))
        })?),
        None => None,
    };
    Ok(queries::search_bills(conn, user_name.map(str::trim), booking_id, export_date)?)
}

/// Headline numbers for the back-office dashboard.
pub fn dashboard_stats(conn: &Connection) -> Result<DashboardStats, AppError> {
    Ok(queries::dashboard_stats(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;
    use chrono::TimeZone;

    fn booking_in(conn: &Connection, status: BookingStatus) -> i64 {
        let user = testing::customer(conn, "guest@example.com");
        let room = testing::room(conn, "101", 300_000);
        let id = testing::pending_booking(conn, user, room, 2);
        queries::update_booking_state(conn, id, status, true, &Utc::now()).unwrap();
        id
    }

    #[test]
    fn test_staff_can_move_booking_forward() {
        let mut conn = testing::conn();
        let id = booking_in(&conn, BookingStatus::Booked);

        let booking =
            update_booking_status(&mut conn, id, BookingStatus::CheckedIn, Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::CheckedIn);
        let booking =
            update_booking_status(&mut conn, id, BookingStatus::CheckedOut, Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::CheckedOut);
        assert!(booking.is_paid);
    }

    #[test]
    fn test_terminal_booking_is_locked() {
        for terminal in [
            BookingStatus::CheckedOut,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
        ] {
            let mut conn = testing::conn();
            let id = booking_in(&conn, terminal);
            let err = update_booking_status(&mut conn, id, BookingStatus::Booked, Utc::now())
                .unwrap_err();
            assert!(matches!(err, AppError::BookingStatusLocked { status, .. } if status == terminal));
        }
    }

    #[test]
    fn test_unchanged_status_is_noop_even_when_terminal() {
        let mut conn = testing::conn();
        let id = booking_in(&conn, BookingStatus::Cancelled);
        let before = queries::get_booking(&conn, id).unwrap().unwrap();

        let booking =
            update_booking_status(&mut conn, id, BookingStatus::Cancelled, Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.updated_at, before.updated_at);
    }

    #[test]
    fn test_missing_booking() {
        let mut conn = testing::conn();
        let err =
            update_booking_status(&mut conn, 5, BookingStatus::Booked, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(5)));
    }

    #[test]
    fn test_search_bookings_rejects_unknown_status() {
        let conn = testing::conn();
        booking_in(&conn, BookingStatus::Booked);

        assert_eq!(search_bookings(&conn, Some("Gue"), Some("booked")).unwrap().len(), 1);
        assert!(search_bookings(&conn, None, Some("pending")).unwrap().is_empty());
        assert!(matches!(
            search_bookings(&conn, None, Some("confirmed")),
            Err(AppError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_booking_detail_includes_rooms_and_owner() {
        let conn = testing::conn();
        let id = booking_in(&conn, BookingStatus::Booked);

        let detail = booking_detail(&conn, id).unwrap();
        assert_eq!(detail.overview.user_email, "guest@example.com");
        assert_eq!(detail.rooms.len(), 1);
        assert!(detail.bill.is_none());
        assert!(matches!(booking_detail(&conn, 99), Err(AppError::BookingNotFound(99))));
    }

    #[test]
    fn test_search_bills_validates_date() {
        let conn = testing::conn();
        let id = booking_in(&conn, BookingStatus::Booked);
        let exported = Utc.with_ymd_and_hms(2030, 3, 10, 9, 0, 0).unwrap();
        queries::insert_bill(&conn, id, 600_000, &exported).unwrap();

        let bills = search_bills(&conn, None, Some(id), Some("2030-03-10")).unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].bill.total_amount, 600_000);
        assert!(search_bills(&conn, None, None, Some("2000-01-01")).unwrap().is_empty());
        assert!(matches!(
            search_bills(&conn, None, None, Some("01/02/2030")),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_export_date_is_the_merchant_calendar_day() {
        let conn = testing::conn();
        let id = booking_in(&conn, BookingStatus::Booked);
        // 18:30 UTC on the 10th is 01:30 on the 11th in Hanoi.
        let exported = Utc.with_ymd_and_hms(2030, 3, 10, 18, 30, 0).unwrap();
        queries::insert_bill(&conn, id, 600_000, &exported).unwrap();

        assert_eq!(search_bills(&conn, None, None, Some("2030-03-11")).unwrap().len(), 1);
        assert!(search_bills(&conn, None, None, Some("2030-03-10")).unwrap().is_empty());
    }

    #[test]
    fn test_dashboard_counts_only_paid_revenue() {
        let conn = testing::conn();
        assert_eq!(dashboard_stats(&conn).unwrap(), DashboardStats::default());

        let user = testing::customer(&conn, "guest@example.com");
        testing::user_with_role(&conn, "staff@example.com", crate::models::Role::Staff);
        let room = testing::room(&conn, "101", 300_000);
        testing::room(&conn, "102", 300_000);
        let paid = testing::pending_booking(&conn, user, room, 2);
        queries::update_booking_state(&conn, paid, BookingStatus::Booked, true, &Utc::now())
            .unwrap();
        testing::pending_booking(&conn, user, room, 3);

        let stats = dashboard_stats(&conn).unwrap();
        assert_eq!(stats.total_rooms, 2);
        assert_eq!(stats.total_customers, 1);
        assert_eq!(stats.total_bookings, 2);
        assert_eq!(stats.total_revenue, 600_000);
    }
}
