use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub status: BookingStatus,
    pub total_price: i64,
    pub is_paid: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Booked,
    CheckedIn,
    CheckedOut,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Booked,
        BookingStatus::CheckedIn,
        BookingStatus::CheckedOut,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    /// Statuses that hold a room and block overlapping bookings.
    pub const BLOCKING: [BookingStatus; 2] = [BookingStatus::Booked, BookingStatus::CheckedIn];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Booked => "booked",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::CheckedOut | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// Outgoing edges of the booking lifecycle. Terminal statuses have none;
    /// staff may move any other status anywhere, including skipping check-in.
    pub fn allowed_transitions(&self) -> &'static [BookingStatus] {
        if self.is_terminal() {
            &[]
        } else {
            &Self::ALL
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Customers may only cancel a confirmed (paid) booking.
    pub fn is_customer_cancellable(&self) -> bool {
        matches!(self, BookingStatus::Booked)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
