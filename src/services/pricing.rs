use chrono::{DateTime, Utc};

use crate::errors::AppError;

const SECONDS_PER_NIGHT: i64 = 24 * 60 * 60;

/// A non-empty stay `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl StayRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if end <= start {
            return Err(AppError::InvalidDateRange);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Billable nights: every started 24 hours counts as a full night.
    pub fn nights(&self) -> i64 {
        let seconds = (self.end - self.start).num_seconds();
        (seconds + SECONDS_PER_NIGHT - 1) / SECONDS_PER_NIGHT
    }
}

pub fn price_for(nightly_rate: i64, range: &StayRange) -> i64 {
    nightly_rate.saturating_mul(range.nights())
}
