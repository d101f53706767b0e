use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: i64,
    pub booking_id: i64,
    pub total_amount: i64,
    pub export_at: DateTime<Utc>,
}

/// A bill joined with the customer it was issued to, for back-office listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillSummary {
    #[serde(flatten)]
    pub bill: Bill,
    pub user_id: i64,
    pub user_name: String,
}
