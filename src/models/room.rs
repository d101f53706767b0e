use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub price_per_night: i64,
    pub bed_num: i32,
    pub has_aircon: bool,
    pub view_type: String,
    pub description: String,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attributes an administrator supplies when creating or editing a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInput {
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub price_per_night: i64,
    pub bed_num: i32,
    #[serde(default = "default_true")]
    pub has_aircon: bool,
    pub view_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

/// Optional filters applied on top of date availability when searching rooms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomFilter {
    pub bed_num: Option<i32>,
    pub has_aircon: Option<bool>,
    pub view_type: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}
