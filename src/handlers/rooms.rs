use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{bad_query, reject};
use crate::models::{Review, Room, RoomFilter};
use crate::services::rooms;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub bed_num: Option<i32>,
    pub has_aircon: Option<bool>,
    pub view_type: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

// GET /rooms/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<Room>>, Response> {
    let Query(q) = query.map_err(|e| reject(&state, &headers, bad_query(e)))?;
    let filter = RoomFilter {
        bed_num: q.bed_num,
        has_aircon: q.has_aircon,
        view_type: q.view_type.filter(|v| !v.is_empty()),
        min_price: q.min_price,
        max_price: q.max_price,
    };

    let found = {
        let db = state.db();
        rooms::search_rooms(&db, q.start_date, q.end_date, &filter)
            .map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(found))
}

// GET /rooms/:id
pub async fn detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
) -> Result<Json<Room>, Response> {
    let db = state.db();
    rooms::room_detail(&db, room_id)
        .map(Json)
        .map_err(|e| reject(&state, &headers, e))
}

// GET /rooms/:id/reviews
pub async fn reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
) -> Result<Json<Vec<Review>>, Response> {
    let db = state.db();
    rooms::room_reviews(&db, room_id)
        .map(Json)
        .map_err(|e| reject(&state, &headers, e))
}
