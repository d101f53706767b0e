use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::auth::{require_admin, require_back_office};
use super::{bad_json, bad_query, message, reject};
use crate::db::queries::{BookingOverview, DashboardStats};
use crate::errors::AppError;
use crate::models::{BillSummary, BookingStatus, Room, RoomInput, User};
use crate::services::accounts::{self, CreateStaffRequest, UpdateStaffRequest};
use crate::services::admin::{self, BookingDetail};
use crate::services::rooms;
use crate::state::AppState;

// GET /admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub user_name: Option<String>,
    pub status: Option<String>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<BookingsQuery>, QueryRejection>,
) -> Result<Json<Vec<BookingOverview>>, Response> {
    require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Query(q) = query.map_err(|e| reject(&state, &headers, bad_query(e)))?;

    let bookings = {
        let db = state.db();
        admin::search_bookings(&db, q.user_name.as_deref(), q.status.as_deref())
            .map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(bookings))
}

// GET /admin/bookings/edit/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<i64>,
) -> Result<Json<BookingDetail>, Response> {
    require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let detail = {
        let db = state.db();
        admin::booking_detail(&db, booking_id).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(detail))
}

// POST /admin/bookings/edit/:id
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<i64>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Response> {
    let staff = require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Json(req) = body.map_err(|e| reject(&state, &headers, bad_json(e)))?;
    let status = BookingStatus::parse(req.status.trim())
        .ok_or_else(|| reject(&state, &headers, AppError::InvalidStatus(req.status.clone())))?;

    let booking = {
        let mut db = state.db();
        admin::update_booking_status(&mut db, booking_id, status, Utc::now())
            .map_err(|e| reject(&state, &headers, e))?
    };
    tracing::info!(booking_id, staff_id = staff.id, status = %status, "status change requested");
    Ok(message(&state, &headers, "success.booking_status_updated", booking))
}

// GET /admin/bills
#[derive(Deserialize)]
pub struct BillsQuery {
    pub user_name: Option<String>,
    pub booking_id: Option<i64>,
    pub export_date: Option<String>,
}

pub async fn get_bills(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<BillsQuery>, QueryRejection>,
) -> Result<Json<Vec<BillSummary>>, Response> {
    require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Query(q) = query.map_err(|e| reject(&state, &headers, bad_query(e)))?;

    let bills = {
        let db = state.db();
        admin::search_bills(
            &db,
            q.user_name.as_deref(),
            q.booking_id,
            q.export_date.as_deref(),
        )
        .map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(bills))
}

// GET /admin/rooms
pub async fn get_rooms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Room>>, Response> {
    require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let all = {
        let db = state.db();
        rooms::list_rooms(&db).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(all))
}

// POST /admin/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<RoomInput>, JsonRejection>,
) -> Result<Response, Response> {
    require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Json(input) = body.map_err(|e| reject(&state, &headers, bad_json(e)))?;

    let room = {
        let db = state.db();
        rooms::create_room(&db, &input).map_err(|e| reject(&state, &headers, e))?
    };
    Ok((
        StatusCode::CREATED,
        message(&state, &headers, "success.room_created", room),
    )
        .into_response())
}

// PUT /admin/rooms/:id
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
    body: Result<Json<RoomInput>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Response> {
    require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Json(input) = body.map_err(|e| reject(&state, &headers, bad_json(e)))?;

    let room = {
        let db = state.db();
        rooms::update_room(&db, room_id, &input).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(message(&state, &headers, "success.room_updated", room))
}

// DELETE /admin/rooms/:id
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
) -> Result<Json<serde_json::Value>, Response> {
    let staff = require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    {
        let mut db = state.db();
        rooms::delete_room(&mut db, room_id).map_err(|e| reject(&state, &headers, e))?;
    }
    tracing::info!(room_id, staff_id = staff.id, "room deletion requested");
    Ok(message(
        &state,
        &headers,
        "success.room_deleted",
        serde_json::json!({ "id": room_id }),
    ))
}

// GET /admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, Response> {
    require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let stats = {
        let db = state.db();
        admin::dashboard_stats(&db).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(stats))
}

// GET /admin/customers
pub async fn get_customers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, Response> {
    require_back_office(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let customers = {
        let db = state.db();
        accounts::list_customers(&db).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(customers))
}

// GET /admin/staff
pub async fn get_staff_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, Response> {
    require_admin(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let staff = {
        let db = state.db();
        accounts::list_staff(&db).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(staff))
}

// POST /admin/staff
pub async fn create_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateStaffRequest>, JsonRejection>,
) -> Result<Response, Response> {
    require_admin(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Json(req) = body.map_err(|e| reject(&state, &headers, bad_json(e)))?;

    let creds = {
        let mut db = state.db();
        accounts::create_staff(&mut db, &req).map_err(|e| reject(&state, &headers, e))?
    };
    Ok((
        StatusCode::CREATED,
        message(&state, &headers, "success.staff_created", creds),
    )
        .into_response())
}

// GET /admin/staff/:id
pub async fn get_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(staff_id): Path<i64>,
) -> Result<Json<User>, Response> {
    require_admin(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let staff = {
        let db = state.db();
        accounts::get_staff(&db, staff_id).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(staff))
}

// PUT /admin/staff/:id
pub async fn update_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(staff_id): Path<i64>,
    body: Result<Json<UpdateStaffRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Response> {
    require_admin(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Json(req) = body.map_err(|e| reject(&state, &headers, bad_json(e)))?;

    let staff = {
        let db = state.db();
        accounts::update_staff(&db, staff_id, &req).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(message(&state, &headers, "success.staff_updated", staff))
}

// DELETE /admin/staff/:id
pub async fn delete_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(staff_id): Path<i64>,
) -> Result<Json<serde_json::Value>, Response> {
    let admin = require_admin(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    {
        let db = state.db();
        accounts::delete_staff(&db, staff_id).map_err(|e| reject(&state, &headers, e))?;
    }
    tracing::info!(staff_id, admin_id = admin.id, "staff deletion requested");
    Ok(message(
        &state,
        &headers,
        "success.staff_deleted",
        serde_json::json!({ "id": staff_id }),
    ))
}
