use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use super::auth::{client_ip, current_user};
use super::{bad_json, message, reject};
use crate::services::booking::{self, BookingHistoryEntry, CreateBookingRequest};
use crate::state::AppState;

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let user = current_user(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Json(req) = body.map_err(|e| reject(&state, &headers, bad_json(e)))?;
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    let (created, payment_url) = {
        let mut db = state.db();
        booking::create_booking(&mut db, state.gateway.as_ref(), user.id, &req, &ip, Utc::now())
            .map_err(|e| reject(&state, &headers, e))?
    };

    let body = message(
        &state,
        &headers,
        "success.booking_created",
        serde_json::json!({
            "booking": created,
            "payment_url": payment_url,
        }),
    );
    Ok((StatusCode::CREATED, body).into_response())
}

// GET /bookings/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingHistoryEntry>>, Response> {
    let user = current_user(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let entries = {
        let db = state.db();
        booking::booking_history(&db, user.id).map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(entries))
}

// GET /bookings/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<i64>,
) -> Result<Json<serde_json::Value>, Response> {
    let user = current_user(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let cancelled = {
        let mut db = state.db();
        booking::cancel_booking(&mut db, booking_id, user.id, Utc::now())
            .map_err(|e| reject(&state, &headers, e))?
    };
    Ok(message(&state, &headers, "success.booking_cancelled", cancelled))
}
