use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use chrono::Utc;

use super::auth::{client_ip, current_user};
use super::{message, reject};
use crate::models::PaymentStatus;
use crate::services::payment;
use crate::state::AppState;

// GET /payments/:id/vnpay
pub async fn vnpay_checkout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Path(booking_id): Path<i64>,
) -> Result<Json<serde_json::Value>, Response> {
    let user = current_user(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    let url = {
        let mut db = state.db();
        payment::request_payment(
            &mut db,
            state.gateway.as_ref(),
            booking_id,
            user.id,
            &ip,
            Utc::now(),
        )
        .map_err(|e| reject(&state, &headers, e))?
    };
    Ok(Json(serde_json::json!({ "payment_url": url })))
}

// GET /payments/vnpay_return
pub async fn vnpay_return(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, Response> {
    let callback = state
        .gateway
        .parse_callback(&params)
        .map_err(|e| reject(&state, &headers, e.into()))?;

    let status = {
        let mut db = state.db();
        payment::handle_callback(&mut db, state.gateway.as_ref(), &callback, Utc::now())
            .map_err(|e| reject(&state, &headers, e))?
    };

    let key = match status {
        PaymentStatus::Success => "success.payment_processed",
        _ => "success.payment_failed",
    };
    Ok(message(
        &state,
        &headers,
        key,
        serde_json::json!({
            "txn_ref": callback.txn_ref,
            "status": status,
        }),
    ))
}
