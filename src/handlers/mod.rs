pub mod accounts;
pub mod admin;
pub mod auth;
pub mod bookings;
pub mod health;
pub mod payments;
pub mod reviews;
pub mod rooms;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::state::AppState;

/// Render `err` in the caller's language.
pub(crate) fn reject(state: &AppState, headers: &HeaderMap, err: AppError) -> Response {
    err.localized(&state.i18n, state.i18n.negotiate(headers))
}

/// `{"message": <translated key>, "data": ...}` for successful mutations.
pub(crate) fn message<T: Serialize>(
    state: &AppState,
    headers: &HeaderMap,
    key: &str,
    data: T,
) -> Json<serde_json::Value> {
    let locale = state.i18n.negotiate(headers);
    Json(serde_json::json!({
        "message": state.i18n.t(locale, key),
        "data": data,
    }))
}

pub(crate) fn bad_json(rejection: JsonRejection) -> AppError {
    AppError::InvalidRequest(rejection.body_text())
}

pub(crate) fn bad_query(rejection: QueryRejection) -> AppError {
    AppError::InvalidRequest(rejection.body_text())
}
