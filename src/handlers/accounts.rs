use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::{bad_json, message, reject};
use crate::services::accounts::{self, RegisterRequest};
use crate::state::AppState;

// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(req) = body.map_err(|e| reject(&state, &headers, bad_json(e)))?;

    let creds = {
        let mut db = state.db();
        accounts::register(&mut db, &req).map_err(|e| reject(&state, &headers, e))?
    };
    Ok((
        StatusCode::CREATED,
        message(&state, &headers, "success.registered", creds),
    )
        .into_response())
}
