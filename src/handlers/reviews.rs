use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::auth::current_user;
use super::{bad_json, message, reject};
use crate::services::reviews::{self, CreateReviewRequest};
use crate::state::AppState;

// POST /reviews
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let user = current_user(&state, &headers).map_err(|e| reject(&state, &headers, e))?;
    let Json(req) = body.map_err(|e| reject(&state, &headers, bad_json(e)))?;

    let review = {
        let mut db = state.db();
        reviews::create_review(&mut db, user.id, &req).map_err(|e| reject(&state, &headers, e))?
    };
    Ok((
        StatusCode::CREATED,
        message(&state, &headers, "success.review_created", review),
    )
        .into_response())
}
