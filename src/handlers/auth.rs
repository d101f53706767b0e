use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The active user holding the request's bearer token.
pub fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let user = {
        let db = state.db();
        queries::get_user_by_token(&db, token)?
    };
    match user {
        Some(user) if user.is_active => Ok(user),
        _ => Err(AppError::Unauthorized),
    }
}

/// Staff or administrator.
pub fn require_back_office(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user = current_user(state, headers)?;
    if !user.role.is_back_office() {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Account management is reserved to administrators.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user = current_user(state, headers)?;
    if user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Caller address as the payment provider should see it: the first
/// `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers, Some(peer)), "198.51.100.2");
        headers.remove("x-real-ip");
        assert_eq!(client_ip(&headers, Some(peer)), "127.0.0.1");
        assert_eq!(client_ip(&headers, None), "");
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
