pub mod chat;
pub mod organization;
pub mod project;
pub mod team;
pub mod user;

use atelier_services::auth::IssuedToken;
use axum::http::{HeaderMap, HeaderValue, header};
use bson::{DateTime, oid::ObjectId};

use crate::error::ApiError;

pub(crate) fn hex(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

pub(crate) fn timestamp(at: DateTime) -> String {
    at.try_to_rfc3339_string().unwrap_or_default()
}

fn cookie_headers(cookie: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid cookie header: {}", e)))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// `Set-Cookie` carrying the access token.
pub(crate) fn session_cookie(token: &IssuedToken) -> Result<HeaderMap, ApiError> {
    cookie_headers(&format!(
        "access_token={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        token.access_token, token.expires_in
    ))
}

pub(crate) fn clear_session_cookie() -> Result<HeaderMap, ApiError> {
    cookie_headers("access_token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
}
