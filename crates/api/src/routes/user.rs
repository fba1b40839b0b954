use atelier_db::models::{GlobalRole, User};
use atelier_services::{auth::Principal, dao::base::DaoError};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{clear_session_cookie, hex, session_cookie, timestamp};
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUserRequest {
    pub organization_id: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub email: String,
    pub role: GlobalRole,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: hex(user.id),
            organization_id: user.organization_id.to_hex(),
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: timestamp(user.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserAuthResponse {
    pub access_token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

fn issue(state: &AppState, user: User) -> Result<(HeaderMap, UserAuthResponse), ApiError> {
    let id = user.id.ok_or(DaoError::NotFound)?;
    let token = state
        .auth
        .issue_token(id, user.organization_id, user.role, Principal::User)?;
    let headers = session_cookie(&token)?;

    Ok((
        headers,
        UserAuthResponse {
            access_token: token.access_token,
            expires_in: token.expires_in,
            user: UserResponse::from(user),
        },
    ))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterUserRequest>,
) -> Result<(StatusCode, HeaderMap, Json<UserAuthResponse>), ApiError> {
    body.validate()?;
    let organization_id = parse_id(&body.organization_id, "organization id")?;

    state
        .organizations
        .base
        .find_one(bson::doc! { "_id": organization_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    let password_hash = state.auth.hash_password(&body.password)?;
    let user = state
        .users
        .create(
            organization_id,
            &body.name,
            &body.email,
            password_hash,
            GlobalRole::User,
        )
        .await?;

    let (headers, response) = issue(&state, user)?;
    Ok((StatusCode::CREATED, headers, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<UserAuthResponse>), ApiError> {
    let user = state
        .users
        .find_by_email(&body.email)
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let password_hash = user
        .password_hash
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !state.auth.verify_password(&body.password, password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let (headers, response) = issue(&state, user)?;
    Ok((headers, Json(response)))
}

pub async fn logout() -> Result<HeaderMap, ApiError> {
    clear_session_cookie()
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    if auth.principal != Principal::User {
        return Err(ApiError::NotFound("Organization accounts have no user profile".to_string()));
    }
    let user = state.users.base.find_by_id(auth.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = if auth.is_superadmin() {
        state.users.list_all().await?
    } else {
        state.users.list_by_organization(auth.organization_id).await?
    };
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&id, "user id")?;

    let user = if auth.is_superadmin() {
        state.users.base.find_by_id(id).await?
    } else {
        state
            .users
            .find_in_organization(auth.organization_id, id)
            .await?
    };
    Ok(Json(UserResponse::from(user)))
}
