use atelier_db::models::{GlobalRole, Organization};
use atelier_services::{auth::Principal, dao::base::DaoError};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{hex, session_cookie, timestamp, user::UserResponse};
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterOrganizationRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Domain is required"))]
    pub domain: String,
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

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Domain cannot be empty"))]
    pub domain: Option<String>,
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: GlobalRole,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationAuthResponse {
    pub access_token: String,
    pub expires_in: u64,
    pub organization: OrganizationResponse,
}

fn to_response(org: Organization) -> OrganizationResponse {
    OrganizationResponse {
        id: hex(org.id),
        name: org.name,
        domain: org.domain,
        email: org.email,
        created_at: timestamp(org.created_at),
    }
}

fn issue(
    state: &AppState,
    org: Organization,
) -> Result<(HeaderMap, OrganizationAuthResponse), ApiError> {
    let id = org.id.ok_or(DaoError::NotFound)?;
    let token = state
        .auth
        .issue_token(id, id, GlobalRole::User, Principal::Organization)?;
    let headers = session_cookie(&token)?;

    Ok((
        headers,
        OrganizationAuthResponse {
            access_token: token.access_token,
            expires_in: token.expires_in,
            organization: to_response(org),
        },
    ))
}

/// Members of the organization can read it; superadmins can read any.
fn ensure_member_of(auth: &AuthUser, organization_id: bson::oid::ObjectId) -> Result<(), ApiError> {
    if auth.organization_id == organization_id || auth.is_superadmin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not in this organization.".to_string()))
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterOrganizationRequest>,
) -> Result<(StatusCode, HeaderMap, Json<OrganizationAuthResponse>), ApiError> {
    body.validate()?;

    let password_hash = state.auth.hash_password(&body.password)?;
    let org = state
        .organizations
        .create(&body.name, &body.domain, &body.email, password_hash)
        .await?;

    let (headers, response) = issue(&state, org)?;
    Ok((StatusCode::CREATED, headers, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<OrganizationAuthResponse>), ApiError> {
    let org = state
        .organizations
        .find_by_email(&body.email)
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !state.auth.verify_password(&body.password, &org.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let (headers, response) = issue(&state, org)?;
    Ok((headers, Json(response)))
}

pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrganizationResponse>>, ApiError> {
    let orgs = state.organizations.list().await?;
    Ok(Json(orgs.into_iter().map(to_response).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    let id = parse_id(&id, "organization id")?;
    ensure_member_of(&auth, id)?;

    let org = state.organizations.base.find_by_id(id).await?;
    Ok(Json(to_response(org)))
}

pub async fn members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let id = parse_id(&id, "organization id")?;
    ensure_member_of(&auth, id)?;

    let users = state.users.list_by_organization(id).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    let id = parse_id(&id, "organization id")?;
    auth.require_organization_owner(id)?;
    body.validate()?;

    let org = state
        .organizations
        .update(id, body.name, body.domain, body.email)
        .await?;
    Ok(Json(to_response(org)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "organization id")?;
    auth.require_organization_owner(id)?;

    state.organizations.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn change_user_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&id, "organization id")?;
    let user_id = parse_id(&user_id, "user id")?;
    auth.require_organization_owner(id)?;

    let user = state
        .users
        .change_role(id, user_id, body.role, auth.user_id)
        .await?;
    Ok(Json(UserResponse::from(user)))
}
