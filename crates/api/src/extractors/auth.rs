use atelier_db::models::GlobalRole;
use atelier_services::{
    Caller,
    auth::{Claims, Principal},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use bson::oid::ObjectId;

use crate::{error::ApiError, state::AppState};

/// Extracts the authenticated principal from JWT (Authorization header or cookie).
///
/// For user principals the global role is re-read from the store so that a
/// role change applies without waiting for the token to expire.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: ObjectId,
    pub organization_id: ObjectId,
    pub role: GlobalRole,
    pub principal: Principal,
    pub claims: Claims,
}

impl AuthUser {
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id,
            organization_id: self.organization_id,
            role: self.role,
        }
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == GlobalRole::Superadmin
    }

    /// Organization principal of `organization_id`, or a superadmin.
    pub fn require_organization_owner(&self, organization_id: ObjectId) -> Result<(), ApiError> {
        let owner =
            self.principal == Principal::Organization && self.organization_id == organization_id;
        if owner || self.is_superadmin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Only the organization account can do this.".to_string(),
            ))
        }
    }
}

fn bearer_or_cookie(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| {
            parts
                .headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|cookies| {
                    cookies.split(';').find_map(|cookie| {
                        cookie
                            .trim()
                            .strip_prefix("access_token=")
                            .filter(|s| !s.is_empty())
                            .map(|s| s.to_string())
                    })
                })
        })
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = bearer_or_cookie(parts)
            .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

        let claims = app_state.auth.verify_access_token(&token)?;

        let user_id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid subject in token".to_string()))?;
        let organization_id = ObjectId::parse_str(&claims.organization_id)
            .map_err(|_| ApiError::Unauthorized("Invalid organization in token".to_string()))?;

        let role = match claims.principal {
            Principal::User => {
                app_state
                    .users
                    .base
                    .find_one(bson::doc! { "_id": user_id })
                    .await?
                    .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?
                    .role
            }
            Principal::Organization => claims.role,
        };

        Ok(AuthUser {
            user_id,
            organization_id,
            role,
            principal: claims.principal,
            claims,
        })
    }
}

/// Helper trait for extracting AppState from composite state types
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

impl FromRef<AppState> for AppState {
    fn from_ref(input: &AppState) -> Self {
        input.clone()
    }
}
