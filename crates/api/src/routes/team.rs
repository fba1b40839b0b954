use atelier_db::models::{AccessLevel, Membership, Team, TeamRole};
use atelier_services::{Level, dao::base::DaoError};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bson::DateTime;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::{hex, project::delete_project_tree, timestamp};
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, message = "Team name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
    #[serde(default)]
    pub role: Option<TeamRole>,
    #[serde(default)]
    pub access_level: Option<AccessLevel>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeMemberRoleRequest {
    pub role: TeamRole,
}

#[derive(Debug, Deserialize)]
pub struct ChangeAccessRequest {
    pub access_level: AccessLevel,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub role: TeamRole,
    pub access_level: AccessLevel,
    pub joined_at: String,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub members: Vec<MemberResponse>,
    pub created_at: String,
}

pub(crate) fn to_response(team: Team) -> TeamResponse {
    TeamResponse {
        id: hex(team.id),
        organization_id: team.organization_id.to_hex(),
        name: team.name,
        description: team.description,
        created_by: team.created_by.to_hex(),
        members: team
            .members
            .into_iter()
            .map(|m| MemberResponse {
                user_id: m.user_id.to_hex(),
                role: m.role,
                access_level: m.access_level,
                joined_at: timestamp(m.joined_at),
            })
            .collect(),
        created_at: timestamp(team.created_at),
    }
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiError> {
    if !auth.role.can_create_teams() {
        return Err(ApiError::Forbidden(
            "Only team creators can create teams.".to_string(),
        ));
    }
    body.validate()?;

    let description = body
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let team = state
        .teams
        .create(auth.organization_id, &body.name, description, auth.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(team))))
}

pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<TeamResponse>>, ApiError> {
    let teams = state
        .teams
        .list_for_member(auth.organization_id, auth.user_id)
        .await?;
    Ok(Json(teams.into_iter().map(to_response).collect()))
}

pub async fn list_all(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<TeamResponse>>, ApiError> {
    let teams = if auth.is_superadmin() {
        state.teams.list_all().await?
    } else {
        state.teams.list_by_organization(auth.organization_id).await?
    };
    Ok(Json(teams.into_iter().map(to_response).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TeamResponse>, ApiError> {
    let id = parse_id(&id, "team id")?;
    let team = state.scopes.team(&auth.caller(), id, Level::Read).await?;
    Ok(Json(to_response(team)))
}

/// Deletes the team after removing each of its projects with their chats.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "team id")?;
    state.scopes.team(&auth.caller(), id, Level::Admin).await?;

    let projects = state.projects.find_by_teams(&[id]).await?;
    let project_count = projects.len();
    for project in projects {
        delete_project_tree(&state, &project).await?;
    }
    state.teams.delete(id).await?;

    info!(team_id = %id, projects = project_count, "Team removed with its projects");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiError> {
    let id = parse_id(&id, "team id")?;
    let user_id = parse_id(&body.user_id, "user id")?;
    let team = state.scopes.team(&auth.caller(), id, Level::Admin).await?;

    state
        .users
        .find_in_organization(team.organization_id, user_id)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => ApiError::Validation(
                "User does not belong to this organization.".to_string(),
            ),
            other => other.into(),
        })?;

    let membership = Membership {
        user_id,
        role: body.role.unwrap_or_default(),
        access_level: body.access_level.unwrap_or_default(),
        joined_at: DateTime::now(),
    };
    let team = state.teams.add_member(id, membership).await?;
    Ok((StatusCode::CREATED, Json(to_response(team))))
}

pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<TeamResponse>, ApiError> {
    let id = parse_id(&id, "team id")?;
    let user_id = parse_id(&user_id, "user id")?;
    state.scopes.team(&auth.caller(), id, Level::Admin).await?;

    let team = state.teams.remove_member(id, user_id).await?;
    Ok(Json(to_response(team)))
}

pub async fn change_member_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    Json(body): Json<ChangeMemberRoleRequest>,
) -> Result<Json<TeamResponse>, ApiError> {
    let id = parse_id(&id, "team id")?;
    let user_id = parse_id(&user_id, "user id")?;
    state.scopes.team(&auth.caller(), id, Level::Admin).await?;

    let team = state.teams.set_member_role(id, user_id, body.role).await?;
    Ok(Json(to_response(team)))
}

pub async fn change_access_level(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    Json(body): Json<ChangeAccessRequest>,
) -> Result<Json<TeamResponse>, ApiError> {
    let id = parse_id(&id, "team id")?;
    let user_id = parse_id(&user_id, "user id")?;
    state.scopes.team(&auth.caller(), id, Level::Admin).await?;

    let team = state
        .teams
        .set_member_access(id, user_id, body.access_level)
        .await?;
    Ok(Json(to_response(team)))
}
