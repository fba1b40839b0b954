use atelier_db::models::{Chat, Dataset, Project};
use atelier_services::{Level, dao::base::DaoError};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use tracing::info;
use validator::Validate;

use super::{hex, timestamp};
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
    uploads,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    pub team_id: String,
    #[validate(length(min = 1, message = "Project name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, message = "Project name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    pub id: String,
    pub name: String,
    pub url: String,
    pub uploaded_by: String,
    pub uploaded_at: String,
}

#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub message_count: usize,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub description: String,
    pub datasets: Vec<DatasetResponse>,
    pub chat_ids: Vec<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetailResponse {
    #[serde(flatten)]
    pub project: ProjectResponse,
    pub chats: Vec<ChatSummary>,
}

fn dataset_response(d: Dataset) -> DatasetResponse {
    DatasetResponse {
        id: d.id.to_hex(),
        name: d.name,
        url: d.url,
        uploaded_by: d.uploaded_by.to_hex(),
        uploaded_at: timestamp(d.uploaded_at),
    }
}

fn to_response(p: Project) -> ProjectResponse {
    ProjectResponse {
        id: hex(p.id),
        team_id: p.team_id.to_hex(),
        name: p.name,
        description: p.description,
        datasets: p.datasets.into_iter().map(dataset_response).collect(),
        chat_ids: p.chat_ids.iter().map(|c| c.to_hex()).collect(),
        created_by: p.created_by.to_hex(),
        created_at: timestamp(p.created_at),
        updated_at: timestamp(p.updated_at),
    }
}

fn chat_summary(c: Chat) -> ChatSummary {
    ChatSummary {
        id: hex(c.id),
        message_count: c.message_ids.len(),
        created_at: timestamp(c.created_at),
    }
}

/// Removes a project's chats (messages first), then the project itself.
pub(crate) async fn delete_project_tree(state: &AppState, project: &Project) -> Result<(), ApiError> {
    let project_id = project.id.ok_or(DaoError::NotFound)?;

    let chats = state.chats.find_by_project(project_id).await?;
    let mut messages = 0;
    for chat in &chats {
        if let Some(chat_id) = chat.id {
            messages += state.chats.delete_cascade(chat_id).await?;
        }
    }
    state.projects.delete(project_id).await?;

    info!(%project_id, chats = chats.len(), messages, "Project removed with its chats");
    Ok(())
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    body.validate()?;
    let team_id = parse_id(&body.team_id, "team id")?;
    state
        .scopes
        .team(&auth.caller(), team_id, Level::Admin)
        .await?;

    let project = state
        .projects
        .create(team_id, &body.name, &body.description, auth.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(to_response(project))))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let teams = if auth.is_superadmin() {
        state.teams.list_all().await?
    } else {
        state.teams.list_by_organization(auth.organization_id).await?
    };
    let team_ids: Vec<ObjectId> = teams.iter().filter_map(|t| t.id).collect();

    let projects = state.projects.find_by_teams(&team_ids).await?;
    Ok(Json(projects.into_iter().map(to_response).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectDetailResponse>, ApiError> {
    let id = parse_id(&id, "project id")?;
    let project = state.scopes.project(&auth.caller(), id, Level::Read).await?;

    let chats = state.chats.find_by_project(id).await?;
    Ok(Json(ProjectDetailResponse {
        project: to_response(project),
        chats: chats.into_iter().map(chat_summary).collect(),
    }))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let id = parse_id(&id, "project id")?;
    state.scopes.project(&auth.caller(), id, Level::Write).await?;
    body.validate()?;

    let project = state
        .projects
        .update(id, body.name, body.description)
        .await?;
    Ok(Json(to_response(project)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "project id")?;
    let project = state.scopes.project(&auth.caller(), id, Level::Admin).await?;

    delete_project_tree(&state, &project).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Writes each named file part of `multipart` under `scope`, pushing onto
/// `stored` as it goes so the caller can discard them on failure.
async fn store_parts(
    multipart: &mut Multipart,
    root: &FsPath,
    scope: &str,
    stored: &mut Vec<uploads::StoredFile>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        // An empty file input still sends a part, with a blank name.
        let Some(file_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;

        stored.push(uploads::store(root, scope, &file_name, &bytes).await?);
    }
    Ok(())
}

/// Stores every file part of the form and appends it to the project's datasets.
pub async fn upload_datasets(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<DatasetResponse>>), ApiError> {
    let id = parse_id(&id, "project id")?;
    state.scopes.project(&auth.caller(), id, Level::Admin).await?;

    let root = FsPath::new(&state.settings.uploads.dir);
    let scope = format!("projects/{}", id.to_hex());
    let mut stored = Vec::new();

    if let Err(e) = store_parts(&mut multipart, root, &scope, &mut stored).await {
        uploads::discard(&stored).await;
        return Err(e);
    }
    if stored.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    let datasets: Vec<Dataset> = stored
        .iter()
        .map(|file| Dataset {
            id: ObjectId::new(),
            name: file.original_name.clone(),
            url: format!("/uploads/{}", file.storage_key),
            uploaded_by: auth.user_id,
            uploaded_at: DateTime::now(),
        })
        .collect();

    if let Err(e) = state.projects.add_datasets(id, &datasets).await {
        uploads::discard(&stored).await;
        return Err(e.into());
    }
    Ok((
        StatusCode::CREATED,
        Json(datasets.into_iter().map(dataset_response).collect()),
    ))
}

pub async fn list_datasets(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<DatasetResponse>>, ApiError> {
    let id = parse_id(&id, "project id")?;
    let project = state.scopes.project(&auth.caller(), id, Level::Read).await?;

    Ok(Json(
        project
            .datasets
            .into_iter()
            .map(dataset_response)
            .collect(),
    ))
}
