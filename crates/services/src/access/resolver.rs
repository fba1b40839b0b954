use atelier_db::models::{Project, Team};
use bson::oid::ObjectId;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use super::{Caller, DenyReason, Grant, Level, authorize};
use crate::dao::{
    base::DaoError,
    project::ProjectDao,
    team::TeamDao,
};

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error(transparent)]
    Denied(#[from] DenyReason),
    #[error(transparent)]
    Dao(DaoError),
}

impl From<DaoError> for ScopeError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound => ScopeError::NotFound("Resource"),
            other => ScopeError::Dao(other),
        }
    }
}

/// Loads the team a request targets, directly or through a project, and
/// runs the gate on it.
pub struct ScopeResolver {
    teams: Arc<TeamDao>,
    projects: Arc<ProjectDao>,
}

impl ScopeResolver {
    pub fn new(teams: Arc<TeamDao>, projects: Arc<ProjectDao>) -> Self {
        Self { teams, projects }
    }

    pub async fn team(
        &self,
        caller: &Caller,
        team_id: ObjectId,
        required: Level,
    ) -> Result<Team, ScopeError> {
        let team = self
            .teams
            .base
            .find_one(bson::doc! { "_id": team_id })
            .await?
            .ok_or(ScopeError::NotFound("Team"))?;

        check(caller, &team, required)?;
        Ok(team)
    }

    pub async fn project(
        &self,
        caller: &Caller,
        project_id: ObjectId,
        required: Level,
    ) -> Result<Project, ScopeError> {
        let project = self
            .projects
            .base
            .find_one(bson::doc! { "_id": project_id })
            .await?
            .ok_or(ScopeError::NotFound("Project"))?;

        self.team(caller, project.team_id, required).await?;
        Ok(project)
    }
}

pub(crate) fn check(caller: &Caller, team: &Team, required: Level) -> Result<Grant, DenyReason> {
    authorize(caller, team, required).into_result().inspect_err(|reason| {
        warn!(
            user_id = %caller.user_id,
            team_id = ?team.id,
            ?required,
            reason = reason.code(),
            "Access denied"
        );
    })
}
