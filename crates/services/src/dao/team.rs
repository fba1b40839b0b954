use atelier_db::models::{AccessLevel, Membership, Team, TeamRole};
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct TeamDao {
    pub base: BaseDao<Team>,
}

impl TeamDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Team::COLLECTION),
        }
    }

    /// Creates a team with its creator as the first `team_admin` holding write access.
    pub async fn create(
        &self,
        organization_id: ObjectId,
        name: &str,
        description: Option<String>,
        creator_id: ObjectId,
    ) -> DaoResult<Team> {
        let now = DateTime::now();
        let team = Team {
            id: None,
            organization_id,
            name: name.trim().to_string(),
            description,
            created_by: creator_id,
            members: vec![Membership {
                user_id: creator_id,
                role: TeamRole::TeamAdmin,
                access_level: AccessLevel::Write,
                joined_at: now,
            }],
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&team).await?;
        info!(%id, %organization_id, "Team created");
        self.base.find_by_id(id).await
    }

    pub async fn list_by_organization(&self, organization_id: ObjectId) -> DaoResult<Vec<Team>> {
        self.base
            .find_many(
                doc! { "organization_id": organization_id },
                Some(doc! { "name": 1 }),
            )
            .await
    }

    pub async fn list_all(&self) -> DaoResult<Vec<Team>> {
        self.base.find_many(doc! {}, Some(doc! { "name": 1 })).await
    }

    pub async fn list_for_member(
        &self,
        organization_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Vec<Team>> {
        self.base
            .find_many(
                doc! { "organization_id": organization_id, "members.user_id": user_id },
                Some(doc! { "name": 1 }),
            )
            .await
    }

    /// Appends a membership unless the user is already on the team.
    pub async fn add_member(&self, team_id: ObjectId, membership: Membership) -> DaoResult<Team> {
        let user_id = membership.user_id;
        let applied = self
            .base
            .update_one(
                doc! { "_id": team_id, "members.user_id": { "$ne": user_id } },
                doc! { "$push": { "members": bson::to_bson(&membership)? } },
            )
            .await?;

        if !applied {
            // Either the team is gone or the user is already a member.
            self.base.find_by_id(team_id).await?;
            return Err(DaoError::DuplicateKey(
                "User is already a member of this team".to_string(),
            ));
        }

        info!(%team_id, %user_id, role = membership.role.as_str(), "Team member added");
        self.base.find_by_id(team_id).await
    }

    pub async fn remove_member(&self, team_id: ObjectId, user_id: ObjectId) -> DaoResult<Team> {
        let applied = self
            .base
            .update_one(
                doc! { "_id": team_id, "members.user_id": user_id },
                doc! { "$pull": { "members": { "user_id": user_id } } },
            )
            .await?;
        if !applied {
            return Err(DaoError::NotFound);
        }

        info!(%team_id, %user_id, "Team member removed");
        self.base.find_by_id(team_id).await
    }

    pub async fn set_member_role(
        &self,
        team_id: ObjectId,
        user_id: ObjectId,
        role: TeamRole,
    ) -> DaoResult<Team> {
        self.set_member_field(team_id, user_id, "members.$.role", bson::to_bson(&role)?)
            .await
    }

    pub async fn set_member_access(
        &self,
        team_id: ObjectId,
        user_id: ObjectId,
        access_level: AccessLevel,
    ) -> DaoResult<Team> {
        self.set_member_field(
            team_id,
            user_id,
            "members.$.access_level",
            bson::to_bson(&access_level)?,
        )
        .await
    }

    async fn set_member_field(
        &self,
        team_id: ObjectId,
        user_id: ObjectId,
        path: &str,
        value: bson::Bson,
    ) -> DaoResult<Team> {
        let mut set = bson::Document::new();
        set.insert(path, value);
        let applied = self
            .base
            .update_one(
                doc! { "_id": team_id, "members.user_id": user_id },
                doc! { "$set": set },
            )
            .await?;
        if !applied {
            return Err(DaoError::NotFound);
        }
        self.base.find_by_id(team_id).await
    }

    pub async fn delete(&self, team_id: ObjectId) -> DaoResult<()> {
        let deleted = self.base.hard_delete(doc! { "_id": team_id }).await?;
        if deleted == 0 {
            return Err(DaoError::NotFound);
        }
        info!(%team_id, "Team deleted");
        Ok(())
    }
}
