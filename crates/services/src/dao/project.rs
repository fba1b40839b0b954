use atelier_db::models::{Dataset, Project};
use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::Database;
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct ProjectDao {
    pub base: BaseDao<Project>,
}

impl ProjectDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Project::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        team_id: ObjectId,
        name: &str,
        description: &str,
        created_by: ObjectId,
    ) -> DaoResult<Project> {
        let now = DateTime::now();
        let project = Project {
            id: None,
            team_id,
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            datasets: Vec::new(),
            chat_ids: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&project).await?;
        info!(%id, %team_id, "Project created");
        self.base.find_by_id(id).await
    }

    pub async fn find_by_teams(&self, team_ids: &[ObjectId]) -> DaoResult<Vec<Project>> {
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.base
            .find_many(
                doc! { "team_id": { "$in": team_ids.to_vec() } },
                Some(doc! { "created_at": -1 }),
            )
            .await
    }

    pub async fn update(
        &self,
        project_id: ObjectId,
        name: Option<String>,
        description: Option<String>,
    ) -> DaoResult<Project> {
        let mut update = Document::new();
        if let Some(name) = name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            update.insert("name", name);
        }
        if let Some(description) = description {
            update.insert("description", description.trim());
        }

        if !update.is_empty() {
            let matched = self
                .base
                .update_by_id(project_id, doc! { "$set": update })
                .await?;
            if !matched {
                return Err(DaoError::NotFound);
            }
        }
        self.base.find_by_id(project_id).await
    }

    pub async fn add_datasets(
        &self,
        project_id: ObjectId,
        datasets: &[Dataset],
    ) -> DaoResult<Project> {
        let entries = datasets
            .iter()
            .map(bson::to_bson)
            .collect::<Result<Vec<_>, _>>()?;

        let matched = self
            .base
            .update_by_id(
                project_id,
                doc! { "$push": { "datasets": { "$each": entries } } },
            )
            .await?;
        if !matched {
            return Err(DaoError::NotFound);
        }

        info!(%project_id, count = datasets.len(), "Datasets added");
        self.base.find_by_id(project_id).await
    }

    pub async fn attach_chat(&self, project_id: ObjectId, chat_id: ObjectId) -> DaoResult<()> {
        let matched = self
            .base
            .update_by_id(project_id, doc! { "$push": { "chat_ids": chat_id } })
            .await?;
        if !matched {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    pub async fn delete(&self, project_id: ObjectId) -> DaoResult<()> {
        let deleted = self.base.hard_delete(doc! { "_id": project_id }).await?;
        if deleted == 0 {
            return Err(DaoError::NotFound);
        }
        info!(%project_id, "Project deleted");
        Ok(())
    }
}
