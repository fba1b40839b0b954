use async_trait::async_trait;
use atelier_db::models::{Chat, Message, Project, Team};
use bson::oid::ObjectId;
use std::sync::Arc;

use crate::dao::{
    base::{DaoError, DaoResult},
    chat::ChatDao,
    project::ProjectDao,
    team::TeamDao,
};

/// Storage the chat orchestrator runs against.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn project(&self, project_id: ObjectId) -> DaoResult<Option<Project>>;

    async fn team(&self, team_id: ObjectId) -> DaoResult<Option<Team>>;

    async fn chat_in_project(
        &self,
        project_id: ObjectId,
        chat_id: ObjectId,
    ) -> DaoResult<Option<Chat>>;

    async fn latest_chat(&self, project_id: ObjectId) -> DaoResult<Option<Chat>>;

    /// Creates a chat and records it on the project.
    async fn create_chat(&self, project_id: ObjectId, created_by: ObjectId) -> DaoResult<Chat>;

    async fn insert_message(&self, message: Message) -> DaoResult<Message>;

    /// Atomically appends `message_id` to the chat's message list.
    async fn append_to_chat(&self, chat_id: ObjectId, message_id: ObjectId) -> DaoResult<()>;

    async fn chat_messages(&self, chat: &Chat) -> DaoResult<Vec<Message>>;
}

pub struct MongoChatStore {
    chats: Arc<ChatDao>,
    projects: Arc<ProjectDao>,
    teams: Arc<TeamDao>,
}

impl MongoChatStore {
    pub fn new(chats: Arc<ChatDao>, projects: Arc<ProjectDao>, teams: Arc<TeamDao>) -> Self {
        Self {
            chats,
            projects,
            teams,
        }
    }
}

#[async_trait]
impl ChatStore for MongoChatStore {
    async fn project(&self, project_id: ObjectId) -> DaoResult<Option<Project>> {
        self.projects
            .base
            .find_one(bson::doc! { "_id": project_id })
            .await
    }

    async fn team(&self, team_id: ObjectId) -> DaoResult<Option<Team>> {
        self.teams.base.find_one(bson::doc! { "_id": team_id }).await
    }

    async fn chat_in_project(
        &self,
        project_id: ObjectId,
        chat_id: ObjectId,
    ) -> DaoResult<Option<Chat>> {
        self.chats.find_in_project(project_id, chat_id).await
    }

    async fn latest_chat(&self, project_id: ObjectId) -> DaoResult<Option<Chat>> {
        self.chats.latest_in_project(project_id).await
    }

    async fn create_chat(&self, project_id: ObjectId, created_by: ObjectId) -> DaoResult<Chat> {
        let chat = self.chats.create(project_id, Some(created_by)).await?;
        let chat_id = chat.id.ok_or(DaoError::NotFound)?;
        self.projects.attach_chat(project_id, chat_id).await?;
        Ok(chat)
    }

    async fn insert_message(&self, message: Message) -> DaoResult<Message> {
        self.chats.insert_message(&message).await
    }

    async fn append_to_chat(&self, chat_id: ObjectId, message_id: ObjectId) -> DaoResult<()> {
        self.chats.append_message(chat_id, message_id).await
    }

    async fn chat_messages(&self, chat: &Chat) -> DaoResult<Vec<Message>> {
        self.chats.messages_of(chat).await
    }
}
