use atelier_db::models::{Chat, Message};
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use std::collections::HashMap;
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult};

/// Chats and their messages. Messages are only ever inserted and deleted.
pub struct ChatDao {
    pub base: BaseDao<Chat>,
    pub messages: BaseDao<Message>,
}

impl ChatDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Chat::COLLECTION),
            messages: BaseDao::new(db, Message::COLLECTION),
        }
    }

    pub async fn create(&self, project_id: ObjectId, created_by: Option<ObjectId>) -> DaoResult<Chat> {
        let now = DateTime::now();
        let chat = Chat {
            id: None,
            project_id,
            message_ids: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&chat).await?;
        info!(%id, %project_id, "Chat created");
        self.base.find_by_id(id).await
    }

    pub async fn find_in_project(
        &self,
        project_id: ObjectId,
        chat_id: ObjectId,
    ) -> DaoResult<Option<Chat>> {
        self.base
            .find_one(doc! { "_id": chat_id, "project_id": project_id })
            .await
    }

    pub async fn latest_in_project(&self, project_id: ObjectId) -> DaoResult<Option<Chat>> {
        Ok(self
            .base
            .collection()
            .find_one(doc! { "project_id": project_id })
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await?)
    }

    pub async fn find_by_project(&self, project_id: ObjectId) -> DaoResult<Vec<Chat>> {
        self.base
            .find_many(
                doc! { "project_id": project_id },
                Some(doc! { "created_at": 1 }),
            )
            .await
    }

    pub async fn insert_message(&self, message: &Message) -> DaoResult<Message> {
        let id = self.messages.insert_one(message).await?;
        self.messages.find_by_id(id).await
    }

    /// Atomic `$push` onto the chat's ordered message list.
    pub async fn append_message(&self, chat_id: ObjectId, message_id: ObjectId) -> DaoResult<()> {
        let matched = self
            .base
            .update_by_id(chat_id, doc! { "$push": { "message_ids": message_id } })
            .await?;
        if !matched {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    /// Messages of `chat` in the order given by its `message_ids`.
    pub async fn messages_of(&self, chat: &Chat) -> DaoResult<Vec<Message>> {
        if chat.message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = self
            .messages
            .find_many(doc! { "_id": { "$in": chat.message_ids.clone() } }, None)
            .await?;
        Ok(order_by_ids(&chat.message_ids, found))
    }

    /// Deletes a chat's messages, then the chat itself.
    pub async fn delete_cascade(&self, chat_id: ObjectId) -> DaoResult<u64> {
        let removed = self.messages.hard_delete(doc! { "chat_id": chat_id }).await?;
        self.base.hard_delete(doc! { "_id": chat_id }).await?;
        info!(%chat_id, messages = removed, "Chat deleted");
        Ok(removed)
    }
}

fn order_by_ids(ids: &[ObjectId], messages: Vec<Message>) -> Vec<Message> {
    let mut by_id: HashMap<ObjectId, Message> = messages
        .into_iter()
        .filter_map(|m| m.id.map(|id| (id, m)))
        .collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
