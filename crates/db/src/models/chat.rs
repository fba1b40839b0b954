use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// A thread of messages scoped to one project. `message_ids` is append-only
/// and defines the order of the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub project_id: ObjectId,
    #[serde(default)]
    pub message_ids: Vec<ObjectId>,
    pub created_by: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Chat {
    pub const COLLECTION: &'static str = "chats";
}
