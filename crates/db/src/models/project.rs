use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub team_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub chat_ids: Vec<ObjectId>,
    pub created_by: ObjectId,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Uploaded resource that a chat turn can reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub id: ObjectId,
    pub name: String,
    pub url: String,
    pub uploaded_by: ObjectId,
    pub uploaded_at: DateTime,
}

impl Project {
    pub const COLLECTION: &'static str = "projects";
}
