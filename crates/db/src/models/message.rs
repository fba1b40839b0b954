use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Immutable once written; there is no update path for messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub chat_id: ObjectId,
    pub sender: Sender,
    pub author_id: Option<ObjectId>,
    pub content: Option<String>,
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub selected_datasets: Vec<ObjectId>,
    #[serde(default)]
    pub temp_files: Vec<TempFile>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Chatbot,
}

/// Upload attached to a single user turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TempFile {
    pub original_name: String,
    pub path: String,
}

impl Message {
    pub const COLLECTION: &'static str = "messages";
}
