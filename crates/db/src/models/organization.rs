use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Top-level tenant. Owns users and teams by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub domain: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Organization {
    pub const COLLECTION: &'static str = "organizations";
}
