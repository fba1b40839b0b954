use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub organization_id: ObjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_by: ObjectId,
    #[serde(default)]
    pub members: Vec<Membership>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub user_id: ObjectId,
    #[serde(default)]
    pub role: TeamRole,
    #[serde(default)]
    pub access_level: AccessLevel,
    pub joined_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    TeamAdmin,
    #[default]
    Member,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Read,
    Write,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::TeamAdmin => "team_admin",
            TeamRole::Member => "member",
        }
    }
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        }
    }
}

impl Team {
    pub const COLLECTION: &'static str = "teams";

    pub fn member(&self, user_id: ObjectId) -> Option<&Membership> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}
