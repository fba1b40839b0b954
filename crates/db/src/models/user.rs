use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub organization_id: ObjectId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub role: GlobalRole,
    #[serde(default)]
    pub role_history: Vec<RoleChange>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Organization-wide role, independent of any team membership.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    #[default]
    User,
    TeamCreator,
    Superadmin,
}

impl GlobalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::User => "user",
            GlobalRole::TeamCreator => "team_creator",
            GlobalRole::Superadmin => "superadmin",
        }
    }

    pub fn can_create_teams(&self) -> bool {
        matches!(self, GlobalRole::TeamCreator | GlobalRole::Superadmin)
    }

    /// Organization owners may only move users between `user` and
    /// `team_creator`; `superadmin` is provisioned out of band.
    pub fn can_transition_to(&self, to: GlobalRole) -> bool {
        matches!(
            (self, to),
            (GlobalRole::User, GlobalRole::TeamCreator) | (GlobalRole::TeamCreator, GlobalRole::User)
        )
    }
}

/// Audit entry appended on every global role change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChange {
    pub from: GlobalRole,
    pub to: GlobalRole,
    pub issued_by: ObjectId,
    pub issued_at: DateTime,
}

impl User {
    pub const COLLECTION: &'static str = "users";
}
