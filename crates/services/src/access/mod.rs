//! Team-scoped access control.
//!
//! [`authorize`] is the only place a membership list is inspected. Callers
//! that reach a team through a project go through [`ScopeResolver`], which
//! loads the owning team and then asks the same function.

pub(crate) mod resolver;

pub use resolver::{ScopeError, ScopeResolver};

use atelier_db::models::{AccessLevel, GlobalRole, Membership, Team, TeamRole};
use bson::oid::ObjectId;
use serde::Serialize;
use thiserror::Error;

/// Identity of the requester as carried by its access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: ObjectId,
    pub organization_id: ObjectId,
    pub role: GlobalRole,
}

/// Capability required by an operation, and the level a grant resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Read,
    Write,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("Not in this organization.")]
    CrossOrganizationAccess,
    #[error("Not a member of this team.")]
    NotATeamMember,
    #[error("Insufficient team role or access level.")]
    InsufficientRole,
}

impl DenyReason {
    /// Stable code exposed to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::CrossOrganizationAccess => "cross_organization_access",
            DenyReason::NotATeamMember => "not_a_team_member",
            DenyReason::InsufficientRole => "insufficient_role",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub level: Level,
    /// Absent for superadmins, who are allowed without being members.
    pub membership: Option<Membership>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow(Grant),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn into_result(self) -> Result<Grant, DenyReason> {
        match self {
            Decision::Allow(grant) => Ok(grant),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Level a membership entry confers. `team_admin` implies write.
pub fn effective_level(membership: &Membership) -> Level {
    match (membership.role, membership.access_level) {
        (TeamRole::TeamAdmin, _) => Level::Admin,
        (TeamRole::Member, AccessLevel::Write) => Level::Write,
        (TeamRole::Member, AccessLevel::Read) => Level::Read,
    }
}

/// Decides whether `caller` may act on `team` at `required` level.
///
/// Pure and side-effect free; the checks run in a fixed order so the deny
/// reason is stable: superadmin bypass, organization boundary, membership,
/// then capability.
pub fn authorize(caller: &Caller, team: &Team, required: Level) -> Decision {
    if caller.role == GlobalRole::Superadmin {
        return Decision::Allow(Grant {
            level: Level::Admin,
            membership: team.member(caller.user_id).cloned(),
        });
    }

    if caller.organization_id != team.organization_id {
        return Decision::Deny(DenyReason::CrossOrganizationAccess);
    }

    let Some(membership) = team.member(caller.user_id) else {
        return Decision::Deny(DenyReason::NotATeamMember);
    };

    let level = effective_level(membership);
    if level < required {
        return Decision::Deny(DenyReason::InsufficientRole);
    }

    Decision::Allow(Grant {
        level,
        membership: Some(membership.clone()),
    })
}
