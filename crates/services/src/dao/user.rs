use atelier_db::models::{GlobalRole, RoleChange, User};
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult};
use super::organization::normalize_key;

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        organization_id: ObjectId,
        name: &str,
        email: &str,
        password_hash: String,
        role: GlobalRole,
    ) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            organization_id,
            name: name.trim().to_string(),
            email: normalize_key(email),
            password_hash: Some(password_hash),
            role,
            role_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await.map_err(|e| match e {
            DaoError::DuplicateKey(_) => {
                DaoError::DuplicateKey("A user with that email already exists.".to_string())
            }
            other => other,
        })?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<User> {
        self.base
            .find_one(doc! { "email": normalize_key(email) })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_in_organization(
        &self,
        organization_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<User> {
        self.base
            .find_one(doc! { "_id": user_id, "organization_id": organization_id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn list_by_organization(&self, organization_id: ObjectId) -> DaoResult<Vec<User>> {
        self.base
            .find_many(
                doc! { "organization_id": organization_id },
                Some(doc! { "name": 1 }),
            )
            .await
    }

    pub async fn list_all(&self) -> DaoResult<Vec<User>> {
        self.base.find_many(doc! {}, Some(doc! { "name": 1 })).await
    }

    /// Moves a user to a new global role and records who issued the change.
    ///
    /// The filter pins the role the user currently holds, so two concurrent
    /// transitions cannot both apply.
    pub async fn change_role(
        &self,
        organization_id: ObjectId,
        user_id: ObjectId,
        to: GlobalRole,
        issued_by: ObjectId,
    ) -> DaoResult<User> {
        let user = self.find_in_organization(organization_id, user_id).await?;
        let from = user.role;

        if !from.can_transition_to(to) {
            return Err(DaoError::Validation(format!(
                "Cannot change role from {} to {}",
                from.as_str(),
                to.as_str()
            )));
        }

        let change = RoleChange {
            from,
            to,
            issued_by,
            issued_at: DateTime::now(),
        };

        let applied = self
            .base
            .update_one(
                doc! {
                    "_id": user_id,
                    "organization_id": organization_id,
                    "role": bson::to_bson(&from)?,
                },
                doc! {
                    "$set": { "role": bson::to_bson(&to)? },
                    "$push": { "role_history": bson::to_bson(&change)? },
                },
            )
            .await?;

        if !applied {
            return Err(DaoError::Validation(
                "Role was changed concurrently; retry".to_string(),
            ));
        }

        info!(%user_id, from = from.as_str(), to = to.as_str(), %issued_by, "User role changed");
        self.base.find_by_id(user_id).await
    }
}
