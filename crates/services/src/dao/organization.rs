use atelier_db::models::Organization;
use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::Database;
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct OrganizationDao {
    pub base: BaseDao<Organization>,
}

/// Lower-cases and trims an email or domain before it is stored or queried.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

impl OrganizationDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Organization::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        name: &str,
        domain: &str,
        email: &str,
        password_hash: String,
    ) -> DaoResult<Organization> {
        let domain = normalize_key(domain);
        let email = normalize_key(email);

        self.ensure_unique(None, Some(&email), Some(&domain)).await?;

        let now = DateTime::now();
        let organization = Organization {
            id: None,
            name: name.trim().to_string(),
            domain,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        };

        let id = self
            .base
            .insert_one(&organization)
            .await
            .map_err(duplicate_message)?;
        info!(%id, domain = %organization.domain, "Organization registered");
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<Organization> {
        self.base
            .find_one(doc! { "email": normalize_key(email) })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn list(&self) -> DaoResult<Vec<Organization>> {
        self.base.find_many(doc! {}, Some(doc! { "name": 1 })).await
    }

    pub async fn update(
        &self,
        id: ObjectId,
        name: Option<String>,
        domain: Option<String>,
        email: Option<String>,
    ) -> DaoResult<Organization> {
        let domain = domain.as_deref().map(normalize_key);
        let email = email.as_deref().map(normalize_key);

        self.ensure_unique(Some(id), email.as_deref(), domain.as_deref())
            .await?;

        let mut update = Document::new();
        if let Some(name) = name {
            update.insert("name", name.trim());
        }
        if let Some(domain) = domain {
            update.insert("domain", domain);
        }
        if let Some(email) = email {
            update.insert("email", email);
        }

        if !update.is_empty() {
            let matched = self
                .base
                .update_by_id(id, doc! { "$set": update })
                .await
                .map_err(duplicate_message)?;
            if !matched {
                return Err(DaoError::NotFound);
            }
        }

        self.base.find_by_id(id).await
    }

    pub async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        let deleted = self.base.hard_delete(doc! { "_id": id }).await?;
        if deleted == 0 {
            return Err(DaoError::NotFound);
        }
        info!(%id, "Organization deleted");
        Ok(())
    }

    /// Reports which of email/domain is already taken by another organization.
    async fn ensure_unique(
        &self,
        exclude: Option<ObjectId>,
        email: Option<&str>,
        domain: Option<&str>,
    ) -> DaoResult<()> {
        let mut alternatives = Vec::new();
        if let Some(email) = email {
            alternatives.push(doc! { "email": email });
        }
        if let Some(domain) = domain {
            alternatives.push(doc! { "domain": domain });
        }
        if alternatives.is_empty() {
            return Ok(());
        }

        let mut filter = doc! { "$or": alternatives };
        if let Some(id) = exclude {
            filter.insert("_id", doc! { "$ne": id });
        }

        if let Some(existing) = self.base.find_one(filter).await? {
            let field = if email.is_some_and(|e| e == existing.email) {
                "email"
            } else {
                "domain"
            };
            return Err(DaoError::DuplicateKey(format!(
                "An organization with that {} already exists.",
                field
            )));
        }
        Ok(())
    }
}

/// Rewrites a raw E11000 message into the field-level message clients see.
fn duplicate_message(err: DaoError) -> DaoError {
    match err {
        DaoError::DuplicateKey(raw) => {
            let field = if raw.contains("email") { "email" } else { "domain" };
            DaoError::DuplicateKey(format!(
                "An organization with that {} already exists.",
                field
            ))
        }
        other => other,
    }
}
