use bson::{doc, oid::ObjectId};
use serde_json::{Value, json};

use super::test_app::TestApp;

pub const PASSWORD: &str = "Password123!";

pub struct SeededOrganization {
    pub id: String,
    pub email: String,
    pub access_token: String,
}

pub struct SeededUser {
    pub id: String,
    pub email: String,
    pub access_token: String,
}

/// An organization with one team: a team admin, a read-only member, a
/// write member, a same-organization outsider, and one project.
pub struct SeededTeam {
    pub organization: SeededOrganization,
    pub admin: SeededUser,
    pub reader: SeededUser,
    pub writer: SeededUser,
    pub outsider: SeededUser,
    pub team_id: String,
    pub project_id: String,
}

impl TestApp {
    pub async fn register_organization(&self, name: &str, domain: &str) -> SeededOrganization {
        let email = format!("owner@{}", domain);
        let resp = self
            .client
            .post(self.url("/api/organizations/register"))
            .json(&json!({
                "name": name,
                "domain": domain,
                "email": email,
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("Organization register request failed");

        assert_eq!(resp.status().as_u16(), 201, "Organization register failed");
        let json: Value = resp.json().await.expect("Failed to parse register response");

        SeededOrganization {
            id: json["organization"]["id"].as_str().unwrap().to_string(),
            email,
            access_token: json["access_token"].as_str().unwrap().to_string(),
        }
    }

    /// Register a user into an organization and return their auth info.
    pub async fn register_user(&self, organization_id: &str, name: &str, email: &str) -> SeededUser {
        let resp = self
            .client
            .post(self.url("/api/users/register"))
            .json(&json!({
                "organization_id": organization_id,
                "name": name,
                "email": email,
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("Register request failed");

        let status = resp.status().as_u16();
        let json: Value = resp.json().await.expect("Failed to parse register response");
        assert_eq!(status, 201, "Register failed: {}", json);

        SeededUser {
            id: json["user"]["id"].as_str().unwrap().to_string(),
            email: email.to_string(),
            access_token: json["access_token"].as_str().unwrap().to_string(),
        }
    }

    /// Grant `team_creator` through the organization account.
    pub async fn promote_to_team_creator(&self, organization: &SeededOrganization, user: &SeededUser) {
        let resp = self
            .auth_put(
                &format!(
                    "/api/organizations/{}/members/{}/role",
                    organization.id, user.id
                ),
                &organization.access_token,
            )
            .json(&json!({ "role": "team_creator" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200, "Promotion failed");
    }

    /// Superadmin is provisioned out of band, directly in the store.
    pub async fn make_superadmin(&self, user: &SeededUser) {
        let id = ObjectId::parse_str(&user.id).unwrap();
        self.db
            .collection::<bson::Document>("users")
            .update_one(doc! { "_id": id }, doc! { "$set": { "role": "superadmin" } })
            .await
            .expect("Failed to grant superadmin");
    }

    pub async fn create_team(&self, token: &str, name: &str) -> Value {
        let resp = self
            .auth_post("/api/teams", token)
            .json(&json!({ "name": name, "description": "seeded" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201, "Team create failed");
        resp.json().await.unwrap()
    }

    pub async fn add_member(&self, token: &str, team_id: &str, user_id: &str, role: &str, access: &str) {
        let resp = self
            .auth_post(&format!("/api/teams/{}/members", team_id), token)
            .json(&json!({ "user_id": user_id, "role": role, "access_level": access }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201, "Add member failed");
    }

    pub async fn create_project(&self, token: &str, team_id: &str, name: &str) -> Value {
        let resp = self
            .auth_post("/api/projects", token)
            .json(&json!({ "team_id": team_id, "name": name, "description": "seeded" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201, "Project create failed");
        resp.json().await.unwrap()
    }

    pub async fn seed_team(&self, slug: &str) -> SeededTeam {
        let domain = format!("{}.test", slug);
        let organization = self
            .register_organization(&format!("{} Corp", slug), &domain)
            .await;

        let admin = self
            .register_user(&organization.id, "Admin", &format!("admin@{}", domain))
            .await;
        let reader = self
            .register_user(&organization.id, "Reader", &format!("reader@{}", domain))
            .await;
        let writer = self
            .register_user(&organization.id, "Writer", &format!("writer@{}", domain))
            .await;
        let outsider = self
            .register_user(&organization.id, "Outsider", &format!("outsider@{}", domain))
            .await;

        self.promote_to_team_creator(&organization, &admin).await;
        let team = self.create_team(&admin.access_token, "Research").await;
        let team_id = team["id"].as_str().unwrap().to_string();

        self.add_member(&admin.access_token, &team_id, &reader.id, "member", "read")
            .await;
        self.add_member(&admin.access_token, &team_id, &writer.id, "member", "write")
            .await;

        let project = self
            .create_project(&admin.access_token, &team_id, "Forecasting")
            .await;
        let project_id = project["id"].as_str().unwrap().to_string();

        SeededTeam {
            organization,
            admin,
            reader,
            writer,
            outsider,
            team_id,
            project_id,
        }
    }

    /// Create an authenticated request with the given token.
    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_patch(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    /// Submit a text-only chat turn.
    pub async fn submit_text(
        &self,
        token: &str,
        project_id: &str,
        content: &str,
        extra: &[(&str, &str)],
    ) -> reqwest::Response {
        let mut form = reqwest::multipart::Form::new()
            .text("project_id", project_id.to_string())
            .text("content", content.to_string());
        for (name, value) in extra {
            form = form.text(name.to_string(), value.to_string());
        }
        self.auth_post("/api/chat", token)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }
}
