use crate::fixtures::{seed::PASSWORD, test_app::TestApp};
use serde_json::{Value, json};

#[tokio::test]
async fn register_returns_token_and_normalized_keys() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/organizations/register"))
        .json(&json!({
            "name": "Acme",
            "domain": "  ACME.test ",
            "email": "Owner@Acme.test",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert!(json["access_token"].is_string());
    assert_eq!(json["organization"]["domain"], "acme.test");
    assert_eq!(json["organization"]["email"], "owner@acme.test");
    assert!(json["organization"].get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_domain_names_the_field() {
    let app = TestApp::spawn().await;
    app.register_organization("Acme", "acme.test").await;

    let resp = app
        .client
        .post(app.url("/api/organizations/register"))
        .json(&json!({
            "name": "Acme Two",
            "domain": "acme.test",
            "email": "other@acme2.test",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "conflict");
    assert!(json["message"].as_str().unwrap().contains("domain"));
}

#[tokio::test]
async fn missing_fields_fail_validation() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/organizations/register"))
        .json(&json!({
            "name": "",
            "domain": "acme.test",
            "email": "not-an-email",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn login_with_wrong_password_is_generic() {
    let app = TestApp::spawn().await;
    let org = app.register_organization("Acme", "acme.test").await;

    let ok = app
        .client
        .post(app.url("/api/organizations/login"))
        .json(&json!({ "email": org.email, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);

    let bad = app
        .client
        .post(app.url("/api/organizations/login"))
        .json(&json!({ "email": org.email, "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 401);
    let json: Value = bad.json().await.unwrap();
    assert_eq!(json["message"], "Invalid credentials");

    let unknown = app
        .client
        .post(app.url("/api/organizations/login"))
        .json(&json!({ "email": "ghost@nowhere.test", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 401);
}

#[tokio::test]
async fn listing_is_public_and_minimal() {
    let app = TestApp::spawn().await;
    app.register_organization("Acme", "acme.test").await;
    app.register_organization("Globex", "globex.test").await;

    let resp = reqwest::get(app.url("/api/organizations")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let list: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|o| o.get("password_hash").is_none()));
}

#[tokio::test]
async fn members_of_another_organization_are_hidden() {
    let app = TestApp::spawn().await;
    let acme = app.register_organization("Acme", "acme.test").await;
    let globex = app.register_organization("Globex", "globex.test").await;
    let alice = app.register_user(&acme.id, "Alice", "alice@acme.test").await;

    let own = app
        .auth_get(&format!("/api/organizations/{}/members", acme.id), &alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(own.status().as_u16(), 200);
    let members: Vec<Value> = own.json().await.unwrap();
    assert_eq!(members.len(), 1);

    let foreign = app
        .auth_get(&format!("/api/organizations/{}", globex.id), &alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status().as_u16(), 403);
}

#[tokio::test]
async fn only_the_organization_account_can_update() {
    let app = TestApp::spawn().await;
    let acme = app.register_organization("Acme", "acme.test").await;
    let alice = app.register_user(&acme.id, "Alice", "alice@acme.test").await;

    let denied = app
        .auth_put(&format!("/api/organizations/{}", acme.id), &alice.access_token)
        .json(&json!({ "name": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 403);

    let resp = app
        .auth_put(&format!("/api/organizations/{}", acme.id), &acme.access_token)
        .json(&json!({ "name": "Acme Labs" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["name"], "Acme Labs");
}

#[tokio::test]
async fn update_to_taken_email_conflicts() {
    let app = TestApp::spawn().await;
    let acme = app.register_organization("Acme", "acme.test").await;
    let globex = app.register_organization("Globex", "globex.test").await;

    let resp = app
        .auth_put(&format!("/api/organizations/{}", acme.id), &acme.access_token)
        .json(&json!({ "email": globex.email }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert!(json["message"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn role_change_is_audited_and_bounded() {
    let app = TestApp::spawn().await;
    let acme = app.register_organization("Acme", "acme.test").await;
    let alice = app.register_user(&acme.id, "Alice", "alice@acme.test").await;

    app.promote_to_team_creator(&acme, &alice).await;

    let me: Value = app
        .auth_get("/api/users/me", &alice.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["role"], "team_creator");

    let stored = app
        .db
        .collection::<bson::Document>("users")
        .find_one(bson::doc! { "_id": bson::oid::ObjectId::parse_str(&alice.id).unwrap() })
        .await
        .unwrap()
        .unwrap();
    let history = stored.get_array("role_history").unwrap();
    assert_eq!(history.len(), 1);

    let to_superadmin = app
        .auth_put(
            &format!("/api/organizations/{}/members/{}/role", acme.id, alice.id),
            &acme.access_token,
        )
        .json(&json!({ "role": "superadmin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(to_superadmin.status().as_u16(), 422);

    let by_user = app
        .auth_put(
            &format!("/api/organizations/{}/members/{}/role", acme.id, alice.id),
            &alice.access_token,
        )
        .json(&json!({ "role": "user" }))
        .send()
        .await
        .unwrap();
    assert_eq!(by_user.status().as_u16(), 403);
}

#[tokio::test]
async fn delete_removes_the_organization() {
    let app = TestApp::spawn().await;
    let acme = app.register_organization("Acme", "acme.test").await;

    let resp = app
        .auth_delete(&format!("/api/organizations/{}", acme.id), &acme.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let list: Vec<Value> = reqwest::get(app.url("/api/organizations"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.is_empty());
}
