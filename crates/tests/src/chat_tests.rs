use crate::fixtures::{fake_completion::FakeMode, test_app::TestApp};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tokio_test::assert_ok;

async fn history(app: &TestApp, token: &str, project_id: &str, chat_id: &str) -> Vec<Value> {
    let resp = app
        .auth_get(&format!("/api/chat/{}/{}", project_id, chat_id), token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    json["messages"].as_array().unwrap().clone()
}

async fn ask(app: &TestApp, token: &str, project_id: &str, chat_id: &str, content: &str) -> reqwest::Response {
    app.auth_post("/api/chat/ai", token)
        .json(&json!({ "project_id": project_id, "chat_id": chat_id, "content": content }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn user_turn_is_stored_without_calling_the_model() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;

    let resp = app
        .submit_text(&seeded.reader.access_token, &seeded.project_id, "  hi there ", &[])
        .await;
    assert_eq!(resp.status().as_u16(), 201);
    let receipt: Value = resp.json().await.unwrap();
    let chat_id = receipt["chat_id"].as_str().unwrap();

    let messages = history(&app, &seeded.reader.access_token, &seeded.project_id, chat_id).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender"], "user");
    assert_eq!(messages[0]["content"], "hi there");
    assert_eq!(messages[0]["id"], receipt["message_id"]);
    assert!(app.completion.requests().is_empty());
}

#[tokio::test]
async fn empty_turn_is_rejected() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;

    let resp = app
        .submit_text(&seeded.reader.access_token, &seeded.project_id, "   ", &[])
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    let count = app
        .db
        .collection::<bson::Document>("messages")
        .count_documents(bson::doc! {})
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn ai_reply_follows_the_user_turn() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;
    app.completion.set_mode(FakeMode::Reply {
        text: "Sales will grow.".to_string(),
        confidence: Some(0.82),
    });

    let receipt: Value = app
        .submit_text(&seeded.reader.access_token, &seeded.project_id, "Forecast?", &[])
        .await
        .json()
        .await
        .unwrap();
    let chat_id = receipt["chat_id"].as_str().unwrap();

    let resp = ask(&app, &seeded.reader.access_token, &seeded.project_id, chat_id, "Forecast?").await;
    assert_eq!(resp.status().as_u16(), 200);
    let reply: Value = resp.json().await.unwrap();
    assert_eq!(reply["reply"], "Sales will grow.");
    assert_eq!(reply["confidence_score"], 0.82);

    let messages = history(&app, &seeded.reader.access_token, &seeded.project_id, chat_id).await;
    let senders: Vec<&str> = messages.iter().filter_map(|m| m["sender"].as_str()).collect();
    assert_eq!(senders, vec!["user", "chatbot"]);

    let requests = app.completion.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["model"], app.settings.completion.model);
    assert_eq!(requests[0]["messages"][0]["role"], "system");
    assert_eq!(requests[0]["messages"][1]["role"], "user");
    assert_eq!(requests[0]["messages"][1]["content"], "Forecast?");
}

#[tokio::test]
async fn missing_confidence_is_null() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;

    let receipt: Value = app
        .submit_text(&seeded.reader.access_token, &seeded.project_id, "q", &[])
        .await
        .json()
        .await
        .unwrap();
    let reply: Value = ask(
        &app,
        &seeded.reader.access_token,
        &seeded.project_id,
        receipt["chat_id"].as_str().unwrap(),
        "q",
    )
    .await
    .json()
    .await
    .unwrap();
    assert!(reply["confidence_score"].is_null());
}

#[tokio::test]
async fn selected_dataset_is_described_to_the_model() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;

    let form = Form::new().part("files", Part::bytes(b"x".to_vec()).file_name("A"));
    let datasets: Vec<Value> = app
        .auth_post(
            &format!("/api/projects/{}/datasets", seeded.project_id),
            &seeded.admin.access_token,
        )
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let dataset_id = datasets[0]["id"].as_str().unwrap();
    let dataset_url = datasets[0]["url"].as_str().unwrap();

    let receipt: Value = app
        .submit_text(
            &seeded.reader.access_token,
            &seeded.project_id,
            "Summarise",
            &[("selected_datasets", dataset_id)],
        )
        .await
        .json()
        .await
        .unwrap();

    let resp = ask(
        &app,
        &seeded.reader.access_token,
        &seeded.project_id,
        receipt["chat_id"].as_str().unwrap(),
        "Summarise",
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);

    let requests = app.completion.requests();
    let notes: Vec<&str> = requests[0]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .skip(2)
        .filter(|m| m["role"] == "system")
        .filter_map(|m| m["content"].as_str())
        .collect();
    assert!(
        notes.iter().any(|n| n.contains("A") && n.contains(dataset_url)),
        "no dataset note in {:?}",
        notes
    );
}

#[tokio::test]
async fn upstream_failure_keeps_user_turn_and_is_bad_gateway() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;
    app.completion.set_mode(FakeMode::Error {
        status: 429,
        message: "Rate limit exceeded".to_string(),
    });

    let receipt: Value = app
        .submit_text(&seeded.reader.access_token, &seeded.project_id, "q", &[])
        .await
        .json()
        .await
        .unwrap();
    let chat_id = receipt["chat_id"].as_str().unwrap();

    let resp = ask(&app, &seeded.reader.access_token, &seeded.project_id, chat_id, "q").await;
    assert_eq!(resp.status().as_u16(), 502);
    let json: Value = resp.json().await.unwrap();
    assert!(json["message"].as_str().unwrap().contains("Rate limit exceeded"));

    let messages = history(&app, &seeded.reader.access_token, &seeded.project_id, chat_id).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender"], "user");

    // A retry after recovery appends exactly one reply.
    app.completion.set_mode(FakeMode::Reply {
        text: "ok".to_string(),
        confidence: None,
    });
    let resp = ask(&app, &seeded.reader.access_token, &seeded.project_id, chat_id, "q").await;
    assert_eq!(resp.status().as_u16(), 200);
    let messages = history(&app, &seeded.reader.access_token, &seeded.project_id, chat_id).await;
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn malformed_completion_is_bad_gateway() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;
    app.completion.set_mode(FakeMode::Malformed);

    let receipt: Value = app
        .submit_text(&seeded.reader.access_token, &seeded.project_id, "q", &[])
        .await
        .json()
        .await
        .unwrap();
    let resp = ask(
        &app,
        &seeded.reader.access_token,
        &seeded.project_id,
        receipt["chat_id"].as_str().unwrap(),
        "q",
    )
    .await;
    assert_eq!(resp.status().as_u16(), 502);
}

#[tokio::test]
async fn turns_reuse_latest_thread_unless_new_thread() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;
    let token = &seeded.reader.access_token;

    let first: Value = app.submit_text(token, &seeded.project_id, "one", &[]).await.json().await.unwrap();
    let second: Value = app.submit_text(token, &seeded.project_id, "two", &[]).await.json().await.unwrap();
    assert_eq!(first["chat_id"], second["chat_id"]);

    let third: Value = app
        .submit_text(token, &seeded.project_id, "three", &[("new_thread", "true")])
        .await
        .json()
        .await
        .unwrap();
    assert_ne!(third["chat_id"], first["chat_id"]);

    let project: Value = app
        .auth_get(&format!("/api/projects/{}", seeded.project_id), token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(project["chats"].as_array().unwrap().len(), 2);
    assert_eq!(project["chat_ids"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn explicit_thread_creation() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;

    let resp = app
        .auth_post("/api/chat/create", &seeded.reader.access_token)
        .json(&json!({ "project_id": seeded.project_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let chat: Value = resp.json().await.unwrap();
    let chat_id = chat["id"].as_str().unwrap();

    let receipt: Value = app
        .submit_text(
            &seeded.reader.access_token,
            &seeded.project_id,
            "in the new thread",
            &[("chat_id", chat_id)],
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(receipt["chat_id"], chat_id);
}

#[tokio::test]
async fn chat_from_another_project_is_not_found() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;
    let other = app
        .create_project(&seeded.admin.access_token, &seeded.team_id, "Other")
        .await;
    let other_id = other["id"].as_str().unwrap();

    let receipt: Value = app
        .submit_text(&seeded.admin.access_token, other_id, "elsewhere", &[])
        .await
        .json()
        .await
        .unwrap();
    let foreign_chat = receipt["chat_id"].as_str().unwrap();

    let resp = app
        .submit_text(
            &seeded.admin.access_token,
            &seeded.project_id,
            "hi",
            &[("chat_id", foreign_chat)],
        )
        .await;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = ask(&app, &seeded.admin.access_token, &seeded.project_id, foreign_chat, "hi").await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn files_only_turn_and_file_limit() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;

    let form = Form::new()
        .text("project_id", seeded.project_id.clone())
        .part("files", Part::bytes(b"col\n1\n".to_vec()).file_name("notes.csv"));
    let resp = app
        .auth_post("/api/chat", &seeded.reader.access_token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let receipt: Value = assert_ok!(resp.json().await);

    let messages = history(
        &app,
        &seeded.reader.access_token,
        &seeded.project_id,
        receipt["chat_id"].as_str().unwrap(),
    )
    .await;
    assert!(messages[0]["content"].is_null());
    assert_eq!(messages[0]["temp_files"], json!(["notes.csv"]));

    let mut form = Form::new()
        .text("project_id", seeded.project_id.clone())
        .text("content", "too many");
    for i in 0..4 {
        form = form.part("files", Part::bytes(vec![b'x']).file_name(format!("f{}.txt", i)));
    }
    let resp = app
        .auth_post("/api/chat", &seeded.reader.access_token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn non_member_cannot_chat() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;

    let resp = app
        .submit_text(&seeded.outsider.access_token, &seeded.project_id, "hi", &[])
        .await;
    assert_eq!(resp.status().as_u16(), 403);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["reason"], "not_a_team_member");

    let chats = app
        .db
        .collection::<bson::Document>("chats")
        .count_documents(bson::doc! {})
        .await
        .unwrap();
    assert_eq!(chats, 0);
}

#[tokio::test]
async fn blank_file_input_does_not_count_as_attachment() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;

    let form = Form::new()
        .text("project_id", seeded.project_id.clone())
        .text("content", "   ")
        .part("files", Part::bytes(Vec::new()).file_name(""));
    let resp = app
        .auth_post("/api/chat", &seeded.reader.access_token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let messages = app
        .db
        .collection::<bson::Document>("messages")
        .count_documents(bson::doc! {})
        .await
        .unwrap();
    assert_eq!(messages, 0);
    assert_eq!(app.stored_upload_count(), 0);
}

#[tokio::test]
async fn failed_turn_leaves_no_files_behind() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_team("acme").await;
    let other = app
        .create_project(&seeded.admin.access_token, &seeded.team_id, "Other")
        .await;
    let receipt: Value = app
        .submit_text(
            &seeded.admin.access_token,
            other["id"].as_str().unwrap(),
            "elsewhere",
            &[],
        )
        .await
        .json()
        .await
        .unwrap();
    let foreign_chat = receipt["chat_id"].as_str().unwrap().to_string();

    let form = Form::new()
        .text("project_id", seeded.project_id.clone())
        .text("chat_id", foreign_chat)
        .text("content", "with attachments")
        .part("files", Part::bytes(b"one".to_vec()).file_name("a.txt"))
        .part("files", Part::bytes(b"two".to_vec()).file_name("b.txt"));
    let resp = app
        .auth_post("/api/chat", &seeded.admin.access_token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    assert_eq!(app.stored_upload_count(), 0);
}
