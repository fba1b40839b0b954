use atelier_db::models::{Message, Sender, TempFile};
use atelier_services::{
    Level,
    orchestrator::{ReplyRequest, TurnInput, validate_intake},
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;

use super::{hex, timestamp};
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
    uploads,
};

#[derive(Debug, Deserialize)]
pub struct AiReplyRequest {
    pub project_id: String,
    pub chat_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub chat_id: String,
    pub message_id: String,
}

#[derive(Debug, Serialize)]
pub struct AiReplyResponse {
    pub reply: String,
    pub confidence_score: Option<f64>,
    pub message_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub project_id: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub sender: Sender,
    pub content: Option<String>,
    pub confidence_score: Option<f64>,
    pub selected_datasets: Vec<String>,
    pub temp_files: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub chat: ChatResponse,
    pub messages: Vec<MessageResponse>,
}

fn message_response(m: Message) -> MessageResponse {
    MessageResponse {
        id: hex(m.id),
        sender: m.sender,
        content: m.content,
        confidence_score: m.confidence_score,
        selected_datasets: m.selected_datasets.iter().map(|d| d.to_hex()).collect(),
        temp_files: m.temp_files.into_iter().map(|f| f.original_name).collect(),
        created_at: timestamp(m.created_at),
    }
}

/// Parsed `POST /api/chat` form. Files stay in memory until the turn has
/// passed validation and the gate.
#[derive(Default)]
struct TurnForm {
    project_id: Option<String>,
    chat_id: Option<String>,
    content: Option<String>,
    new_thread: bool,
    selected_datasets: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
}

async fn read_turn_form(mut multipart: Multipart) -> Result<TurnForm, ApiError> {
    let mut form = TurnForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            // An empty file input still sends a part, with a blank name.
            if file_name.is_empty() {
                continue;
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
            form.files.push((file_name, bytes.to_vec()));
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))?;

        match name.as_str() {
            "project_id" => form.project_id = Some(text),
            "chat_id" if !text.trim().is_empty() => form.chat_id = Some(text),
            "content" => form.content = Some(text),
            "new_thread" => form.new_thread = matches!(text.trim(), "true" | "1" | "on"),
            "selected_datasets" | "selected_datasets[]" => {
                form.selected_datasets.extend(
                    text.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                );
            }
            _ => {}
        }
    }

    Ok(form)
}

pub async fn submit_turn(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TurnResponse>), ApiError> {
    let form = read_turn_form(multipart).await?;

    let project_id = form
        .project_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing 'project_id' field".to_string()))
        .and_then(|id| parse_id(id, "project id"))?;
    let chat_id = form
        .chat_id
        .as_deref()
        .map(|id| parse_id(id, "chat id"))
        .transpose()?;
    let dataset_ids = form
        .selected_datasets
        .iter()
        .map(|id| parse_id(id, "dataset id"))
        .collect::<Result<Vec<_>, _>>()?;

    let caller = auth.caller();
    validate_intake(
        form.content.as_deref(),
        form.files.len(),
        state.orchestrator.max_turn_files(),
    )?;
    state
        .scopes
        .project(&caller, project_id, Level::Read)
        .await?;

    let root = FsPath::new(&state.settings.uploads.dir);
    let scope = format!("chats/{}", project_id.to_hex());
    let mut stored = Vec::with_capacity(form.files.len());
    for (name, bytes) in &form.files {
        match uploads::store(root, &scope, name, bytes).await {
            Ok(file) => stored.push(file),
            Err(e) => {
                uploads::discard(&stored).await;
                return Err(e);
            }
        }
    }
    let files = stored
        .iter()
        .map(|f| TempFile {
            original_name: f.original_name.clone(),
            path: f.path.to_string_lossy().into_owned(),
        })
        .collect();

    let result = state
        .orchestrator
        .submit_turn(
            &caller,
            TurnInput {
                project_id,
                chat_id,
                new_thread: form.new_thread,
                content: form.content,
                files,
                dataset_ids,
            },
        )
        .await;
    let receipt = match result {
        Ok(receipt) => receipt,
        Err(e) => {
            uploads::discard(&stored).await;
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(TurnResponse {
            chat_id: receipt.chat_id.to_hex(),
            message_id: receipt.message_id.to_hex(),
        }),
    ))
}

pub async fn ai_reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AiReplyRequest>,
) -> Result<Json<AiReplyResponse>, ApiError> {
    let request = ReplyRequest {
        project_id: parse_id(&body.project_id, "project id")?,
        chat_id: parse_id(&body.chat_id, "chat id")?,
        content: body.content,
    };

    let reply = state
        .orchestrator
        .request_ai_reply(&auth.caller(), request)
        .await?;

    Ok(Json(AiReplyResponse {
        reply: reply.text,
        confidence_score: reply.confidence_score,
        message_id: reply.message_id.to_hex(),
    }))
}

pub async fn create_thread(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    let project_id = parse_id(&body.project_id, "project id")?;
    let chat = state
        .orchestrator
        .create_thread(&auth.caller(), project_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ChatResponse {
            id: hex(chat.id),
            project_id: chat.project_id.to_hex(),
            created_at: timestamp(chat.created_at),
        }),
    ))
}

pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, chat_id)): Path<(String, String)>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let project_id = parse_id(&project_id, "project id")?;
    let chat_id = parse_id(&chat_id, "chat id")?;

    let (chat, messages) = state
        .orchestrator
        .history(&auth.caller(), project_id, chat_id)
        .await?;

    Ok(Json(HistoryResponse {
        chat: ChatResponse {
            id: hex(chat.id),
            project_id: chat.project_id.to_hex(),
            created_at: timestamp(chat.created_at),
        },
        messages: messages.into_iter().map(message_response).collect(),
    }))
}
