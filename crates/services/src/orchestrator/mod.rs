//! Chat turns and AI replies.
//!
//! A user turn is persisted without any external call. The reply is a
//! separate request: it reads the latest user turn for dataset and file
//! context, calls the completion backend and appends the chatbot message.
//! A backend failure leaves the user turn in place.

mod prompt;
mod store;

pub use prompt::{TurnContext, build_prompt, dataset_summaries, last_user_context};
pub use store::{ChatStore, MongoChatStore};

use atelier_db::models::{Chat, Message, Project, Sender, Team, TempFile};
use bson::{DateTime, oid::ObjectId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::access::{Caller, DenyReason, Level, resolver::check};
use crate::completion::CompletionBackend;
use crate::dao::base::DaoError;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Chat not found")]
    ChatNotFound,
    #[error(transparent)]
    AccessDenied(#[from] DenyReason),
    #[error("Message must contain text or at least one file")]
    EmptyMessage,
    #[error("{0}")]
    Validation(String),
    #[error("AI service error: {0}")]
    AiService(String),
    #[error(transparent)]
    Store(#[from] DaoError),
}

#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub project_id: ObjectId,
    pub chat_id: Option<ObjectId>,
    pub new_thread: bool,
    pub content: Option<String>,
    pub files: Vec<TempFile>,
    pub dataset_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnReceipt {
    pub chat_id: ObjectId,
    pub message_id: ObjectId,
}

#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub project_id: ObjectId,
    pub chat_id: ObjectId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub confidence_score: Option<f64>,
    pub message_id: ObjectId,
}

/// Checks a turn has something to say. Returns the trimmed text, `None`
/// when only files were sent.
pub fn validate_intake(
    content: Option<&str>,
    file_count: usize,
    max_files: usize,
) -> Result<Option<String>, ChatError> {
    if file_count > max_files {
        return Err(ChatError::Validation(format!(
            "At most {max_files} files can be attached to a message"
        )));
    }

    let text = content
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    if text.is_none() && file_count == 0 {
        return Err(ChatError::EmptyMessage);
    }
    Ok(text)
}

fn dedup(ids: Vec<ObjectId>) -> Vec<ObjectId> {
    let mut out: Vec<ObjectId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

pub struct ChatOrchestrator {
    store: Arc<dyn ChatStore>,
    completion: Arc<dyn CompletionBackend>,
    system_prompt: String,
    max_turn_files: usize,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<dyn ChatStore>,
        completion: Arc<dyn CompletionBackend>,
        system_prompt: impl Into<String>,
        max_turn_files: usize,
    ) -> Self {
        Self {
            store,
            completion,
            system_prompt: system_prompt.into(),
            max_turn_files,
        }
    }

    pub fn max_turn_files(&self) -> usize {
        self.max_turn_files
    }

    /// Loads the project and its team and runs the gate.
    async fn scope(
        &self,
        caller: &Caller,
        project_id: ObjectId,
    ) -> Result<(Project, Team), ChatError> {
        let project = self
            .store
            .project(project_id)
            .await?
            .ok_or(ChatError::ProjectNotFound)?;
        let team = self
            .store
            .team(project.team_id)
            .await?
            .ok_or(ChatError::ProjectNotFound)?;

        check(caller, &team, Level::Read)?;
        Ok((project, team))
    }

    async fn chat(&self, project_id: ObjectId, chat_id: ObjectId) -> Result<Chat, ChatError> {
        self.store
            .chat_in_project(project_id, chat_id)
            .await?
            .ok_or(ChatError::ChatNotFound)
    }

    /// Thread for a turn: the given chat, a fresh one when asked for, or
    /// the project's latest chat.
    async fn resolve_thread(&self, caller: &Caller, input: &TurnInput) -> Result<Chat, ChatError> {
        if let Some(chat_id) = input.chat_id {
            return self.chat(input.project_id, chat_id).await;
        }

        if !input.new_thread {
            if let Some(chat) = self.store.latest_chat(input.project_id).await? {
                return Ok(chat);
            }
        }

        Ok(self
            .store
            .create_chat(input.project_id, caller.user_id)
            .await?)
    }

    async fn append(&self, chat_id: ObjectId, message: Message) -> Result<Message, ChatError> {
        let message = self.store.insert_message(message).await?;
        let message_id = message.id.ok_or(DaoError::NotFound)?;
        self.store.append_to_chat(chat_id, message_id).await?;
        Ok(message)
    }

    pub async fn submit_turn(
        &self,
        caller: &Caller,
        input: TurnInput,
    ) -> Result<TurnReceipt, ChatError> {
        let text = validate_intake(
            input.content.as_deref(),
            input.files.len(),
            self.max_turn_files,
        )?;
        self.scope(caller, input.project_id).await?;

        let chat = self.resolve_thread(caller, &input).await?;
        let chat_id = chat.id.ok_or(ChatError::ChatNotFound)?;

        let message = Message {
            id: None,
            chat_id,
            sender: Sender::User,
            author_id: Some(caller.user_id),
            content: text,
            confidence_score: None,
            selected_datasets: dedup(input.dataset_ids),
            temp_files: input.files,
            created_at: DateTime::now(),
        };
        let message = self.append(chat_id, message).await?;
        let message_id = message.id.ok_or(DaoError::NotFound)?;

        info!(%chat_id, %message_id, project_id = %input.project_id, "User turn stored");
        Ok(TurnReceipt {
            chat_id,
            message_id,
        })
    }

    pub async fn request_ai_reply(
        &self,
        caller: &Caller,
        request: ReplyRequest,
    ) -> Result<Reply, ChatError> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let (project, _) = self.scope(caller, request.project_id).await?;
        let chat = self.chat(request.project_id, request.chat_id).await?;

        let history = self.store.chat_messages(&chat).await?;
        let context = last_user_context(&history);
        let datasets = dataset_summaries(&project.datasets, &context.selected_datasets);
        let prompt = build_prompt(&self.system_prompt, content, &datasets, &context.temp_files);

        let completion = self.completion.complete(&prompt).await.map_err(|e| {
            warn!(chat_id = %request.chat_id, error = %e, "AI reply failed");
            ChatError::AiService(e.to_string())
        })?;

        let message = Message {
            id: None,
            chat_id: request.chat_id,
            sender: Sender::Chatbot,
            author_id: None,
            content: Some(completion.text.clone()),
            confidence_score: completion.confidence_score,
            selected_datasets: Vec::new(),
            temp_files: Vec::new(),
            created_at: DateTime::now(),
        };
        let message = self.append(request.chat_id, message).await?;
        let message_id = message.id.ok_or(DaoError::NotFound)?;

        info!(chat_id = %request.chat_id, %message_id, model = self.completion.model(), "AI reply stored");
        Ok(Reply {
            text: completion.text,
            confidence_score: completion.confidence_score,
            message_id,
        })
    }

    pub async fn create_thread(
        &self,
        caller: &Caller,
        project_id: ObjectId,
    ) -> Result<Chat, ChatError> {
        self.scope(caller, project_id).await?;
        Ok(self.store.create_chat(project_id, caller.user_id).await?)
    }

    pub async fn history(
        &self,
        caller: &Caller,
        project_id: ObjectId,
        chat_id: ObjectId,
    ) -> Result<(Chat, Vec<Message>), ChatError> {
        self.scope(caller, project_id).await?;
        let chat = self.chat(project_id, chat_id).await?;
        let messages = self.store.chat_messages(&chat).await?;
        Ok((chat, messages))
    }
}
