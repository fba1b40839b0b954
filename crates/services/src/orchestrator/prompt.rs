use atelier_db::models::{Dataset, Message, Sender, TempFile};
use bson::oid::ObjectId;

use crate::completion::PromptMessage;

/// Context a reply inherits from the user turn that preceded it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TurnContext {
    pub selected_datasets: Vec<ObjectId>,
    pub temp_files: Vec<TempFile>,
}

/// Context of the most recent user message, scanning from the end.
pub fn last_user_context(messages: &[Message]) -> TurnContext {
    messages
        .iter()
        .rev()
        .find(|m| m.sender == Sender::User)
        .map(|m| TurnContext {
            selected_datasets: m.selected_datasets.clone(),
            temp_files: m.temp_files.clone(),
        })
        .unwrap_or_default()
}

/// One summary line per selected id that names a dataset of the project.
/// Unknown ids are skipped.
pub fn dataset_summaries(datasets: &[Dataset], selected: &[ObjectId]) -> Vec<String> {
    selected
        .iter()
        .filter_map(|id| datasets.iter().find(|d| d.id == *id))
        .map(|d| format!("Dataset: {}, URL: {}", d.name, d.url))
        .collect()
}

pub fn build_prompt(
    system_prompt: &str,
    content: &str,
    dataset_lines: &[String],
    temp_files: &[TempFile],
) -> Vec<PromptMessage> {
    let mut prompt = vec![
        PromptMessage::system(system_prompt),
        PromptMessage::user(content),
    ];

    if !dataset_lines.is_empty() {
        prompt.push(PromptMessage::system(format!(
            "Use these datasets: {}",
            dataset_lines.join(", ")
        )));
    }

    if !temp_files.is_empty() {
        let names: Vec<&str> = temp_files.iter().map(|f| f.original_name.as_str()).collect();
        prompt.push(PromptMessage::system(format!(
            "Temporary files: {}",
            names.join(", ")
        )));
    }

    prompt
}
