//! Conversational assistant: tool-augmented chat against a remote model.
//!
//! The assistant sees a snapshot of the rules and source text, may mutate
//! live workspace state through the tool bridge, and answers in the user's
//! display language. Two wire backends share one loop; the endpoint
//! configuration picks the backend.

pub mod chat_loop;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod tool_bridge;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::rules::Rule;
use chat_loop::{LoopConfig, run_chat_loop};
use providers::{GeminiBackend, OpenAiBackend};
use tool_bridge::ToolDispatcher;

/// Display language for assistant replies and user-facing errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

/// Role in the user-visible conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One user-visible conversation turn. Synthetic tool turns live only in
/// backend wire state.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// Assistant error types
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// HTTP 429. Surfaced immediately, never retried.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API key not configured")]
    NoCredentials,

    #[error("Model listing yielded no usable identifiers")]
    EmptyModelList,
}

impl AssistantError {
    /// The single user-facing message for this failure, in the active
    /// display language. Raw details stay in the log.
    pub fn user_message(&self, language: Language) -> String {
        match (self, language) {
            (AssistantError::RateLimited(_), Language::Zh) => {
                "请求过多 (429)，请稍后重试。".to_string()
            }
            (AssistantError::RateLimited(_), Language::En) => {
                "Too many requests (429), please try again later.".to_string()
            }
            (AssistantError::Transport(detail), Language::Zh) => {
                format!("通信错误: {detail}。请检查 API Key 和 Base URL 设置。")
            }
            (AssistantError::Transport(detail), Language::En) => {
                format!("Communication Error: {detail}. Check API Key and Base URL settings.")
            }
            (AssistantError::NoCredentials, Language::Zh) => {
                "错误：未配置 API Key。请先在设置中输入您的 API Key。".to_string()
            }
            (AssistantError::NoCredentials, Language::En) => {
                "Error: API Key not configured. Please enter your API Key in settings.".to_string()
            }
            (AssistantError::EmptyModelList, Language::Zh) => {
                "未能从API响应中解析出任何模型。请检查API返回格式。".to_string()
            }
            (AssistantError::EmptyModelList, Language::En) => {
                "No models could be parsed from the API response.".to_string()
            }
        }
    }
}

/// Send one user-visible conversation to the configured endpoint and drive
/// it to a final answer.
///
/// `rules` and `source_text` are the snapshot embedded in the system
/// preamble; tool invocations mutate live state through `dispatcher` without
/// rewriting the snapshot.
pub async fn send_message(
    history: &[ChatMessage],
    rules: &[Rule],
    source_text: &str,
    settings: &Settings,
    dispatcher: &dyn ToolDispatcher,
) -> Result<String, AssistantError> {
    let api_key = settings.api_key().ok_or(AssistantError::NoCredentials)?;

    let system = prompt::build_system_prompt(rules, source_text, settings.language);
    let config = LoopConfig {
        language: settings.language,
        ..Default::default()
    };
    let model = settings.model_or_default().to_string();

    if settings.uses_native_endpoint() {
        let backend = GeminiBackend::new(api_key, model);
        run_chat_loop(&backend, history, &system, dispatcher, &config).await
    } else {
        let base_url = settings
            .clean_base_url()
            .ok_or_else(|| AssistantError::Transport("Base URL must not be empty".to_string()))?;
        let backend = OpenAiBackend::new(api_key, base_url, model);
        run_chat_loop(&backend, history, &system, dispatcher, &config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_localized() {
        let err = AssistantError::RateLimited("429".into());
        assert!(err.user_message(Language::Zh).contains("429"));
        assert!(err.user_message(Language::En).contains("Too many requests"));
    }

    #[test]
    fn test_transport_message_carries_detail() {
        let err = AssistantError::Transport("connection refused".into());
        assert!(err.user_message(Language::En).contains("connection refused"));
    }
}
