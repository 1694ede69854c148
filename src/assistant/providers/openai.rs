//! OpenAI-compatible proxy backend (`/v1/chat/completions`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackendReply, CHAT_TEMPERATURE, ChatBackend, REQUEST_TIMEOUT_SECS};
use crate::assistant::tool_bridge::{self, ToolCallRequest, ToolResult};
use crate::assistant::{AssistantError, ChatMessage, Role};

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiBackend {
    /// `base_url` must already be cleaned (no trailing slash).
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Serialize, Clone)]
pub struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn plain(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunction,
}

#[derive(Serialize, Deserialize, Clone)]
struct OpenAiFunction {
    name: String,
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Option<Vec<OpenAiChoice>>,
    error: Option<OpenAiErrorBody>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageResponse,
}

#[derive(Deserialize)]
struct OpenAiMessageResponse {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

// ============================================================================
// Backend Implementation
// ============================================================================

#[async_trait]
impl ChatBackend for OpenAiBackend {
    type State = Vec<OpenAiMessage>;

    fn name(&self) -> &'static str {
        "openai-proxy"
    }

    fn init_conversation(&self, history: &[ChatMessage], system: &str) -> Vec<OpenAiMessage> {
        let mut messages = vec![OpenAiMessage::plain("system", system.to_string())];
        for msg in history {
            let role = match msg.role {
                Role::User => "user",
                Role::Model => "assistant",
            };
            messages.push(OpenAiMessage::plain(role, msg.content.clone()));
        }
        messages
    }

    async fn request(
        &self,
        state: &Vec<OpenAiMessage>,
        with_tools: bool,
    ) -> Result<BackendReply, AssistantError> {
        let api_request = OpenAiRequest {
            model: self.model.clone(),
            messages: state.clone(),
            temperature: CHAT_TEMPERATURE,
            tools: with_tools.then(tool_bridge::all_chat_completions_schemas),
            tool_choice: with_tools.then(|| "auto".to_string()),
        };

        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Transport(format!(
                "HTTP {status} - {body}"
            )));
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        if let Some(error) = api_response.error {
            return Err(AssistantError::Transport(error.message));
        }

        let Some(choice) = api_response.choices.and_then(|c| c.into_iter().next()) else {
            return Err(AssistantError::Transport("No response from AI".to_string()));
        };

        let text = choice.message.content.unwrap_or_default();
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                // Arguments arrive as a JSON string; a malformed one becomes
                // an empty object and fails argument validation downstream.
                let args: Value = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::Object(serde_json::Map::new()));
                ToolCallRequest {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: args,
                }
            })
            .collect();

        Ok(BackendReply { text, tool_calls })
    }

    fn push_assistant(&self, state: &mut Vec<OpenAiMessage>, reply: &BackendReply) {
        let tool_calls = if reply.tool_calls.is_empty() {
            None
        } else {
            Some(
                reply
                    .tool_calls
                    .iter()
                    .map(|call| OpenAiToolCall {
                        id: call.id.clone(),
                        call_type: "function".to_string(),
                        function: OpenAiFunction {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };

        state.push(OpenAiMessage {
            role: "assistant".to_string(),
            content: (!reply.text.is_empty()).then(|| reply.text.clone()),
            tool_calls,
            tool_call_id: None,
        });
    }

    fn push_tool_results(&self, state: &mut Vec<OpenAiMessage>, results: Vec<ToolResult>) {
        for result in results {
            state.push(OpenAiMessage {
                role: "tool".to_string(),
                content: Some(result.payload.to_string()),
                tool_calls: None,
                tool_call_id: Some(result.call_id),
            });
        }
    }
}
