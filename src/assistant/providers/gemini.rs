//! Native Gemini backend (`generateContent` API with function calling).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackendReply, CHAT_TEMPERATURE, ChatBackend, REQUEST_TIMEOUT_SECS};
use crate::assistant::tool_bridge::{self, ToolCallRequest, ToolResult};
use crate::assistant::{AssistantError, ChatMessage, Role};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiSystemInstruction,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize, Clone)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

/// Part can be text, function call, or function response
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum GeminiPart {
    Text(GeminiTextPart),
    FunctionCall(GeminiFunctionCallPart),
    FunctionResponse(GeminiFunctionResponsePart),
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeminiTextPart {
    pub text: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeminiFunctionCallPart {
    #[serde(rename = "functionCall")]
    pub function_call: GeminiFunctionCall,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeminiFunctionCall {
    pub name: String,
    pub args: Value,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeminiFunctionResponsePart {
    #[serde(rename = "functionResponse")]
    pub function_response: GeminiFunctionResponse,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeminiFunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Serialize)]
struct GeminiTool {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<Value>,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f64,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorBody>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize, Clone, Debug)]
struct GeminiPartResponse {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ============================================================================
// Conversation State
// ============================================================================

/// Wire-shaped conversation: the system preamble plus content turns.
pub struct GeminiState {
    system: String,
    contents: Vec<GeminiContent>,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

// ============================================================================
// Backend Implementation
// ============================================================================

#[async_trait]
impl ChatBackend for GeminiBackend {
    type State = GeminiState;

    fn name(&self) -> &'static str {
        "gemini"
    }

    fn init_conversation(&self, history: &[ChatMessage], system: &str) -> GeminiState {
        let contents = history
            .iter()
            .map(|msg| GeminiContent {
                role: role_name(msg.role).to_string(),
                parts: vec![GeminiPart::Text(GeminiTextPart {
                    text: msg.content.clone(),
                })],
            })
            .collect();

        GeminiState {
            system: system.to_string(),
            contents,
        }
    }

    async fn request(
        &self,
        state: &GeminiState,
        with_tools: bool,
    ) -> Result<BackendReply, AssistantError> {
        let tools = with_tools.then(|| {
            vec![GeminiTool {
                function_declarations: tool_bridge::all_function_declarations(),
            }]
        });

        let api_request = GeminiRequest {
            contents: state.contents.clone(),
            system_instruction: GeminiSystemInstruction {
                parts: vec![GeminiTextPart {
                    text: state.system.clone(),
                }],
            },
            generation_config: GeminiGenerationConfig {
                temperature: CHAT_TEMPERATURE,
            },
            tools,
        };

        let url = format!(
            "{GEMINI_API_BASE}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
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
                "Gemini API error: {status} - {body}"
            )));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        if let Some(error) = api_response.error {
            return Err(AssistantError::Transport(error.message));
        }

        // Extract text and function calls from the first candidate's parts.
        let mut text = String::new();
        let mut tool_calls: Vec<ToolCallRequest> = vec![];

        if let Some(candidate) = api_response
            .candidates
            .and_then(|c| c.into_iter().next())
        {
            for part in candidate.content.parts {
                if let Some(t) = part.text {
                    text.push_str(&t);
                }
                if let Some(fc) = part.function_call {
                    tool_calls.push(ToolCallRequest {
                        id: format!("gemini_{}", tool_calls.len()),
                        name: fc.name,
                        arguments: fc.args,
                    });
                }
            }
        }

        Ok(BackendReply { text, tool_calls })
    }

    fn push_assistant(&self, state: &mut GeminiState, reply: &BackendReply) {
        let mut parts = Vec::new();
        if !reply.text.is_empty() {
            parts.push(GeminiPart::Text(GeminiTextPart {
                text: reply.text.clone(),
            }));
        }
        for call in &reply.tool_calls {
            parts.push(GeminiPart::FunctionCall(GeminiFunctionCallPart {
                function_call: GeminiFunctionCall {
                    name: call.name.clone(),
                    args: call.arguments.clone(),
                },
            }));
        }
        state.contents.push(GeminiContent {
            role: "model".to_string(),
            parts,
        });
    }

    fn push_tool_results(&self, state: &mut GeminiState, results: Vec<ToolResult>) {
        let parts = results
            .into_iter()
            .map(|result| {
                GeminiPart::FunctionResponse(GeminiFunctionResponsePart {
                    function_response: GeminiFunctionResponse {
                        name: result.name,
                        response: result.payload,
                    },
                })
            })
            .collect();
        state.contents.push(GeminiContent {
            role: "user".to_string(),
            parts,
        });
    }
}
