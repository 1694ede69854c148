//! Chat wire backends.
//!
//! One logical contract, two wire formats: the native Gemini
//! `generateContent` protocol and the OpenAI-compatible proxy protocol.
//! The shared conversation loop drives either through the `ChatBackend`
//! trait; each backend owns its provider-specific conversation state.

mod gemini;
mod openai;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use async_trait::async_trait;

use super::tool_bridge::{ToolCallRequest, ToolResult};
use super::{AssistantError, ChatMessage};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const CHAT_TEMPERATURE: f64 = 0.4;
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// One response from a backend: final text, tool invocations, or both.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Wire-protocol strategy for the conversation loop.
///
/// Implementations own:
/// - the conversation state format (message history in wire shape)
/// - request/response shaping for their endpoint
/// - how assistant output and tool results are appended to history
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Wire-shaped conversation history.
    type State: Send;

    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Build the initial conversation state from the user-visible history
    /// and the system preamble.
    fn init_conversation(&self, history: &[ChatMessage], system: &str) -> Self::State;

    /// Issue one request. `with_tools` controls whether tool declarations
    /// are attached; the declarations themselves are identical every turn.
    async fn request(
        &self,
        state: &Self::State,
        with_tools: bool,
    ) -> Result<BackendReply, AssistantError>;

    /// Append the assistant's reply (text and/or tool calls) to the state.
    fn push_assistant(&self, state: &mut Self::State, reply: &BackendReply);

    /// Append tool execution results to the state.
    fn push_tool_results(&self, state: &mut Self::State, results: Vec<ToolResult>);
}
