//! Bounded-turn conversation loop shared by both wire backends.
//!
//! One request/response round at a time: issue the request, execute any tool
//! invocations strictly in model order, feed the results back, repeat. The
//! loop terminates on a plain-text reply, on the round budget, or on an
//! unrecoverable transport error. A non-rate-limit transport failure while
//! tools are enabled downgrades the call to tool-less mode and retries once.

use tracing::{info, warn};

use super::providers::{BackendReply, ChatBackend};
use super::tool_bridge::{ToolDispatcher, execute_invocation};
use super::{AssistantError, ChatMessage, Language};

/// Maximum tool-calling rounds per call.
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Configuration for one conversation call.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_rounds: usize,
    pub language: Language,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: MAX_TOOL_ROUNDS,
            language: Language::default(),
        }
    }
}

fn budget_notice(language: Language) -> String {
    match language {
        Language::Zh => "已达到最大工具调用次数".to_string(),
        Language::En => "Maximum tool calls reached".to_string(),
    }
}

/// Drive the conversation to a terminal outcome.
///
/// Returns the final assistant text; budget exhaustion yields the notice
/// string, not an error. Rate limits surface immediately; other transport
/// failures get one degraded no-tools retry.
pub async fn run_chat_loop<B: ChatBackend>(
    backend: &B,
    history: &[ChatMessage],
    system: &str,
    dispatcher: &dyn ToolDispatcher,
    config: &LoopConfig,
) -> Result<String, AssistantError> {
    let mut state = backend.init_conversation(history, system);
    let mut with_tools = true;
    let mut rounds = 0usize;
    let mut last_assistant_text: Option<String> = None;

    loop {
        let reply: BackendReply = match backend.request(&state, with_tools).await {
            Ok(reply) => reply,
            Err(AssistantError::RateLimited(detail)) => {
                // Never retried.
                return Err(AssistantError::RateLimited(detail));
            }
            Err(e) if with_tools => {
                warn!("{} request failed, retrying without tools: {e}", backend.name());
                with_tools = false;
                continue;
            }
            Err(e) => return Err(e),
        };

        if !reply.tool_calls.is_empty() {
            rounds += 1;
            info!(
                "{} round {}: {} tool call(s): {:?}",
                backend.name(),
                rounds,
                reply.tool_calls.len(),
                reply.tool_calls.iter().map(|c| &c.name).collect::<Vec<_>>()
            );

            backend.push_assistant(&mut state, &reply);
            if !reply.text.is_empty() {
                last_assistant_text = Some(reply.text.clone());
            }

            // Strictly sequential, in the order the model returned them.
            let mut results = Vec::with_capacity(reply.tool_calls.len());
            for call in &reply.tool_calls {
                results.push(execute_invocation(dispatcher, call).await);
            }
            backend.push_tool_results(&mut state, results);

            if rounds >= config.max_rounds {
                warn!("{} hit max tool rounds ({})", backend.name(), config.max_rounds);
                return Ok(budget_notice(config.language));
            }
            continue;
        }

        // Plain text. Identical to the previous assistant text in this call:
        // return without re-appending, some backends resend an unchanged
        // answer forever otherwise.
        if last_assistant_text.as_deref() == Some(reply.text.as_str()) {
            warn!("{} repeated assistant response, breaking loop", backend.name());
            return Ok(reply.text);
        }

        backend.push_assistant(&mut state, &reply);
        return Ok(reply.text);
    }
}
