//! Contract tests for the shared conversation loop.
//!
//! A scripted backend stands in for the wire protocols; these tests pin the
//! loop's terminal behavior: budget exhaustion, the repeated-text breaker,
//! the degraded no-tools retry, rate-limit surfacing, and tool fault
//! isolation.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use regexlab::assistant::chat_loop::{LoopConfig, MAX_TOOL_ROUNDS, run_chat_loop};
use regexlab::assistant::providers::{BackendReply, ChatBackend};
use regexlab::assistant::tool_bridge::{ToolCallRequest, ToolDispatcher, ToolOp, ToolResult};
use regexlab::assistant::{AssistantError, ChatMessage, Language};

// ============================================================================
// Scripted Backend
// ============================================================================

struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<BackendReply, AssistantError>>>,
    /// Served when the script runs dry.
    fallback: BackendReply,
    requests: AtomicUsize,
    tool_flags: Mutex<Vec<bool>>,
    assistant_pushes: AtomicUsize,
    recorded_results: Mutex<Vec<ToolResult>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<BackendReply, AssistantError>>, fallback: BackendReply) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            requests: AtomicUsize::new(0),
            tool_flags: Mutex::new(vec![]),
            assistant_pushes: AtomicUsize::new(0),
            recorded_results: Mutex::new(vec![]),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    type State = ();

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn init_conversation(&self, _history: &[ChatMessage], _system: &str) {}

    async fn request(
        &self,
        _state: &(),
        with_tools: bool,
    ) -> Result<BackendReply, AssistantError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.tool_flags.lock().unwrap().push(with_tools);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn push_assistant(&self, _state: &mut (), _reply: &BackendReply) {
        self.assistant_pushes.fetch_add(1, Ordering::SeqCst);
    }

    fn push_tool_results(&self, _state: &mut (), results: Vec<ToolResult>) {
        self.recorded_results.lock().unwrap().extend(results);
    }
}

fn text_reply(text: &str) -> BackendReply {
    BackendReply {
        text: text.to_string(),
        tool_calls: vec![],
    }
}

fn tool_reply(text: &str, calls: Vec<(&str, &str, Value)>) -> BackendReply {
    BackendReply {
        text: text.to_string(),
        tool_calls: calls
            .into_iter()
            .map(|(id, name, arguments)| ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            })
            .collect(),
    }
}

fn set_text_call(id: &str) -> (&str, &'static str, Value) {
    (id, "updateSourceText", json!({ "text": "new text" }))
}

// ============================================================================
// Recording Dispatcher
// ============================================================================

#[derive(Default)]
struct RecordingDispatcher {
    ops: Mutex<Vec<ToolOp>>,
    fail: bool,
}

impl RecordingDispatcher {
    fn failing() -> Self {
        Self {
            ops: Mutex::new(vec![]),
            fail: true,
        }
    }

    fn op_count(&self) -> usize {
        self.ops.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolDispatcher for RecordingDispatcher {
    async fn dispatch(&self, op: ToolOp) -> anyhow::Result<Value> {
        self.ops.lock().unwrap().push(op);
        if self.fail {
            anyhow::bail!("boom");
        }
        Ok(json!({ "status": "ok" }))
    }
}

fn config(language: Language) -> LoopConfig {
    LoopConfig {
        max_rounds: MAX_TOOL_ROUNDS,
        language,
    }
}

async fn drive(
    backend: &ScriptedBackend,
    dispatcher: &RecordingDispatcher,
    language: Language,
) -> Result<String, AssistantError> {
    let history: Vec<ChatMessage> = vec![ChatMessage::user("hello")];
    run_chat_loop(backend, &history, "system", dispatcher, &config(language)).await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn plain_text_terminates_normally() {
    let backend = ScriptedBackend::new(vec![Ok(text_reply("hi there"))], text_reply("unused"));
    let dispatcher = RecordingDispatcher::default();

    let result = drive(&backend, &dispatcher, Language::En).await.unwrap();

    assert_eq!(result, "hi there");
    assert_eq!(backend.request_count(), 1);
    assert_eq!(backend.assistant_pushes.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.op_count(), 0);
}

#[tokio::test]
async fn budget_exhausts_after_exactly_five_rounds() {
    // The model keeps asking for tools forever.
    let backend = ScriptedBackend::new(vec![], tool_reply("", vec![set_text_call("c")]));
    let dispatcher = RecordingDispatcher::default();

    let result = drive(&backend, &dispatcher, Language::En).await.unwrap();

    assert_eq!(result, "Maximum tool calls reached");
    assert_eq!(backend.request_count(), 5);
    assert_eq!(dispatcher.op_count(), 5);
}

#[tokio::test]
async fn budget_notice_is_localized() {
    let backend = ScriptedBackend::new(vec![], tool_reply("", vec![set_text_call("c")]));
    let dispatcher = RecordingDispatcher::default();

    let result = drive(&backend, &dispatcher, Language::Zh).await.unwrap();

    assert_eq!(result, "已达到最大工具调用次数");
}

#[tokio::test]
async fn repeated_text_breaks_the_loop() {
    // Round 1 carries text alongside a tool call; round 2 resends the same
    // text with no further tool action.
    let backend = ScriptedBackend::new(
        vec![
            Ok(tool_reply("All set.", vec![set_text_call("c1")])),
            Ok(text_reply("All set.")),
        ],
        text_reply("unused"),
    );
    let dispatcher = RecordingDispatcher::default();

    let result = drive(&backend, &dispatcher, Language::En).await.unwrap();

    assert_eq!(result, "All set.");
    assert_eq!(backend.request_count(), 2);
    // The repeated reply is returned without being re-appended.
    assert_eq!(backend.assistant_pushes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_failure_downgrades_to_no_tools_once() {
    let backend = ScriptedBackend::new(
        vec![
            Err(AssistantError::Transport("connection reset".into())),
            Ok(text_reply("degraded answer")),
        ],
        text_reply("unused"),
    );
    let dispatcher = RecordingDispatcher::default();

    let result = drive(&backend, &dispatcher, Language::En).await.unwrap();

    assert_eq!(result, "degraded answer");
    assert_eq!(*backend.tool_flags.lock().unwrap(), vec![true, false]);
}

#[tokio::test]
async fn second_transport_failure_is_surfaced() {
    let backend = ScriptedBackend::new(
        vec![
            Err(AssistantError::Transport("first".into())),
            Err(AssistantError::Transport("second".into())),
        ],
        text_reply("unused"),
    );
    let dispatcher = RecordingDispatcher::default();

    let err = drive(&backend, &dispatcher, Language::En).await.unwrap_err();

    assert!(matches!(err, AssistantError::Transport(detail) if detail == "second"));
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn rate_limit_is_never_retried() {
    let backend = ScriptedBackend::new(
        vec![Err(AssistantError::RateLimited("429".into()))],
        text_reply("unused"),
    );
    let dispatcher = RecordingDispatcher::default();

    let err = drive(&backend, &dispatcher, Language::En).await.unwrap_err();

    assert!(matches!(err, AssistantError::RateLimited(_)));
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn tool_failure_is_wrapped_and_conversation_continues() {
    let backend = ScriptedBackend::new(
        vec![
            Ok(tool_reply("", vec![set_text_call("c1")])),
            Ok(text_reply("recovered")),
        ],
        text_reply("unused"),
    );
    let dispatcher = RecordingDispatcher::failing();

    let result = drive(&backend, &dispatcher, Language::En).await.unwrap();

    assert_eq!(result, "recovered");
    let recorded = backend.recorded_results.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(!recorded[0].success);
    assert_eq!(recorded[0].payload["error"], "boom");
}

#[tokio::test]
async fn unknown_tool_fails_without_aborting_the_call() {
    let backend = ScriptedBackend::new(
        vec![
            Ok(tool_reply("", vec![("c1", "formatDisk", json!({}))])),
            Ok(text_reply("still here")),
        ],
        text_reply("unused"),
    );
    let dispatcher = RecordingDispatcher::default();

    let result = drive(&backend, &dispatcher, Language::En).await.unwrap();

    assert_eq!(result, "still here");
    assert_eq!(dispatcher.op_count(), 0);
    let recorded = backend.recorded_results.lock().unwrap();
    assert!(
        recorded[0].payload["error"]
            .as_str()
            .is_some_and(|e| e.contains("Unknown tool"))
    );
}

#[tokio::test]
async fn multiple_invocations_execute_sequentially_in_model_order() {
    let backend = ScriptedBackend::new(
        vec![
            Ok(tool_reply(
                "",
                vec![
                    ("c1", "addRule", json!({ "name": "N", "regex": "/a/g", "replace": "b" })),
                    set_text_call("c2"),
                ],
            )),
            Ok(text_reply("done")),
        ],
        text_reply("unused"),
    );
    let dispatcher = RecordingDispatcher::default();

    let result = drive(&backend, &dispatcher, Language::En).await.unwrap();

    assert_eq!(result, "done");
    let ops = dispatcher.ops.lock().unwrap();
    assert_eq!(ops.len(), 2);
    assert!(matches!(&ops[0], ToolOp::AddRule { name, .. } if name == "N"));
    assert!(matches!(&ops[1], ToolOp::UpdateSourceText { text } if text == "new text"));
}
