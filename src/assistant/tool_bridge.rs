//! Tool bridge - the assistant's vocabulary for mutating workspace state.
//!
//! The registry is a fixed, closed set of three operations. Their schemas are
//! built from one source of truth and framed per wire format, so both
//! backends advertise byte-identical declarations on every turn. Parsed
//! invocations become a tagged union resolved through a single exhaustive
//! match; unknown names and missing arguments are tool-level failures fed
//! back to the model, never process errors.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

// ============================================================================
// Tool Registry
// ============================================================================

/// Operations the remote model is allowed to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Update an existing rule by id.
    UpdateRule,
    /// Append a new rule at the end of the pipeline.
    AddRule,
    /// Replace the preview source text.
    UpdateSourceText,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::UpdateRule => "updateRule",
            ToolKind::AddRule => "addRule",
            ToolKind::UpdateSourceText => "updateSourceText",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::UpdateRule => "Update an existing regex rule, identified by its id.",
            ToolKind::AddRule => "Add a brand-new rule at the end of the pipeline.",
            ToolKind::UpdateSourceText => "Replace the raw source text used for testing.",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "updateRule" => Some(ToolKind::UpdateRule),
            "addRule" => Some(ToolKind::AddRule),
            "updateSourceText" => Some(ToolKind::UpdateSourceText),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            ToolKind::UpdateRule,
            ToolKind::AddRule,
            ToolKind::UpdateSourceText,
        ]
    }

    /// JSON Schema for this tool's arguments. String fields only.
    pub fn parameters(&self) -> Value {
        match self {
            ToolKind::UpdateRule => json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "Id of the rule to update"
                    },
                    "regex": {
                        "type": "string",
                        "description": "New pattern specification (e.g. /abc/g)"
                    },
                    "replace": {
                        "type": "string",
                        "description": "New HTML replacement template"
                    },
                    "name": {
                        "type": "string",
                        "description": "Descriptive rule name"
                    }
                },
                "required": ["id"]
            }),
            ToolKind::AddRule => json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Rule name"
                    },
                    "regex": {
                        "type": "string",
                        "description": "Pattern specification"
                    },
                    "replace": {
                        "type": "string",
                        "description": "HTML replacement template"
                    }
                },
                "required": ["name", "regex", "replace"]
            }),
            ToolKind::UpdateSourceText => json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "New source text"
                    }
                },
                "required": ["text"]
            }),
        }
    }
}

/// Tool schema for Chat Completions style APIs.
/// Nested format: {"type": "function", "function": {"name": ..., "parameters": ...}}
pub fn chat_completions_schema(tool: ToolKind) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.parameters()
        }
    })
}

/// All tool schemas in Chat Completions framing, in registry order.
pub fn all_chat_completions_schemas() -> Vec<Value> {
    ToolKind::all()
        .into_iter()
        .map(chat_completions_schema)
        .collect()
}

/// All tool declarations in Gemini `functionDeclarations` framing, in
/// registry order. Same names, descriptions, and parameter schemas as the
/// Chat Completions framing.
pub fn all_function_declarations() -> Vec<Value> {
    ToolKind::all()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name(),
                "description": tool.description(),
                "parameters": tool.parameters()
            })
        })
        .collect()
}

// ============================================================================
// Tool Operations (tagged union)
// ============================================================================

/// A validated tool invocation, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOp {
    UpdateRule {
        id: String,
        name: Option<String>,
        regex: Option<String>,
        replace: Option<String>,
    },
    AddRule {
        name: String,
        regex: String,
        replace: String,
    },
    UpdateSourceText {
        text: String,
    },
}

fn required_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Missing '{key}' parameter"))
}

fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

impl ToolOp {
    /// Parse a model-supplied invocation against the registry.
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        let Some(tool) = ToolKind::from_name(name) else {
            anyhow::bail!("Unknown tool: {name}");
        };

        match tool {
            ToolKind::UpdateRule => Ok(ToolOp::UpdateRule {
                id: required_str(args, "id")?,
                name: optional_str(args, "name"),
                regex: optional_str(args, "regex"),
                replace: optional_str(args, "replace"),
            }),
            ToolKind::AddRule => Ok(ToolOp::AddRule {
                name: required_str(args, "name")?,
                regex: required_str(args, "regex")?,
                replace: required_str(args, "replace")?,
            }),
            ToolKind::UpdateSourceText => Ok(ToolOp::UpdateSourceText {
                text: required_str(args, "text")?,
            }),
        }
    }
}

// ============================================================================
// Invocation / Result
// ============================================================================

/// A tool call request from the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Outcome of one tool invocation, fed back into the conversation.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub success: bool,
    pub payload: Value,
}

impl ToolResult {
    pub fn success(call_id: &str, name: &str, data: Value) -> Self {
        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            success: true,
            payload: json!({ "result": "Success", "data": data }),
        }
    }

    pub fn failure(call_id: &str, name: &str, message: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            success: false,
            payload: json!({ "error": message }),
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Host-side executor for validated tool operations.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, op: ToolOp) -> Result<Value>;
}

/// Parse and execute one invocation. Every failure mode ends up as an error
/// ToolResult; the conversation continues either way.
pub async fn execute_invocation(
    dispatcher: &dyn ToolDispatcher,
    call: &ToolCallRequest,
) -> ToolResult {
    let op = match ToolOp::parse(&call.name, &call.arguments) {
        Ok(op) => op,
        Err(e) => return ToolResult::failure(&call.id, &call.name, &e.to_string()),
    };

    match dispatcher.dispatch(op).await {
        Ok(data) => ToolResult::success(&call.id, &call.name, data),
        Err(e) => ToolResult::failure(&call.id, &call.name, &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_closed_and_named() {
        let tools = ToolKind::all();
        assert_eq!(tools.len(), 3);
        for tool in tools {
            assert_eq!(ToolKind::from_name(tool.name()), Some(tool));
        }
        assert_eq!(ToolKind::from_name("deleteEverything"), None);
    }

    #[test]
    fn test_schemas_are_stable_across_serializations() {
        let first = serde_json::to_string(&all_chat_completions_schemas()).unwrap();
        let second = serde_json::to_string(&all_chat_completions_schemas()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_framings_share_parameter_schemas() {
        let chat = all_chat_completions_schemas();
        let declarations = all_function_declarations();
        for (nested, flat) in chat.iter().zip(&declarations) {
            assert_eq!(nested["function"]["name"], flat["name"]);
            assert_eq!(nested["function"]["parameters"], flat["parameters"]);
        }
    }

    #[test]
    fn test_parse_update_rule() {
        let op = ToolOp::parse("updateRule", &json!({"id": "r1", "regex": "/x/g"})).unwrap();
        assert_eq!(
            op,
            ToolOp::UpdateRule {
                id: "r1".into(),
                name: None,
                regex: Some("/x/g".into()),
                replace: None,
            }
        );
    }

    #[test]
    fn test_parse_rejects_missing_required() {
        let err = ToolOp::parse("addRule", &json!({"name": "n"})).unwrap_err();
        assert!(err.to_string().contains("regex"));
    }

    #[test]
    fn test_parse_rejects_unknown_tool() {
        let err = ToolOp::parse("formatDisk", &json!({})).unwrap_err();
        assert!(err.to_string().contains("Unknown tool"));
    }

    #[test]
    fn test_result_payload_shapes() {
        let ok = ToolResult::success("c1", "addRule", json!({"status": "created"}));
        assert_eq!(ok.payload["result"], "Success");
        assert_eq!(ok.payload["data"]["status"], "created");

        let bad = ToolResult::failure("c2", "updateRule", "Rule ID not found: zz");
        assert!(!bad.success);
        assert_eq!(bad.payload["error"], "Rule ID not found: zz");
    }
}
