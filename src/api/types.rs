//! Message, tool-call, and tool-result types exchanged with the model
//! provider and the agent loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single entry in the conversation history the agent loop builds up.
///
/// After the first pair, messages always occur as assistant+user pairs: an
/// assistant message (optionally carrying `tool_calls`) followed by a user
/// message carrying the corresponding `tool_results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_results: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_results: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_results: None,
        }
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_results: None,
        }
    }

    pub fn user_with_tool_results(tool_results: Vec<ToolResult>) -> Self {
        Self {
            role: "user".to_string(),
            content: String::new(),
            tool_calls: None,
            tool_results: Some(tool_results),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// A single tool invocation requested by the model. `input` is a structured
/// JSON object matching the tool's declared schema, not a JSON-encoded
/// string — callers dispatch directly against it without an extra parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    /// Convenience accessor used by the ReAct loop's phase labeling, which
    /// looks for a `path` or `test_path` field to attach to progress events.
    pub fn path_hint(&self) -> Option<&str> {
        self.input
            .get("path")
            .or_else(|| self.input.get("test_path"))
            .and_then(|v| v.as_str())
    }
}

/// The uniform result every tool call produces, win or lose: tool failures
/// are data, never exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// Declares a tool to the model provider: name, description, and a JSON
/// Schema for its input object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Why a completion is being requested, so a provider can route to a
/// cheaper or more capable model per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Planning,
    Execution,
    Generation,
    Correction,
}

/// The model's answer to one `complete` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
}

impl CompletionResponse {
    pub fn has_tool_calls(&self) -> bool {
        self.message.has_tool_calls()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_system() {
        let msg = Message::system("be helpful");
        assert_eq!(msg.role, "system");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_message_assistant_with_tool_calls() {
        let call = ToolCall {
            id: "1".to_string(),
            name: "read_file".to_string(),
            input: serde_json::json!({"path": "a.py"}),
        };
        let msg = Message::assistant_with_tool_calls("", vec![call]);
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn test_tool_call_path_hint_prefers_path() {
        let call = ToolCall {
            id: "1".to_string(),
            name: "edit_file".to_string(),
            input: serde_json::json!({"path": "a.py", "test_path": "b.py"}),
        };
        assert_eq!(call.path_hint(), Some("a.py"));
    }

    #[test]
    fn test_tool_call_path_hint_falls_back_to_test_path() {
        let call = ToolCall {
            id: "1".to_string(),
            name: "run_tests".to_string(),
            input: serde_json::json!({"test_path": "tests/"}),
        };
        assert_eq!(call.path_hint(), Some("tests/"));
    }

    #[test]
    fn test_tool_result_error_sets_flag() {
        let res = ToolResult::error("1", "boom");
        assert!(res.is_error);
        assert_eq!(res.content, "boom");
    }

    #[test]
    fn test_message_serialization_omits_empty_optionals() {
        let msg = Message::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_results"));
    }

    #[test]
    fn test_purpose_serializes_snake_case() {
        let json = serde_json::to_string(&Purpose::Execution).unwrap();
        assert_eq!(json, "\"execution\"");
    }
}
