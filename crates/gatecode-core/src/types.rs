//! Core data model: messages, tool calls/events, and per-run results.
//!
//! Invariants (spec §3):
//! - messages appear in history in strict append order.
//! - every `tool` message's `tool_call_id` names an earlier assistant
//!   `ToolCall.id` in the same history.
//! - every emitted `ToolEvent::Result` refers to a previously emitted
//!   `ToolEvent::Call` with the same id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Session identifier — cheaply cloneable, backed by a v4 UUID string.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    /// A fresh v4 UUID session key.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Message role.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the run's history. Immutable once appended.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        self.role == Role::Assistant
            && self
                .tool_calls
                .as_ref()
                .is_some_and(|calls| !calls.is_empty())
    }
}

/// A tool call emitted by the assistant. The id is gateway-assigned and
/// opaque; `arguments` may be ill-formed JSON text while streaming.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Tool definition surfaced to the model's tool schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One entry in a run's tool event log (spec §3: ToolEvent).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolEvent {
    Call {
        id: String,
        name: String,
        arguments: String,
    },
    Result {
        id: String,
        name: String,
        content: String,
        is_error: bool,
    },
}

impl ToolEvent {
    pub fn id(&self) -> &str {
        match self {
            ToolEvent::Call { id, .. } => id,
            ToolEvent::Result { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ToolEvent::Call { name, .. } => name,
            ToolEvent::Result { name, .. } => name,
        }
    }
}

/// Streaming delta from the gateway, already translated into a
/// provider-agnostic shape. See `gatecode-llm` for the OpenAI-compatible
/// SSE parser that produces these.
#[derive(Clone, Debug)]
pub enum StreamDelta {
    Text(String),
    ToolCallStart {
        index: u32,
        id: String,
        name: String,
    },
    ToolCallDelta {
        index: u32,
        arguments: String,
    },
    Done {
        finish_reason: Option<String>,
        usage: Option<crate::usage::Usage>,
    },
    Error(String),
}

/// Aggregate result of one run (spec §3: RunResult).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub history: Vec<Message>,
    pub final_message: Message,
    pub usage: crate::usage::Usage,
    pub model_usage: HashMap<String, crate::usage::Usage>,
    pub tool_events: Vec<ToolEvent>,
    pub cost_usd: f64,
    pub num_turns: usize,
    pub wall_clock_ms: u64,
    pub api_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_carries_call_id() {
        let msg = Message::tool_result("call-1", "ok");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn assistant_with_no_tool_calls_has_none_pending() {
        let msg = Message::assistant("hi");
        assert!(!msg.has_pending_tool_calls());
    }

    #[test]
    fn assistant_with_tool_calls_has_pending() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall {
                id: "c1".into(),
                name: "Bash".into(),
                arguments: "{}".into(),
            }],
        );
        assert!(msg.has_pending_tool_calls());
    }

    #[test]
    fn session_key_roundtrips_through_string() {
        let key = SessionKey::new("abc-123");
        assert_eq!(key.as_str(), "abc-123");
        assert_eq!(key.to_string(), "abc-123");
    }
}
