//! The stream-json wire types (spec §6.4). Every envelope is one struct with
//! `#[derive(Serialize)]`; serde_json emits struct fields in declaration
//! order (it never sorts them the way it sorts an arbitrary `Map`), so the
//! field order below *is* the byte-level key order on the wire. Don't
//! reorder a struct's fields without re-checking against §6.4.

use gatecode_core::{Message, Role, ToolCall};
use serde::Serialize;
use serde_json::Value;

/// `usage` object key order (spec §6.4): `input_tokens, output_tokens,
/// cache_creation_input_tokens, cache_read_input_tokens, server_tool_use,
/// service_tier, cache_creation`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct WireUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub server_tool_use: Value,
    pub service_tier: Value,
    pub cache_creation: Value,
}

impl WireUsage {
    pub fn from_core(usage: &gatecode_core::Usage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_creation_input_tokens: usage.cache_creation_input_tokens,
            cache_read_input_tokens: usage.cache_read_input_tokens,
            server_tool_use: Value::Null,
            service_tier: Value::Null,
            cache_creation: Value::Null,
        }
    }

    /// Zero-filled usage, emitted when a stream completed with no usage
    /// frame from the gateway (spec §4.3: "usage object (zero-filled if
    /// none was provided)").
    pub fn zero() -> Self {
        Self::from_core(&gatecode_core::Usage::default())
    }
}

/// A single Anthropic-style content block inside an `assistant`/`user`
/// message (grounded on `lanegrid-agtrace`'s `ContentBlock` enum, which
/// parses this exact shape from the other direction).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// The `message` object inside an `assistant` envelope. Field order per
/// spec §6.4: `id, container(null), model, role, stop_reason, stop_sequence,
/// type, usage, content, context_management(null)`.
#[derive(Clone, Debug, Serialize)]
pub struct AssistantMessageBody {
    pub id: String,
    pub container: Value,
    pub model: String,
    pub role: &'static str,
    pub stop_reason: String,
    pub stop_sequence: Value,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub usage: WireUsage,
    pub content: Vec<ContentBlock>,
    pub context_management: Value,
}

impl AssistantMessageBody {
    pub fn new(id: impl Into<String>, model: impl Into<String>, stop_reason: &str, usage: WireUsage, content: Vec<ContentBlock>) -> Self {
        Self {
            id: id.into(),
            container: Value::Null,
            model: model.into(),
            role: "assistant",
            stop_reason: stop_reason.to_string(),
            stop_sequence: Value::Null,
            kind: "message",
            usage,
            content,
            context_management: Value::Null,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AssistantEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: AssistantMessageBody,
    pub session_id: String,
    pub parent_tool_use_id: Value,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl AssistantEnvelope {
    pub fn new(message: AssistantMessageBody, session_id: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            kind: "assistant",
            message,
            session_id: session_id.into(),
            parent_tool_use_id: Value::Null,
            uuid: uuid.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: &'static str) -> Self {
        self.error = Some(error);
        self
    }
}

/// The `message` object inside a `user` envelope: a plain role+content pair,
/// not the full assistant shape.
#[derive(Clone, Debug, Serialize)]
pub struct UserMessageBody {
    pub role: &'static str,
    pub content: Vec<ContentBlock>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: UserMessageBody,
    pub session_id: String,
    pub parent_tool_use_id: Value,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "isSynthetic")]
    pub is_synthetic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "isReplay")]
    pub is_replay: Option<bool>,
}

impl UserEnvelope {
    pub fn text(text: impl Into<String>, session_id: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            kind: "user",
            message: UserMessageBody {
                role: "user",
                content: vec![ContentBlock::Text { text: text.into() }],
            },
            session_id: session_id.into(),
            parent_tool_use_id: Value::Null,
            uuid: uuid.into(),
            is_synthetic: None,
            is_replay: None,
        }
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
        session_id: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            kind: "user",
            message: UserMessageBody {
                role: "user",
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: tool_use_id.into(),
                    content: content.into(),
                    is_error,
                }],
            },
            session_id: session_id.into(),
            parent_tool_use_id: Value::Null,
            uuid: uuid.into(),
            is_synthetic: None,
            is_replay: None,
        }
    }

    pub fn replayed(mut self) -> Self {
        self.is_replay = Some(true);
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.is_synthetic = Some(true);
        self
    }
}

/// `result.subtype` enumeration (spec §6.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSubtype {
    Success,
    ErrorMaxTurns,
    ErrorMaxBudgetUsd,
    ErrorDuringExecution,
}

#[derive(Clone, Debug, Serialize)]
pub struct PermissionDenial {
    pub tool_name: String,
    pub reason: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResultEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub subtype: ResultSubtype,
    pub is_error: bool,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub num_turns: usize,
    pub result: String,
    pub session_id: String,
    pub total_cost_usd: f64,
    pub usage: WireUsage,
    #[serde(rename = "modelUsage")]
    pub model_usage: std::collections::HashMap<String, WireUsage>,
    pub permission_denials: Vec<PermissionDenial>,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// `system:init` envelope. Field order per spec §6.4.
#[derive(Clone, Debug, Serialize)]
pub struct SystemInitEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub subtype: &'static str,
    pub cwd: String,
    pub session_id: String,
    pub tools: Vec<String>,
    pub mcp_servers: Vec<Value>,
    pub model: String,
    #[serde(rename = "permissionMode")]
    pub permission_mode: String,
    pub slash_commands: Vec<String>,
    #[serde(rename = "apiKeySource")]
    pub api_key_source: String,
    pub betas: Vec<String>,
    pub claude_code_version: String,
    pub output_style: String,
    pub agents: Vec<String>,
    pub skills: Vec<String>,
    pub plugins: Vec<String>,
    pub uuid: String,
}

impl SystemInitEnvelope {
    pub fn new(cwd: impl Into<String>, session_id: impl Into<String>, model: impl Into<String>, permission_mode: impl Into<String>, tools: Vec<String>, uuid: impl Into<String>) -> Self {
        Self {
            kind: "system",
            subtype: "init",
            cwd: cwd.into(),
            session_id: session_id.into(),
            tools,
            mcp_servers: Vec::new(),
            model: model.into(),
            permission_mode: permission_mode.into(),
            slash_commands: Vec::new(),
            api_key_source: "config".to_string(),
            betas: Vec::new(),
            claude_code_version: env!("CARGO_PKG_VERSION").to_string(),
            output_style: "default".to_string(),
            agents: Vec::new(),
            skills: Vec::new(),
            plugins: Vec::new(),
            uuid: uuid.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthStatusEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub subtype: &'static str,
    pub authenticated: bool,
}

/// `system:status` envelope, emitted after a `set_permission_mode` control
/// request takes effect (spec §4.4) so the client can confirm the mode it
/// asked for is the one now in force.
#[derive(Clone, Debug, Serialize)]
pub struct SystemStatusEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub subtype: &'static str,
    #[serde(rename = "permissionMode")]
    pub permission_mode: String,
}

impl SystemStatusEnvelope {
    pub fn new(permission_mode: impl Into<String>) -> Self {
        Self {
            kind: "system",
            subtype: "status",
            permission_mode: permission_mode.into(),
        }
    }
}

/// `progress` envelope — tool call/result lifecycle markers.
#[derive(Clone, Debug, Serialize)]
pub struct ProgressEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tool_use_id: String,
    pub tool_name: String,
    pub status: &'static str,
}

impl ProgressEnvelope {
    pub fn started(tool_use_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            kind: "progress",
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            status: "started",
        }
    }

    pub fn completed(tool_use_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            kind: "progress",
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            status: "completed",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolUseSummaryEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub preceding_tool_use_ids: Vec<String>,
}

/// Anthropic-style incremental frame, emitted when `--include-partial-messages`
/// is set (spec §4.3 "partials").
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventEnvelope {
    MessageStart { message: Value },
    ContentBlockStart { index: u32, content_block: Value },
    ContentBlockDelta { index: u32, delta: Value },
    ContentBlockStop { index: u32 },
    MessageDelta { delta: Value, usage: WireUsage },
    MessageStop,
}

/// Wraps a `StreamEventEnvelope` the way the reference nests partials one
/// level under a top-level `stream_event` envelope.
#[derive(Clone, Debug, Serialize)]
pub struct StreamEventWrapper {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub event: StreamEventEnvelope,
    pub session_id: String,
    pub uuid: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ControlResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub response: ControlResponseBody,
}

#[derive(Clone, Debug, Serialize)]
pub struct ControlResponseBody {
    pub subtype: &'static str,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponseEnvelope {
    pub fn success(request_id: impl Into<String>, response: Value) -> Self {
        Self {
            kind: "control_response",
            response: ControlResponseBody {
                subtype: "success",
                request_id: request_id.into(),
                response: Some(response),
                error: None,
            },
        }
    }

    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: "control_response",
            response: ControlResponseBody {
                subtype: "error",
                request_id: request_id.into(),
                response: None,
                error: Some(message.into()),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookOutcome {
    Success,
    Error,
    #[serde(rename = "")]
    None,
}

#[derive(Clone, Debug, Serialize)]
pub struct HookStartedEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub subtype: &'static str,
    pub hook_event: String,
    pub callback_id: String,
    pub tool_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct HookResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub subtype: &'static str,
    pub hook_event: String,
    pub callback_id: String,
    pub tool_name: String,
    pub outcome: HookOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HookProgressEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub subtype: &'static str,
    pub hook_event: String,
    pub callback_id: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct KeepAliveEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl Default for KeepAliveEnvelope {
    fn default() -> Self {
        Self { kind: "keep_alive" }
    }
}

/// Translates a persisted/in-memory core `Message` into the content-block
/// list used by the `assistant`/`user` wire shapes.
pub fn content_blocks_for(message: &Message) -> Vec<ContentBlock> {
    match message.role {
        Role::Tool => vec![ContentBlock::ToolResult {
            tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
            content: message.content.clone(),
            is_error: false,
        }],
        Role::Assistant => {
            let mut blocks = Vec::new();
            if !message.content.is_empty() {
                blocks.push(ContentBlock::Text {
                    text: message.content.clone(),
                });
            }
            for call in message.tool_calls.iter().flatten() {
                blocks.push(tool_use_block(call));
            }
            blocks
        }
        Role::System | Role::User => vec![ContentBlock::Text {
            text: message.content.clone(),
        }],
    }
}

pub fn tool_use_block(call: &ToolCall) -> ContentBlock {
    ContentBlock::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: serde_json::from_str(&call.arguments).unwrap_or(Value::Null),
    }
}

/// Gateway finish-reason → reference stop-reason mapping (spec §4.1/§6.4).
pub fn map_stop_reason(reason: &str) -> String {
    match reason {
        "end_turn" | "max_tokens" | "tool_use" | "stop_sequence" => reason.to_string(),
        "stop" => "end_turn".to_string(),
        "length" => "max_tokens".to_string(),
        "tool_calls" => "tool_use".to_string(),
        other => other.to_string(),
    }
}
