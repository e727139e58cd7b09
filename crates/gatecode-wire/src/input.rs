//! Input Processor (spec C4): parses stream-json input lines and dispatches
//! `control_request` envelopes. Every recognized envelope type round-trips
//! through `InputEnvelope`; everything else surfaces as `Error::InvalidMessage`
//! (spec §7) so the caller can decide whether to fail the run or skip the line.

use gatecode_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// The subset of incoming stream-json lines the CLI driver needs to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEnvelope {
    /// A bare `{"role": "...", "content": "..."}` turn or a `user`/`user_message`
    /// wrapper — both carry a plain-text prompt for the agent.
    UserMessage { content: String },
    UpdateEnvironmentVariables { vars: std::collections::HashMap<String, String> },
    ControlRequest { request_id: String, request: ControlRequest },
    ControlResponse { request_id: String },
    ControlCancelRequest { request_id: String },
    KeepAlive,
}

/// `control_request.request` subtypes (spec §6.5/§4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    Initialize(InitializeOverrides),
    SetPermissionMode { mode: String },
    SetModel { model: String },
    SetMaxThinkingTokens { tokens: u64 },
    Interrupt,
    Unknown { subtype: String },
}

/// The overrides an `initialize` control request may carry (spec §4.4):
/// system prompt replacement/append, a model alias (`"default"` resolves to
/// the baseline model established at startup), an agent selector, a raw
/// agents-JSON payload, and a hook-config override. Every field is optional —
/// an `initialize` request that sets none of them is still valid, just inert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitializeOverrides {
    pub system_prompt: Option<String>,
    pub append_system_prompt: Option<String>,
    pub model: Option<String>,
    pub agent: Option<String>,
    pub agents: Option<Value>,
    pub hooks: Option<Value>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    role: Option<String>,
    content: Option<Value>,
    message: Option<RawMessage>,
    #[serde(default)]
    env: std::collections::HashMap<String, String>,
    request_id: Option<String>,
    request: Option<RawControlRequest>,
}

#[derive(Deserialize)]
struct RawMessage {
    content: Option<Value>,
}

#[derive(Deserialize)]
struct RawControlRequest {
    subtype: String,
    mode: Option<String>,
    model: Option<String>,
    #[serde(rename = "maxThinkingTokens")]
    max_thinking_tokens: Option<u64>,
    #[serde(rename = "systemPrompt")]
    system_prompt: Option<String>,
    #[serde(rename = "appendSystemPrompt")]
    append_system_prompt: Option<String>,
    agent: Option<String>,
    agents: Option<Value>,
    hooks: Option<Value>,
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let mut out = String::new();
            for item in items {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    out.push_str(text);
                }
            }
            Some(out)
        }
        _ => None,
    }
}

/// Parses a single stream-json input line (spec §6.5: `user`, `user_message`,
/// a bare `{role, content}` turn, `update_environment_variables`,
/// `control_request`, `control_response`, `control_cancel_request`,
/// `keep_alive`).
pub fn parse_line(line: &str) -> Result<InputEnvelope> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidMessage("empty input line".to_string()));
    }
    let raw: RawEnvelope = serde_json::from_str(trimmed)?;

    match raw.kind.as_deref() {
        Some("user") | Some("user_message") => {
            let content = raw
                .message
                .and_then(|m| m.content)
                .or(raw.content)
                .as_ref()
                .and_then(text_of)
                .ok_or_else(|| Error::InvalidMessage("user envelope missing content".to_string()))?;
            Ok(InputEnvelope::UserMessage { content })
        }
        Some("update_environment_variables") => Ok(InputEnvelope::UpdateEnvironmentVariables { vars: raw.env }),
        Some("control_request") => {
            let request_id = raw
                .request_id
                .ok_or_else(|| Error::InvalidMessage("control_request missing request_id".to_string()))?;
            let raw_request = raw
                .request
                .ok_or_else(|| Error::InvalidMessage("control_request missing request".to_string()))?;
            let request = match raw_request.subtype.as_str() {
                "initialize" => ControlRequest::Initialize(InitializeOverrides {
                    system_prompt: raw_request.system_prompt,
                    append_system_prompt: raw_request.append_system_prompt,
                    model: raw_request.model,
                    agent: raw_request.agent,
                    agents: raw_request.agents,
                    hooks: raw_request.hooks,
                }),
                "set_permission_mode" => ControlRequest::SetPermissionMode {
                    mode: raw_request.mode.unwrap_or_default(),
                },
                "set_model" => ControlRequest::SetModel {
                    model: raw_request.model.unwrap_or_default(),
                },
                "set_max_thinking_tokens" => ControlRequest::SetMaxThinkingTokens {
                    tokens: raw_request.max_thinking_tokens.unwrap_or_default(),
                },
                "interrupt" => ControlRequest::Interrupt,
                other => ControlRequest::Unknown { subtype: other.to_string() },
            };
            Ok(InputEnvelope::ControlRequest { request_id, request })
        }
        Some("control_response") => {
            let request_id = raw.request_id.unwrap_or_default();
            Ok(InputEnvelope::ControlResponse { request_id })
        }
        Some("control_cancel_request") => {
            let request_id = raw.request_id.unwrap_or_default();
            Ok(InputEnvelope::ControlCancelRequest { request_id })
        }
        Some("keep_alive") => Ok(InputEnvelope::KeepAlive),
        Some(other) => Err(Error::InvalidMessage(format!("unsupported input envelope type: {other}"))),
        None => {
            // Bare `{role, content}` turn (no "type" field).
            let role = raw.role.ok_or_else(|| Error::InvalidMessage("input line missing role/type".to_string()))?;
            if role != "user" {
                return Err(Error::InvalidMessage(format!("bare input turn has unsupported role: {role}")));
            }
            let content = raw
                .content
                .as_ref()
                .and_then(text_of)
                .ok_or_else(|| Error::InvalidMessage("bare input turn missing content".to_string()))?;
            Ok(InputEnvelope::UserMessage { content })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_role_content_turn() {
        let line = r#"{"role": "user", "content": "hello"}"#;
        assert_eq!(parse_line(line).unwrap(), InputEnvelope::UserMessage { content: "hello".to_string() });
    }

    #[test]
    fn parses_user_envelope_with_nested_message() {
        let line = r#"{"type": "user", "message": {"content": "hi there"}}"#;
        assert_eq!(
            parse_line(line).unwrap(),
            InputEnvelope::UserMessage {
                content: "hi there".to_string()
            }
        );
    }

    #[test]
    fn parses_user_message_content_array_of_text_blocks() {
        let line = r#"{"type": "user_message", "message": {"content": [{"type": "text", "text": "abc"}]}}"#;
        assert_eq!(
            parse_line(line).unwrap(),
            InputEnvelope::UserMessage { content: "abc".to_string() }
        );
    }

    #[test]
    fn parses_control_request_set_permission_mode() {
        let line = r#"{"type": "control_request", "request_id": "r1", "request": {"subtype": "set_permission_mode", "mode": "bypassPermissions"}}"#;
        let parsed = parse_line(line).unwrap();
        assert_eq!(
            parsed,
            InputEnvelope::ControlRequest {
                request_id: "r1".to_string(),
                request: ControlRequest::SetPermissionMode {
                    mode: "bypassPermissions".to_string()
                }
            }
        );
    }

    #[test]
    fn parses_initialize_overrides() {
        let line = r#"{"type": "control_request", "request_id": "r0", "request": {
            "subtype": "initialize",
            "systemPrompt": "replace the baseline prompt",
            "appendSystemPrompt": "also do X",
            "model": "default",
            "agent": "reviewer",
            "agents": [{"name": "reviewer"}],
            "hooks": {"PreToolUse": []}
        }}"#;
        let parsed = parse_line(line).unwrap();
        match parsed {
            InputEnvelope::ControlRequest { request_id, request } => {
                assert_eq!(request_id, "r0");
                let ControlRequest::Initialize(overrides) = request else {
                    panic!("expected Initialize");
                };
                assert_eq!(overrides.system_prompt.as_deref(), Some("replace the baseline prompt"));
                assert_eq!(overrides.append_system_prompt.as_deref(), Some("also do X"));
                assert_eq!(overrides.model.as_deref(), Some("default"));
                assert_eq!(overrides.agent.as_deref(), Some("reviewer"));
                assert!(overrides.agents.is_some());
                assert!(overrides.hooks.is_some());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_initialize_with_no_overrides() {
        let line = r#"{"type": "control_request", "request_id": "r0b", "request": {"subtype": "initialize"}}"#;
        let parsed = parse_line(line).unwrap();
        assert_eq!(
            parsed,
            InputEnvelope::ControlRequest {
                request_id: "r0b".to_string(),
                request: ControlRequest::Initialize(InitializeOverrides::default())
            }
        );
    }

    #[test]
    fn parses_control_request_interrupt() {
        let line = r#"{"type": "control_request", "request_id": "r2", "request": {"subtype": "interrupt"}}"#;
        let parsed = parse_line(line).unwrap();
        assert_eq!(
            parsed,
            InputEnvelope::ControlRequest {
                request_id: "r2".to_string(),
                request: ControlRequest::Interrupt
            }
        );
    }

    #[test]
    fn unknown_control_request_subtype_is_preserved_not_rejected() {
        let line = r#"{"type": "control_request", "request_id": "r3", "request": {"subtype": "something_new"}}"#;
        let parsed = parse_line(line).unwrap();
        assert_eq!(
            parsed,
            InputEnvelope::ControlRequest {
                request_id: "r3".to_string(),
                request: ControlRequest::Unknown {
                    subtype: "something_new".to_string()
                }
            }
        );
    }

    #[test]
    fn parses_keep_alive() {
        let line = r#"{"type": "keep_alive"}"#;
        assert_eq!(parse_line(line).unwrap(), InputEnvelope::KeepAlive);
    }

    #[test]
    fn parses_update_environment_variables() {
        let line = r#"{"type": "update_environment_variables", "env": {"FOO": "bar"}}"#;
        let parsed = parse_line(line).unwrap();
        match parsed {
            InputEnvelope::UpdateEnvironmentVariables { vars } => {
                assert_eq!(vars.get("FOO"), Some(&"bar".to_string()));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_unsupported_envelope_type() {
        let line = r#"{"type": "something_unrecognized"}"#;
        assert!(parse_line(line).is_err());
    }

    #[test]
    fn rejects_empty_line() {
        assert!(parse_line("   ").is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_line("{not json").is_err());
    }
}
