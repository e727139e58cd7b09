//! Integration tests for gatecode-core: session keys, message/tool-call
//! shapes, permission modes, usage accounting, and the error taxonomy.

use gatecode_core::*;

// ===========================================================================
// SessionKey
// ===========================================================================

#[test]
fn session_key_new_and_display() {
    let key = SessionKey::new("abc-123");
    assert_eq!(key.as_str(), "abc-123");
    assert_eq!(format!("{}", key), "abc-123");
}

#[test]
fn session_key_clone_is_cheap() {
    let key = SessionKey::new("test");
    let cloned = key.clone();
    assert_eq!(key, cloned);
    assert_eq!(key.as_str(), cloned.as_str());
}

#[test]
fn session_key_from_string() {
    let key: SessionKey = "hello".into();
    assert_eq!(key.as_str(), "hello");
    let key2: SessionKey = String::from("world").into();
    assert_eq!(key2.as_str(), "world");
}

#[test]
fn session_key_generate_produces_distinct_keys() {
    let a = SessionKey::generate();
    let b = SessionKey::generate();
    assert_ne!(a, b);
}

#[test]
fn session_key_equality_and_hash() {
    use std::collections::HashSet;
    let a = SessionKey::new("same");
    let b = SessionKey::new("same");
    let c = SessionKey::new("different");
    assert_eq!(a, b);
    assert_ne!(a, c);
    let mut set = HashSet::new();
    set.insert(a.clone());
    assert!(set.contains(&b));
    assert!(!set.contains(&c));
}

// ===========================================================================
// Role
// ===========================================================================

#[test]
fn role_serde_roundtrip() {
    let roles = vec![Role::System, Role::User, Role::Assistant, Role::Tool];
    for role in roles {
        let json = serde_json::to_string(&role).unwrap();
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(role, back);
    }
}

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
    assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
    assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), r#""tool""#);
}

// ===========================================================================
// Message
// ===========================================================================

#[test]
fn message_system_constructor() {
    let msg = Message::system("You are helpful");
    assert_eq!(msg.role, Role::System);
    assert_eq!(msg.content, "You are helpful");
    assert!(msg.tool_calls.is_none());
    assert!(msg.tool_call_id.is_none());
}

#[test]
fn message_user_constructor() {
    let msg = Message::user("Hello");
    assert_eq!(msg.role, Role::User);
    assert_eq!(msg.content, "Hello");
}

#[test]
fn message_assistant_constructor() {
    let msg = Message::assistant("Hi there");
    assert_eq!(msg.role, Role::Assistant);
    assert_eq!(msg.content, "Hi there");
}

#[test]
fn message_assistant_with_tools_wraps_none_when_empty() {
    let msg = Message::assistant_with_tools("", vec![]);
    assert!(msg.tool_calls.is_none());
    assert!(!msg.has_pending_tool_calls());
}

#[test]
fn message_tool_result_constructor() {
    let msg = Message::tool_result("tc-123", "file contents");
    assert_eq!(msg.role, Role::Tool);
    assert_eq!(msg.content, "file contents");
    assert_eq!(msg.tool_call_id.as_deref(), Some("tc-123"));
}

#[test]
fn message_serde_roundtrip() {
    let msg = Message::user("test message");
    let json = serde_json::to_string(&msg).unwrap();
    let back: Message = serde_json::from_str(&json).unwrap();
    assert_eq!(back.role, Role::User);
    assert_eq!(back.content, "test message");
}

#[test]
fn message_tool_calls_skipped_when_none() {
    let msg = Message::user("hi");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(!json.contains("tool_calls"));
    assert!(!json.contains("tool_call_id"));
}

// ===========================================================================
// ToolCall / ToolDefinition / ToolEvent
// ===========================================================================

#[test]
fn tool_call_serde() {
    let tc = ToolCall {
        id: "tc-1".into(),
        name: "Read".into(),
        arguments: r#"{"path":"/tmp/foo"}"#.into(),
    };
    let json = serde_json::to_string(&tc).unwrap();
    let back: ToolCall = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, "tc-1");
    assert_eq!(back.name, "Read");
}

#[test]
fn tool_definition_serde() {
    let td = ToolDefinition {
        name: "Bash".into(),
        description: "Run a command".into(),
        input_schema: serde_json::json!({"type": "object"}),
    };
    let json = serde_json::to_string(&td).unwrap();
    let back: ToolDefinition = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, "Bash");
    assert_eq!(back.description, "Run a command");
}

#[test]
fn tool_event_call_tags_kind_snake_case() {
    let event = ToolEvent::Call {
        id: "c1".into(),
        name: "Bash".into(),
        arguments: "{}".into(),
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains(r#""kind":"call""#));
    assert_eq!(event.id(), "c1");
    assert_eq!(event.name(), "Bash");
}

#[test]
fn tool_event_result_tags_kind_snake_case() {
    let event = ToolEvent::Result {
        id: "c1".into(),
        name: "Bash".into(),
        content: "ok".into(),
        is_error: false,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains(r#""kind":"result""#));
}

// ===========================================================================
// PermissionMode
// ===========================================================================

#[test]
fn permission_mode_default_is_default_variant() {
    assert_eq!(PermissionMode::default(), PermissionMode::Default);
}

#[test]
fn permission_mode_parses_kebab_and_camel_aliases() {
    assert_eq!(PermissionMode::parse("accept-edits"), Some(PermissionMode::AcceptEdits));
    assert_eq!(PermissionMode::parse("acceptEdits"), Some(PermissionMode::AcceptEdits));
    assert_eq!(PermissionMode::parse("bypassPermissions"), Some(PermissionMode::Bypass));
    assert_eq!(PermissionMode::parse("not-a-mode"), None);
}

#[test]
fn only_plan_mode_forbids_tools() {
    assert!(PermissionMode::Plan.forbids_tools());
    assert!(!PermissionMode::Default.forbids_tools());
    assert!(!PermissionMode::Bypass.forbids_tools());
}

#[test]
fn default_mode_always_requires_a_prompt() {
    assert!(PermissionMode::Default.requires_prompt(true));
    assert!(PermissionMode::Default.requires_prompt(false));
}

#[test]
fn accept_edits_only_prompts_for_non_read_only_tools() {
    assert!(!PermissionMode::AcceptEdits.requires_prompt(true));
    assert!(PermissionMode::AcceptEdits.requires_prompt(false));
}

#[test]
fn bypass_and_dont_ask_never_prompt() {
    assert!(!PermissionMode::Bypass.requires_prompt(false));
    assert!(!PermissionMode::DontAsk.requires_prompt(false));
}

// ===========================================================================
// Usage / CostEstimate
// ===========================================================================

#[test]
fn usage_total_tokens_sums_input_and_output() {
    let usage = Usage {
        input_tokens: 100,
        output_tokens: 50,
        cache_creation_input_tokens: 0,
        cache_read_input_tokens: 0,
    };
    assert_eq!(usage.total_tokens(), 150);
}

#[test]
fn usage_add_accumulates_all_fields() {
    let mut usage = Usage::default();
    usage.add(&Usage {
        input_tokens: 10,
        output_tokens: 20,
        cache_creation_input_tokens: 1,
        cache_read_input_tokens: 2,
    });
    usage.add(&Usage {
        input_tokens: 5,
        output_tokens: 5,
        cache_creation_input_tokens: 0,
        cache_read_input_tokens: 0,
    });
    assert_eq!(usage.input_tokens, 15);
    assert_eq!(usage.output_tokens, 25);
    assert_eq!(usage.cache_creation_input_tokens, 1);
    assert_eq!(usage.cache_read_input_tokens, 2);
}

#[test]
fn cost_estimate_computes_dollars_per_million_tokens() {
    let usage = Usage {
        input_tokens: 1_000_000,
        output_tokens: 1_000_000,
        cache_creation_input_tokens: 0,
        cache_read_input_tokens: 0,
    };
    let pricing = ModelPricing {
        input_per_1m: 3.0,
        output_per_1m: 15.0,
    };
    let cost = CostEstimate::compute(&usage, &pricing);
    assert!((cost.0 - 18.0).abs() < 1e-9);
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_auth_failed() {
    let e = Error::auth_failed("bad creds");
    assert!(e.to_string().contains("bad creds"));
    assert!(matches!(e, Error::AuthFailed { .. }));
}

#[test]
fn error_llm_error() {
    let e = Error::llm_error("openai", "rate limited");
    assert!(e.to_string().contains("openai"));
    assert!(e.to_string().contains("rate limited"));
}

#[test]
fn error_tool_error() {
    let e = Error::tool_error("Read", "file not found");
    assert!(e.to_string().contains("Read"));
    assert!(e.to_string().contains("file not found"));
}

#[test]
fn error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let e: Error = io_err.into();
    assert!(matches!(e, Error::IoError(_)));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    let e: Error = json_err.into();
    assert!(matches!(e, Error::JsonError(_)));
}

#[test]
fn error_display_all_variants() {
    let errors: Vec<Error> = vec![
        Error::AuthFailed { reason: "x".into() },
        Error::ConnectionClosed("x".into()),
        Error::InvalidMessage("x".into()),
        Error::SessionNotFound("x".into()),
        Error::LlmError { provider: "p".into(), message: "m".into(), retryable: false },
        Error::ToolError { name: "n".into(), message: "m".into() },
        Error::ConfigError("x".into()),
        Error::MaxTurnsExceeded { max_turns: 8 },
        Error::MaxBudgetExceeded { spent: 1.0, budget: 0.5 },
        Error::PlanModeToolAttempt { tool_name: "Bash".into() },
        Error::ToolDenied("Bash".into()),
        Error::SandboxViolation("x".into()),
        Error::UnsupportedInputPayload("x".into()),
        Error::Internal("x".into()),
    ];
    for e in errors {
        let _ = format!("{}", e);
    }
}
