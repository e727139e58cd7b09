//! Integration tests for gatecode-tools: ToolResult, ToolRegistry dispatch,
//! and the default/policy registries against a real temp filesystem.

use gatecode_core::PermissionMode;
use gatecode_tools::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ===========================================================================
// ToolResult
// ===========================================================================

#[test]
fn tool_result_text() {
    let r = ToolResult::text("hello");
    assert!(!r.is_error());
    assert_eq!(r.to_content_string(), "hello");
}

#[test]
fn tool_result_error() {
    let r = ToolResult::error("boom");
    assert!(r.is_error());
    assert_eq!(r.to_content_string(), "Error: boom");
}

#[test]
fn tool_result_json() {
    let r = ToolResult::Json(json!({"key": "value"}));
    assert!(!r.is_error());
    let s = r.to_content_string();
    assert!(s.contains("key"));
    assert!(s.contains("value"));
}

// ===========================================================================
// ToolRegistry + dispatch
// ===========================================================================

#[tokio::test]
async fn default_registry_round_trips_write_then_read() {
    let dir = TempDir::new().unwrap();
    let registry = create_default_registry();
    let ctx = ToolContext::new(Arc::new(Sandbox::new(dir.path())), PermissionMode::Bypass);

    let write_result = registry
        .dispatch(
            "Write",
            json!({"file_path": "note.txt", "content": "hello from a tool"}),
            &ctx,
            &AlwaysApprove,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!write_result.is_error());

    let read_result = registry
        .dispatch(
            "Read",
            json!({"file_path": "note.txt"}),
            &ctx,
            &AlwaysApprove,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(read_result.to_content_string().contains("hello from a tool"));
}

#[tokio::test]
async fn plan_mode_refuses_every_dispatch() {
    let dir = TempDir::new().unwrap();
    let registry = create_default_registry();
    let ctx = ToolContext::new(Arc::new(Sandbox::new(dir.path())), PermissionMode::Plan);

    let result = registry
        .dispatch(
            "Read",
            json!({"file_path": "x"}),
            &ctx,
            &AlwaysApprove,
            CancellationToken::new(),
        )
        .await;
    assert!(result.is_err());
}

#[test]
fn policy_registry_excludes_tools_outside_the_allowlist() {
    let registry = create_policy_registry(&["Read"]);
    assert!(registry.get("Read").is_some());
    assert!(registry.get("Bash").is_none());
}

#[test]
fn tool_definitions_expose_function_schema_for_every_enabled_tool() {
    let registry = create_default_registry();
    let defs = registry.get_definitions();
    assert_eq!(defs.len(), 6);
    assert!(defs.iter().any(|d| d.function.name == "Bash"));
}
