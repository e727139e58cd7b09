//! Tool registry, trait definition, and the dispatcher that enforces
//! permission mode and sandbox policy around every call (spec §4.5).
//!
//! Each tool is a self-contained module implementing the Tool trait.
//! Tools can be added/removed by editing the tools/ directory and
//! the create_default_registry() function in lib.rs.

use crate::sandbox::Sandbox;
use gatecode_core::{Error, PermissionMode, Result};
use gatecode_llm::LlmTool;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub enum ToolResult {
    Text(String),
    Json(Value),
    Error(String),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
    pub fn error(s: impl Into<String>) -> Self {
        Self::Error(s.into())
    }

    pub fn to_content_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(v) => serde_json::to_string_pretty(v).unwrap_or_default(),
            Self::Error(e) => format!("Error: {}", e),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Per-call context threaded through dispatch: the sandbox a tool's path
/// arguments are resolved against, the active permission mode, and the
/// recursion depth (a tool that itself spawns a sub-run increments this).
#[derive(Clone)]
pub struct ToolContext {
    pub sandbox: Arc<Sandbox>,
    pub permission_mode: PermissionMode,
    pub depth: u32,
}

impl ToolContext {
    pub fn new(sandbox: Arc<Sandbox>, permission_mode: PermissionMode) -> Self {
        Self {
            sandbox,
            permission_mode,
            depth: 0,
        }
    }
}

/// The Tool trait — implement this to add a new capability.
///
/// Each tool is a standalone unit that can be registered with a ToolRegistry.
/// To add a new tool: create a file in tools/, implement this trait, register
/// it in create_default_registry().
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g. "Bash", "Read", "Glob").
    fn name(&self) -> &str;

    /// Human-readable description sent to the LLM.
    fn description(&self) -> &str;

    /// System prompt fragment for this tool (injected into LLM context).
    fn prompt(&self) -> &str {
        ""
    }

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// Whether this tool only reads state (no side effects).
    fn is_read_only(&self) -> bool {
        false
    }

    /// Whether this tool is currently enabled.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Execute the tool with the given arguments and context.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;

    /// Execute with cancellation support. Default: race execute() against cancellation.
    /// Tools that manage child processes (like BashTool) should override this to
    /// kill the process on cancellation.
    async fn execute_cancellable(
        &self,
        args: Value,
        ctx: &ToolContext,
        cancel: CancellationToken,
    ) -> ToolResult {
        tokio::select! {
            result = self.execute(args, ctx) => result,
            _ = cancel.cancelled() => ToolResult::text("[cancelled]"),
        }
    }

    /// Convert to the LLM tool definition format.
    fn to_llm_tool(&self) -> LlmTool {
        LlmTool::new(self.name(), self.description(), self.input_schema())
    }
}

/// Asked before running a tool call under a permission mode that requires
/// confirmation (spec §4.5). Returns whether the user approved the call.
#[async_trait::async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn confirm(&self, tool_name: &str, args: &Value) -> bool;
}

/// A prompt that always approves, for permission modes and test doubles that
/// never need to ask (bypass, dont-ask, accept-edits on read-only tools).
pub struct AlwaysApprove;

#[async_trait::async_trait]
impl PermissionPrompt for AlwaysApprove {
    async fn confirm(&self, _tool_name: &str, _args: &Value) -> bool {
        true
    }
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Remove a tool by name.
    pub fn remove(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Runs a tool call under permission-mode and sandbox enforcement: plan
    /// mode refuses outright, modes that require a prompt consult `prompt`,
    /// everything else runs directly. This is the only path tool calls from
    /// an agent run should take — `execute`/`execute_cancellable` remain for
    /// tests and direct tool-level use.
    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
        prompt: &dyn PermissionPrompt,
        cancel: CancellationToken,
    ) -> Result<ToolResult> {
        let tool = match self.tools.get(name) {
            Some(tool) if tool.is_enabled() => tool,
            Some(_) => return Ok(ToolResult::error(format!("Tool '{}' is disabled", name))),
            None => return Ok(ToolResult::error(format!("Tool not found: {}", name))),
        };

        if ctx.permission_mode.forbids_tools() {
            return Err(Error::PlanModeToolAttempt {
                tool_name: name.to_string(),
            });
        }

        if ctx.permission_mode.requires_prompt(tool.is_read_only())
            && !prompt.confirm(name, &args).await
        {
            return Err(Error::ToolDenied(name.to_string()));
        }

        Ok(tool.execute_cancellable(args, ctx, cancel).await)
    }

    /// Get LLM tool definitions for all enabled tools.
    pub fn get_definitions(&self) -> Vec<LlmTool> {
        self.tools
            .values()
            .filter(|t| t.is_enabled())
            .map(|t| t.to_llm_tool())
            .collect()
    }

    /// Get system prompt fragments from all enabled tools.
    pub fn combined_prompts(&self) -> String {
        self.tools
            .values()
            .filter(|t| t.is_enabled())
            .map(|t| t.prompt())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// List only read-only tools.
    pub fn list_read_only(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|(_, t)| t.is_read_only())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}
