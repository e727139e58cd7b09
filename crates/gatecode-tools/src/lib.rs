//! gatecode-tools — the tool registry, sandbox, and permission dispatcher
//! that sit between the agent runner and the concrete tool set (spec §4.5).
//!
//! Each tool is a self-contained file in src/tools/.
//! To add a tool: create the file, implement Tool trait, register below.
//! To remove a tool: delete the file, remove from mod.rs and registry below.

pub mod registry;
pub mod sandbox;
pub mod tools;

pub use registry::{AlwaysApprove, PermissionPrompt, Tool, ToolContext, ToolRegistry, ToolResult};
pub use sandbox::Sandbox;

/// Create the default tool registry with all builtin tools.
///
/// Edit this function to add or remove tools from the agent.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(tools::read::ReadTool);
    registry.register(tools::glob::GlobTool);
    registry.register(tools::grep::GrepTool);

    registry.register(tools::write::WriteTool);
    registry.register(tools::edit::EditTool);
    registry.register(tools::bash::BashTool);

    registry
}

/// Create a policy-scoped tool registry.
///
/// Only registers tools whose names appear in `allowed_tools`. If a tool
/// isn't registered, the LLM never sees it and can't call it — this is the
/// enforcement mechanism behind the CLI's `--allowed-tools`/`--disallowed-tools`
/// flags (spec §6.5).
pub fn create_policy_registry(allowed_tools: &[&str]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for name in allowed_tools {
        match *name {
            "Read" => registry.register(tools::read::ReadTool),
            "Glob" => registry.register(tools::glob::GlobTool),
            "Grep" => registry.register(tools::grep::GrepTool),
            "Write" => registry.register(tools::write::WriteTool),
            "Edit" => registry.register(tools::edit::EditTool),
            "Bash" => registry.register(tools::bash::BashTool),
            _ => tracing::warn!("Unknown tool in policy: {}", name),
        }
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_registers_all_builtin_tools() {
        let registry = create_default_registry();
        let mut names = registry.list();
        names.sort();
        assert_eq!(names, ["Bash", "Edit", "Glob", "Grep", "Read", "Write"]);
    }

    #[test]
    fn policy_registry_only_registers_allowed_tools() {
        let registry = create_policy_registry(&["Read", "Grep"]);
        let mut names = registry.list();
        names.sort();
        assert_eq!(names, ["Grep", "Read"]);
    }
}
