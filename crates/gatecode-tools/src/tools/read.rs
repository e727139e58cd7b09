//! Read tool — read file contents with optional offset/limit

use crate::registry::{Tool, ToolContext, ToolResult};
use serde_json::{json, Value};
use tokio::fs;
use tracing::debug;

pub struct ReadTool;

#[async_trait::async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "Read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Returns numbered lines. Use offset/limit for large files."
    }

    fn prompt(&self) -> &str {
        "Use the Read tool to view files. Read files before editing them."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute or workspace-relative path to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start from (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to read (default 2000)"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let path = match args
            .get("file_path")
            .or(args.get("path"))
            .and_then(|v| v.as_str())
        {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: file_path"),
        };

        let resolved = match ctx.sandbox.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let content = match fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        let offset = args["offset"].as_u64().unwrap_or(1) as usize;
        let limit = args["limit"].as_u64().unwrap_or(2000) as usize;

        let lines: Vec<&str> = content.lines().collect();
        let start = (offset.saturating_sub(1)).min(lines.len());
        let end = (start + limit).min(lines.len());

        let result: Vec<String> = lines[start..end]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>6}\t{}", start + i + 1, line))
            .collect();

        debug!(
            "read: {} ({} lines from offset {})",
            path,
            end - start,
            offset
        );
        ToolResult::text(result.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Sandbox;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_numbered_lines_within_sandbox() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n")
            .await
            .unwrap();
        let ctx = ToolContext::new(
            Arc::new(Sandbox::new(dir.path())),
            gatecode_core::PermissionMode::Bypass,
        );
        let result = ReadTool
            .execute(json!({"file_path": "a.txt"}), &ctx)
            .await;
        assert!(!result.is_error());
        assert!(result.to_content_string().contains("1\tone"));
    }

    #[tokio::test]
    async fn rejects_path_outside_sandbox() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(
            Arc::new(Sandbox::new(dir.path())),
            gatecode_core::PermissionMode::Bypass,
        );
        let result = ReadTool
            .execute(json!({"file_path": "/etc/passwd"}), &ctx)
            .await;
        assert!(result.is_error());
    }
}
