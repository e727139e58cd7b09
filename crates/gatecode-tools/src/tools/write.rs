//! Write tool — create or overwrite a file

use crate::registry::{Tool, ToolContext, ToolResult};
use serde_json::{json, Value};
use tokio::fs;
use tracing::debug;

pub struct WriteTool;

#[async_trait::async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "Write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent directories if needed. \
         Overwrites the file if it exists. Prefer Edit for modifications."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["file_path", "content"]
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
        let content = match args["content"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("Missing required parameter: content"),
        };

        let full_path = match ctx.sandbox.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        if let Some(parent) = full_path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return ToolResult::error(format!("Failed to create directories: {}", e));
            }
        }

        match fs::write(&full_path, content).await {
            Ok(()) => {
                debug!("write: {} ({} bytes)", path, content.len());
                ToolResult::text(format!("Wrote {} bytes to {}", content.len(), path))
            }
            Err(e) => ToolResult::error(format!("Failed to write: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Sandbox;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_file_within_sandbox() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(
            Arc::new(Sandbox::new(dir.path())),
            gatecode_core::PermissionMode::Bypass,
        );
        let result = WriteTool
            .execute(json!({"file_path": "out.txt", "content": "hi"}), &ctx)
            .await;
        assert!(!result.is_error());
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("out.txt"))
                .await
                .unwrap(),
            "hi"
        );
    }
}
