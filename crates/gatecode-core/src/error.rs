//! Error taxonomy shared by the agent runner, tool dispatcher, and CLI driver.
//!
//! Mirrors the spec's error kinds (§7): configuration and input-parse errors
//! are surfaced before any model call; gateway/auth/budget/turn/plan errors are
//! surfaced from within a run; tool-internal errors never reach here — they are
//! captured into a `ToolResult` and the run continues.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("llm error: {provider} - {message}")]
    LlmError {
        provider: String,
        message: String,
        /// Whether the CLI driver's fallback-model retry applies (spec §7:
        /// a single retry on 429/5xx gateway errors when a fallback model is
        /// configured). Set by the caller that classified the underlying
        /// `gatecode_llm::LlmError` before it collapsed into this string.
        retryable: bool,
    },

    #[error("tool error: {name} - {message}")]
    ToolError { name: String, message: String },

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("max turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },

    #[error("max budget exceeded: spent ${spent:.4} against a budget of ${budget:.4}")]
    MaxBudgetExceeded { spent: f64, budget: f64 },

    #[error("plan mode forbids tool execution: {tool_name}")]
    PlanModeToolAttempt { tool_name: String },

    #[error("tool call denied by user: {0}")]
    ToolDenied(String),

    #[error("sandbox rejected path: {0}")]
    SandboxViolation(String),

    #[error("unsupported input payload: {0}")]
    UnsupportedInputPayload(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
        }
    }

    pub fn llm_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmError {
            provider: provider.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn llm_error_retryable(provider: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self::LlmError {
            provider: provider.into(),
            message: message.into(),
            retryable,
        }
    }

    pub fn tool_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolError {
            name: name.into(),
            message: message.into(),
        }
    }
}
