//! LLM Provider trait

use crate::types::{LlmRequest, StreamDelta};
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("context overflow: {0}")]
    ContextOverflow(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl LlmError {
    /// Maps an HTTP status from the gateway to the appropriate error variant,
    /// reading `body` for a message when the status doesn't already imply one.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthFailed(body.to_string()),
            429 => Self::RateLimited {
                retry_after_ms: 1000,
            },
            400 if body.contains("context_length_exceeded") || body.contains("context window") => {
                Self::ContextOverflow(body.to_string())
            }
            _ => Self::RequestFailed(format!("http {status}: {body}")),
        }
    }
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> &[&str];

    fn supports_model(&self, model: &str) -> bool {
        self.models()
            .iter()
            .any(|m| *m == model || model.starts_with(m))
    }

    /// Stream a completion response. If `cancel` is provided and triggered,
    /// the underlying HTTP connection is dropped and the stream yields `LlmError::Cancelled`.
    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream>;

    /// Non-streaming completion, for callers that don't need partial deltas.
    /// Default implementation drains `complete_stream` and folds it through
    /// a `DeltaAccumulator`.
    async fn complete(
        &self,
        mut request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<crate::accumulator::CompletionOutcome> {
        use futures::StreamExt;

        request.stream = false;
        let mut stream = self.complete_stream(request, cancel).await?;
        let mut acc = crate::accumulator::DeltaAccumulator::new();
        while let Some(delta) = stream.next().await {
            acc.apply(delta?);
        }
        Ok(acc.finish())
    }
}
