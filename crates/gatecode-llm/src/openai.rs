//! OpenAI-compatible chat-completions provider with SSE streaming (spec §4.2).

use crate::accumulator::CompletionOutcome;
use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{AccumulatedToolCall, LlmRequest, StreamDelta, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const DEFAULT_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "o3"];

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Points this provider at a different OpenAI-compatible gateway —
    /// a local proxy, Azure OpenAI, or any service speaking the same wire
    /// format (spec §6.1: `ANTHROPIC_BASE_URL`-style overrides, generalized).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Applies the provider config's `timeout_ms` (spec §6.1) to the
    /// underlying HTTP client. Rebuilds the client since `reqwest::Client`'s
    /// timeout can only be set at construction.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn models(&self) -> &[&str] {
        DEFAULT_MODELS
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        debug!(model = %request.model, "openai request");

        let send = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send();

        let response = match cancel.clone() {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(LlmError::Cancelled),
                result = send => result?,
            },
            None => send.await?,
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, body = %error_text, "openai error");
            return Err(LlmError::from_status(status, &error_text));
        }

        let stream = parse_sse_stream(response.bytes_stream(), cancel);
        Ok(Box::pin(stream))
    }

    /// Overrides the trait's stream-folding default: a `stream:false` request
    /// gets back one JSON object, not an event-stream body, so it can't be
    /// routed through `parse_sse_stream`. This sends the request with
    /// `stream` forced off and parses the single response body directly.
    async fn complete(
        &self,
        mut request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<CompletionOutcome> {
        request.stream = false;
        debug!(model = %request.model, "openai request (blocking)");

        let send = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send();

        let response = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(LlmError::Cancelled),
                result = send => result?,
            },
            None => send.await?,
        };

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(%status, %body, "openai error");
            return Err(LlmError::from_status(status, &body));
        }

        parse_blocking_response(&body)
    }
}

fn parse_blocking_response(body: &str) -> LlmResult<CompletionOutcome> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse(format!("{e}: {body}")))?;

    let choice = parsed.choices.into_iter().next();
    let finish_reason = choice
        .as_ref()
        .and_then(|c| c.finish_reason.as_deref())
        .map(map_finish_reason)
        .map(str::to_string);
    let text = choice.as_ref().and_then(|c| c.message.content.clone()).unwrap_or_default();
    let tool_calls = choice
        .map(|c| c.message.tool_calls.unwrap_or_default())
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, tc)| AccumulatedToolCall {
            index: index as u32,
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    Ok(CompletionOutcome {
        text,
        tool_calls,
        finish_reason,
        usage: parsed.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    })
}

fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    cancel: Option<CancellationToken>,
) -> impl futures::Stream<Item = LlmResult<StreamDelta>> + Send {
    async_stream::stream! {
        let mut buffer = String::new();
        tokio::pin!(bytes_stream);

        loop {
            let chunk_result = match &cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        yield Err(LlmError::Cancelled);
                        return;
                    }
                    next = bytes_stream.next() => next,
                },
                None => bytes_stream.next().await,
            };

            let chunk = match chunk_result {
                Some(Ok(c)) => c,
                Some(Err(e)) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    continue;
                }
                None => break,
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(event_end) = buffer.find("\n\n") {
                let event_str = buffer[..event_end].to_string();
                buffer = buffer[event_end + 2..].to_string();

                let mut event_data = String::new();
                for line in event_str.lines() {
                    if let Some(rest) = line.strip_prefix("data: ") {
                        event_data = rest.to_string();
                    }
                }

                if event_data.is_empty() {
                    continue;
                }
                if event_data == "[DONE]" {
                    continue;
                }

                let chunk: ChatCompletionChunk = match serde_json::from_str(&event_data) {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(LlmError::InvalidResponse(format!("{e}: {event_data}")));
                        continue;
                    }
                };

                if let Some(usage) = chunk.usage {
                    yield Ok(StreamDelta::Done {
                        finish_reason: None,
                        usage: Some(Usage {
                            prompt_tokens: usage.prompt_tokens,
                            completion_tokens: usage.completion_tokens,
                        }),
                    });
                }

                let Some(choice) = chunk.choices.into_iter().next() else {
                    continue;
                };

                if let Some(content) = choice.delta.content {
                    if !content.is_empty() {
                        yield Ok(StreamDelta::Text(content));
                    }
                }

                for tc in choice.delta.tool_calls.unwrap_or_default() {
                    if let Some(function) = &tc.function {
                        if let Some(name) = &function.name {
                            yield Ok(StreamDelta::ToolCallStart {
                                index: tc.index,
                                id: tc.id.clone().unwrap_or_default(),
                                name: name.clone(),
                            });
                        }
                        if let Some(arguments) = &function.arguments {
                            if !arguments.is_empty() {
                                yield Ok(StreamDelta::ToolCallDelta {
                                    index: tc.index,
                                    arguments: arguments.clone(),
                                });
                            }
                        }
                    }
                }

                if let Some(reason) = choice.finish_reason {
                    yield Ok(StreamDelta::Done {
                        finish_reason: Some(map_finish_reason(&reason).to_string()),
                        usage: None,
                    });
                }
            }
        }
    }
}

/// Maps an OpenAI `finish_reason` onto the provider-agnostic vocabulary used
/// by the agent runner (spec §4.1/§4.2).
fn map_finish_reason(reason: &str) -> &'static str {
    match reason {
        "stop" => "end_turn",
        "length" => "max_tokens",
        "tool_calls" => "tool_use",
        "content_filter" => "end_turn",
        _ => "end_turn",
    }
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Deserialize)]
struct ChunkToolCall {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunctionCall>,
}

#[derive(Deserialize, Default)]
struct ChunkFunctionCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// A `stream:false` chat-completions response — one object, no framing.
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunctionCall,
}

#[derive(Deserialize)]
struct ResponseFunctionCall {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::DeltaAccumulator;
    use futures::stream;

    fn byte_chunks(frames: &[&str]) -> impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> {
        let owned: Vec<bytes::Bytes> = frames.iter().map(|f| bytes::Bytes::from(f.to_string())).collect();
        stream::iter(owned.into_iter().map(Ok))
    }

    #[test]
    fn parses_blocking_response_text_and_usage() {
        let body = r#"{"choices":[{"message":{"content":"Hi there"},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":3}}"#;
        let outcome = parse_blocking_response(body).unwrap();
        assert_eq!(outcome.text, "Hi there");
        assert_eq!(outcome.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(outcome.usage.unwrap().prompt_tokens, 5);
    }

    #[test]
    fn parses_blocking_response_tool_calls() {
        let body = r#"{"choices":[{"message":{"content":null,"tool_calls":[{"id":"c1","type":"function","function":{"name":"Bash","arguments":"{\"command\":\"ls\"}"}}]},"finish_reason":"tool_calls"}]}"#;
        let outcome = parse_blocking_response(body).unwrap();
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].id, "c1");
        assert_eq!(outcome.tool_calls[0].name, "Bash");
        assert_eq!(outcome.finish_reason.as_deref(), Some("tool_use"));
    }

    #[tokio::test]
    async fn parses_text_deltas_and_terminal_done_sentinel() {
        let frames = [
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let mut stream = Box::pin(parse_sse_stream(byte_chunks(&frames), None));
        let mut acc = DeltaAccumulator::new();
        while let Some(delta) = stream.next().await {
            acc.apply(delta.unwrap());
        }
        let outcome = acc.finish();
        assert_eq!(outcome.text, "Hello");
        assert_eq!(outcome.finish_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn parses_tool_call_deltas_keyed_by_index() {
        let frames = [
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"Bash\",\"arguments\":\"\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"cmd\\\":\\\"ls\\\"}\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let mut stream = Box::pin(parse_sse_stream(byte_chunks(&frames), None));
        let mut acc = DeltaAccumulator::new();
        while let Some(delta) = stream.next().await {
            acc.apply(delta.unwrap());
        }
        let outcome = acc.finish();
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].id, "call_1");
        assert_eq!(outcome.tool_calls[0].name, "Bash");
        assert_eq!(outcome.tool_calls[0].arguments, r#"{"cmd":"ls"}"#);
        assert_eq!(outcome.finish_reason.as_deref(), Some("tool_use"));
    }

    #[tokio::test]
    async fn usage_frame_surfaces_as_done_delta() {
        let frames = [
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":4}}\n\n",
            "data: [DONE]\n\n",
        ];
        let mut stream = Box::pin(parse_sse_stream(byte_chunks(&frames), None));
        let mut acc = DeltaAccumulator::new();
        while let Some(delta) = stream.next().await {
            acc.apply(delta.unwrap());
        }
        let outcome = acc.finish();
        assert_eq!(outcome.usage.unwrap().completion_tokens, 4);
    }

    #[test]
    fn finish_reason_maps_to_provider_agnostic_vocabulary() {
        assert_eq!(map_finish_reason("stop"), "end_turn");
        assert_eq!(map_finish_reason("length"), "max_tokens");
        assert_eq!(map_finish_reason("tool_calls"), "tool_use");
        assert_eq!(map_finish_reason("whatever"), "end_turn");
    }

    #[test]
    fn status_mapping_distinguishes_auth_and_rate_limit() {
        assert!(matches!(
            LlmError::from_status(reqwest::StatusCode::UNAUTHORIZED, ""),
            LlmError::AuthFailed(_)
        ));
        assert!(matches!(
            LlmError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            LlmError::RateLimited { .. }
        ));
    }
}
