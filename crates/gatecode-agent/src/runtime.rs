//! Agent Runner (spec §4.1) — the multi-turn loop: request a completion,
//! dispatch any tool calls it asks for, feed the results back, repeat until
//! the assistant stops asking for tools or a budget/turn/permission limit
//! is hit.

use crate::context::ContextManager;
use crate::session::{Session, SessionRegistry};
use gatecode_core::usage::{CostEstimate, ModelPricing};
use gatecode_core::{
    Error, Message, ModelUsage, Result, Role, RunResult, SessionKey, ToolCall, ToolEvent, Usage,
};
use gatecode_llm::{LlmError, LlmMessage, LlmProvider, LlmRequest, LlmToolCall};
use gatecode_tools::{PermissionPrompt, ToolContext, ToolRegistry};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Streaming callback events (spec §4.1's `run_stream` callback bundle).
#[derive(Clone, Debug)]
pub enum AgentEvent {
    /// Stream start, carrying the model name about to be used.
    Start { model: String },
    Text(String),
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, arguments: String },
    ToolExecuting { id: String, name: String },
    ToolResult {
        id: String,
        name: String,
        result: String,
        is_error: bool,
    },
    Done { stop_reason: String },
    Error(String),
    /// Token usage for the turn that just finished, forwarded as soon as the
    /// gateway reports it so the CLI driver can attach it to that turn's
    /// `assistant` envelope rather than only the run-level `result`.
    Usage(Usage),
}

pub struct AgentConfig {
    pub default_model: String,
    /// Maximum assistant turns per run (spec §4.1: default 8).
    pub max_turns: usize,
    /// Maximum context window budget handed to `ContextManager` for the
    /// ephemeral request view built each turn.
    pub max_context_tokens: usize,
    /// 0.0 means unbounded.
    pub max_budget_usd: f64,
    pub pricing: HashMap<String, ModelPricing>,
    /// Spec §7: a retryable (429/5xx) gateway error triggers a single retry
    /// against this model before the turn fails. `None` disables the retry.
    pub fallback_model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o".to_string(),
            max_turns: 8,
            max_context_tokens: 128_000,
            max_budget_usd: 0.0,
            pricing: HashMap::new(),
            fallback_model: None,
        }
    }
}

pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionRegistry>,
    config: AgentConfig,
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        sessions: Arc<SessionRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools: Arc::new(tools),
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Runs one user turn to completion without incremental callbacks,
    /// using the provider's blocking `complete()` path.
    pub async fn run(
        &self,
        session_key: &SessionKey,
        user_message: &str,
        system_prompt: Option<&str>,
        tool_ctx: &ToolContext,
        prompt: &dyn PermissionPrompt,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        self.run_inner(
            session_key,
            user_message,
            system_prompt,
            tool_ctx,
            prompt,
            Some(tx),
            cancel,
            false,
        )
        .await
    }

    /// Runs one user turn, forwarding streaming deltas and tool lifecycle
    /// events to `event_tx` as they happen.
    pub async fn run_stream(
        &self,
        session_key: &SessionKey,
        user_message: &str,
        system_prompt: Option<&str>,
        tool_ctx: &ToolContext,
        prompt: &dyn PermissionPrompt,
        event_tx: mpsc::UnboundedSender<AgentEvent>,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        self.run_inner(
            session_key,
            user_message,
            system_prompt,
            tool_ctx,
            prompt,
            Some(event_tx),
            cancel,
            true,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_inner(
        &self,
        session_key: &SessionKey,
        user_message: &str,
        system_prompt: Option<&str>,
        tool_ctx: &ToolContext,
        prompt: &dyn PermissionPrompt,
        event_tx: Option<mpsc::UnboundedSender<AgentEvent>>,
        cancel: CancellationToken,
        streaming: bool,
    ) -> Result<RunResult> {
        let session = self
            .sessions
            .get(session_key)
            .ok_or_else(|| Error::SessionNotFound(session_key.to_string()))?;

        // Applied only on the session's first turn: `Session::set_system`
        // concatenates onto any existing leading system message, so calling
        // it again on every turn would grow that message without bound.
        if session.message_count().await == 0 {
            if let Some(prompt_text) = system_prompt {
                if !prompt_text.is_empty() {
                    session.set_system(prompt_text).await?;
                }
            }
        }

        let model = session.model().await;
        let model = if model.is_empty() {
            self.config.default_model.clone()
        } else {
            model
        };

        if self.config.max_budget_usd > 0.0 && !self.config.pricing.contains_key(&model) {
            return Err(Error::ConfigError(format!(
                "max_budget_usd is set but no pricing is configured for model '{}'",
                model
            )));
        }

        session.append(Message::user(user_message)).await?;

        let start = Instant::now();
        let mut api_time_ms: u64 = 0;
        let mut num_turns = 0usize;
        let mut total_usage = Usage::default();
        let mut model_usage: ModelUsage = HashMap::new();
        let mut tool_events: Vec<ToolEvent> = Vec::new();
        let mut final_message = Message::assistant("");

        let context = ContextManager::new(self.config.max_context_tokens);

        loop {
            if num_turns >= self.config.max_turns {
                return Err(Error::MaxTurnsExceeded {
                    max_turns: self.config.max_turns,
                });
            }

            if cancel.is_cancelled() {
                emit(&event_tx, AgentEvent::Done { stop_reason: "cancelled".into() }).await;
                break;
            }

            let mut llm_messages: Vec<LlmMessage> =
                session.messages().await.iter().map(to_llm_message).collect();
            context.compact(&mut llm_messages);

            let request = LlmRequest {
                model: model.clone(),
                messages: llm_messages,
                tools: Some(self.tools.get_definitions()),
                stream: streaming,
                ..Default::default()
            };

            emit(&event_tx, AgentEvent::Start { model: model.clone() }).await;

            let api_start = Instant::now();
            let (served_model, outcome) = self
                .call_with_fallback(request, streaming, &event_tx, cancel.clone())
                .await?;
            api_time_ms += api_start.elapsed().as_millis() as u64;
            num_turns += 1;

            if let Some(usage) = outcome.usage {
                let core_usage = Usage {
                    input_tokens: usage.prompt_tokens as u64,
                    output_tokens: usage.completion_tokens as u64,
                    ..Default::default()
                };
                emit(&event_tx, AgentEvent::Usage(core_usage)).await;
                total_usage.add(&core_usage);
                model_usage
                    .entry(served_model.clone())
                    .or_default()
                    .add(&core_usage);

                if self.config.max_budget_usd > 0.0 {
                    let pricing = self.config.pricing.get(&served_model).copied().unwrap_or(ModelPricing {
                        input_per_1m: 0.0,
                        output_per_1m: 0.0,
                    });
                    let spent = CostEstimate::compute(&total_usage, &pricing).0;
                    if spent > self.config.max_budget_usd {
                        return Err(Error::MaxBudgetExceeded {
                            spent,
                            budget: self.config.max_budget_usd,
                        });
                    }
                }
            }

            let tool_calls: Vec<ToolCall> = outcome
                .tool_calls
                .iter()
                .map(|tc| ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                })
                .collect();

            let assistant_message = if tool_calls.is_empty() {
                Message::assistant(outcome.text.clone())
            } else {
                Message::assistant_with_tools(outcome.text.clone(), tool_calls.clone())
            };
            session.append(assistant_message.clone()).await?;
            final_message = assistant_message;

            let stop_reason = map_finish_reason(outcome.finish_reason.as_deref());
            if tool_calls.is_empty() {
                emit(&event_tx, AgentEvent::Done { stop_reason }).await;
                break;
            }

            for call in &tool_calls {
                if cancel.is_cancelled() {
                    emit(&event_tx, AgentEvent::Done { stop_reason: "cancelled".into() }).await;
                    return Ok(build_result(
                        session.messages().await,
                        final_message,
                        total_usage,
                        model_usage,
                        tool_events,
                        &self.config,
                        &model,
                        num_turns,
                        start,
                        api_time_ms,
                    ));
                }

                tool_events.push(ToolEvent::Call {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
                emit(
                    &event_tx,
                    AgentEvent::ToolExecuting { id: call.id.clone(), name: call.name.clone() },
                )
                .await;

                let args = serde_json::from_str(&call.arguments).unwrap_or(serde_json::Value::Null);
                let dispatch = self
                    .tools
                    .dispatch(&call.name, args, tool_ctx, prompt, cancel.clone())
                    .await?;

                let is_error = dispatch.is_error();
                let mut result_str = dispatch.to_content_string();
                const MAX_RESULT_CHARS: usize = 50_000;
                if result_str.len() > MAX_RESULT_CHARS {
                    result_str.truncate(MAX_RESULT_CHARS);
                    result_str.push_str("... [truncated]");
                }

                tool_events.push(ToolEvent::Result {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    content: result_str.clone(),
                    is_error,
                });
                emit(
                    &event_tx,
                    AgentEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        result: result_str.clone(),
                        is_error,
                    },
                )
                .await;

                session
                    .append(Message::tool_result(call.id.clone(), result_str))
                    .await?;
            }

            debug!(session = %session_key, turn = num_turns, "tool calls executed, continuing loop");
        }

        info!(
            session = %session_key,
            turns = num_turns,
            tokens = total_usage.total_tokens(),
            "turn complete"
        );

        Ok(build_result(
            session.messages().await,
            final_message,
            total_usage,
            model_usage,
            tool_events,
            &self.config,
            &model,
            num_turns,
            start,
            api_time_ms,
        ))
    }

    async fn drain_stream(
        &self,
        request: LlmRequest,
        event_tx: &Option<mpsc::UnboundedSender<AgentEvent>>,
        cancel: CancellationToken,
    ) -> Result<gatecode_llm::accumulator::CompletionOutcome> {
        let mut stream = self
            .provider
            .complete_stream(request, Some(cancel.clone()))
            .await
            .map_err(|e| map_llm_error(self.provider.name(), e))?;

        let mut acc = gatecode_llm::DeltaAccumulator::new();
        let mut current_tool_ids: HashMap<u32, String> = HashMap::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = stream.next() => {
                    match next {
                        Some(Ok(delta)) => {
                            match &delta {
                                gatecode_llm::StreamDelta::Text(text) => {
                                    emit(event_tx, AgentEvent::Text(text.clone())).await;
                                }
                                gatecode_llm::StreamDelta::ToolCallStart { index, id, name } => {
                                    current_tool_ids.insert(*index, id.clone());
                                    emit(event_tx, AgentEvent::ToolCallStart { id: id.clone(), name: name.clone() }).await;
                                }
                                gatecode_llm::StreamDelta::ToolCallDelta { index, arguments } => {
                                    let id = current_tool_ids.get(index).cloned().unwrap_or_default();
                                    emit(event_tx, AgentEvent::ToolCallDelta { id, arguments: arguments.clone() }).await;
                                }
                                gatecode_llm::StreamDelta::Error(message) => {
                                    emit(event_tx, AgentEvent::Error(message.clone())).await;
                                }
                                gatecode_llm::StreamDelta::Done { .. } => {}
                            }
                            acc.apply(delta);
                        }
                        Some(Err(e)) => {
                            emit(event_tx, AgentEvent::Error(e.to_string())).await;
                            return Err(map_llm_error(self.provider.name(), e));
                        }
                        None => break,
                    }
                }
            }
        }

        Ok(acc.finish())
    }

    /// Issues one gateway call, retrying once against `config.fallback_model`
    /// if the first attempt fails with a retryable error (spec §7). Returns
    /// the model that actually served the turn alongside its outcome, so
    /// usage/cost accounting attributes to the model that was really billed.
    async fn call_with_fallback(
        &self,
        request: LlmRequest,
        streaming: bool,
        event_tx: &Option<mpsc::UnboundedSender<AgentEvent>>,
        cancel: CancellationToken,
    ) -> Result<(String, gatecode_llm::accumulator::CompletionOutcome)> {
        let primary_model = request.model.clone();
        let err = match self.call_once(request.clone(), streaming, event_tx, cancel.clone()).await {
            Ok(outcome) => return Ok((primary_model, outcome)),
            Err(e) => e,
        };

        let retryable = matches!(err, Error::LlmError { retryable: true, .. });
        let fallback_model = self
            .config
            .fallback_model
            .clone()
            .filter(|m| retryable && *m != primary_model);

        match fallback_model {
            Some(fallback_model) => {
                info!(from = %primary_model, to = %fallback_model, "retrying turn with fallback model");
                let mut retry_request = request;
                retry_request.model = fallback_model.clone();
                let outcome = self.call_once(retry_request, streaming, event_tx, cancel).await?;
                Ok((fallback_model, outcome))
            }
            None => Err(err),
        }
    }

    async fn call_once(
        &self,
        request: LlmRequest,
        streaming: bool,
        event_tx: &Option<mpsc::UnboundedSender<AgentEvent>>,
        cancel: CancellationToken,
    ) -> Result<gatecode_llm::accumulator::CompletionOutcome> {
        if streaming {
            self.drain_stream(request, event_tx, cancel).await
        } else {
            self.provider
                .complete(request, Some(cancel))
                .await
                .map_err(|e| map_llm_error(self.provider.name(), e))
        }
    }
}

async fn emit(event_tx: &Option<mpsc::UnboundedSender<AgentEvent>>, event: AgentEvent) {
    if let Some(tx) = event_tx {
        let _ = tx.send(event);
    }
}

#[allow(clippy::too_many_arguments)]
fn build_result(
    history: Vec<Message>,
    final_message: Message,
    usage: Usage,
    model_usage: ModelUsage,
    tool_events: Vec<ToolEvent>,
    config: &AgentConfig,
    model: &str,
    num_turns: usize,
    start: Instant,
    api_time_ms: u64,
) -> RunResult {
    let cost_usd = config
        .pricing
        .get(model)
        .map(|pricing| CostEstimate::compute(&usage, pricing).0)
        .unwrap_or(0.0);

    RunResult {
        history,
        final_message,
        usage,
        model_usage,
        tool_events,
        cost_usd,
        num_turns,
        wall_clock_ms: start.elapsed().as_millis() as u64,
        api_time_ms,
    }
}

/// Translates a persisted session message into the OpenAI wire shape sent
/// to the provider.
fn to_llm_message(message: &Message) -> LlmMessage {
    match message.role {
        Role::System => LlmMessage::system(message.content.clone()),
        Role::User => LlmMessage::user(message.content.clone()),
        Role::Tool => LlmMessage::tool_result(
            message.tool_call_id.clone().unwrap_or_default(),
            message.content.clone(),
        ),
        Role::Assistant => match &message.tool_calls {
            Some(calls) if !calls.is_empty() => LlmMessage::assistant_with_tools(
                message.content.clone(),
                calls
                    .iter()
                    .map(|c| LlmToolCall::new(c.id.clone(), c.name.clone(), c.arguments.clone()))
                    .collect(),
            ),
            _ => LlmMessage::assistant(message.content.clone()),
        },
    }
}

/// Preserves the gateway's 401/403 distinction through to the CLI driver
/// (spec §7: authentication failures get a synthetic assistant envelope and
/// a dedicated result subtype, not a generic gateway error). Also classifies
/// 429/5xx gateway errors as retryable so the driver can apply its single
/// fallback-model retry before giving up.
fn map_llm_error(provider: &str, e: LlmError) -> Error {
    if let LlmError::AuthFailed(reason) = e {
        return Error::AuthFailed { reason };
    }
    let retryable = matches!(e, LlmError::RateLimited { .. })
        || matches!(&e, LlmError::RequestFailed(msg) if is_server_error_status(msg));
    Error::llm_error_retryable(provider, e.to_string(), retryable)
}

/// `LlmError::from_status` formats non-2xx, non-401/403/429 responses as
/// `"http {status}: {body}"` — a 5xx status means the gateway itself failed,
/// which the spec treats as retryable; a 4xx means the request was bad and
/// retrying with a fallback model wouldn't help.
fn is_server_error_status(message: &str) -> bool {
    message
        .strip_prefix("http ")
        .and_then(|rest| rest.split(':').next())
        .and_then(|code| code.trim().parse::<u16>().ok())
        .is_some_and(|code| (500..600).contains(&code))
}

/// Gateway finish-reason → reference stop-reason mapping (spec §4.1).
fn map_finish_reason(reason: Option<&str>) -> String {
    match reason {
        Some("stop") => "end_turn",
        Some("length") => "max_tokens",
        Some("tool_calls") => "tool_use",
        Some("content_filter") => "end_turn",
        _ => "end_turn",
    }
    .to_string()
}
