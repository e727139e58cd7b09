//! CLI entry point: wires the pieces from every other module into the
//! stream-json run loop (spec C1-C9). Grounded on the async-service `main`
//! shape used by `agenticlaw-gateway`/`agenticlaw-consciousness` (tokio
//! runtime, `tracing_subscriber::EnvFilter`, a `Cli` parsed up front) rather
//! than the teacher's own synchronous batch-file `main`, since everything
//! downstream of it (`gatecode-agent`, `gatecode-wire`) is already async.

mod cli;
mod config;
mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gatecode_agent::{AgentConfig, AgentEvent, AgentRuntime, HookEmitter, JsonlSessionStore, KeepAliveTask, Session, SessionRegistry, SessionStore};
use gatecode_core::{Error as CoreError, PermissionMode, SessionKey};
use gatecode_llm::OpenAiProvider;
use gatecode_tools::{tools, AlwaysApprove, PermissionPrompt, Sandbox, ToolContext, ToolRegistry};
use gatecode_wire::{
    content_blocks_for_history_message, replay, ContentBlock, ControlRequest, ControlResponseEnvelope, Emitter,
    HookOutcome as WireHookOutcome, InputEnvelope, LineSink, PermissionDenial, RecordingSink, ResultSubtype,
    StreamEventEnvelope, WireUsage, WriterSink,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use cli::{split_tool_list, Cli, InputFormat, OutputFormat};
use config::ProviderConfig;
use settings::ClaudeSettings;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "gatecode=info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        eprintln!("error: {e}");
        return std::process::ExitCode::from(1);
    }

    match run(cli).await {
        Ok(code) => std::process::ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::ExitCode::from(1)
        }
    }
}

/// A non-interactive authorizer: `--print` runs have no UI to bridge a
/// permission prompt to, so every tool call that would otherwise need one is
/// refused outright (spec §4.5, §9: "the authorizer bridges to the
/// interactive UI or to a fixed refusal in non-interactive mode").
struct NonInteractivePrompt;

#[async_trait::async_trait]
impl PermissionPrompt for NonInteractivePrompt {
    async fn confirm(&self, _tool_name: &str, _input: &serde_json::Value) -> bool {
        false
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let cwd = std::env::current_dir()?;

    let provider_config_path = cli
        .provider_config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(ProviderConfig::default_path);
    let provider_config = ProviderConfig::load(&provider_config_path)?;
    let settings = ClaudeSettings::discover(&cwd);

    let model = provider_config.resolve_model(
        cli.model
            .as_deref()
            .or(settings.model.as_deref())
            .unwrap_or(&provider_config.default_model),
    );

    let sandbox = Arc::new(Sandbox::new(cwd.clone()));
    let tool_registry = build_tool_registry(&cli);
    let tool_names: Vec<String> = {
        let mut names: Vec<String> = tool_registry.list().into_iter().map(str::to_string).collect();
        names.sort();
        names
    };

    let store_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".gatecode").join("sessions");
    let store = Arc::new(JsonlSessionStore::new(store_dir));
    let sessions = Arc::new(SessionRegistry::new(store.clone(), model.clone()));
    let session = resolve_session(&cli, &sessions, &cwd).await?;
    if cli.model.is_some() {
        session.set_model(model.clone()).await;
    }
    sessions.record_last_for_project(&cwd, &session.key).await?;

    let provider = Arc::new(
        OpenAiProvider::new(provider_config.api_key.clone())
            .with_base_url(provider_config.api_base_url.clone())
            .with_timeout(Duration::from_millis(provider_config.timeout_ms)),
    );
    let agent_config = AgentConfig {
        default_model: model.clone(),
        max_turns: cli.max_turns.unwrap_or(8),
        max_context_tokens: 128_000,
        max_budget_usd: cli.max_budget_usd.unwrap_or(0.0),
        pricing: provider_config.pricing.clone(),
        fallback_model: cli.fallback_model.clone(),
    };
    let runtime = AgentRuntime::new(provider, tool_registry, sessions.clone(), agent_config);
    let mut hooks = Arc::new(HookEmitter::new(settings.hooks.clone()));
    let mut system_prompt = format!("You are an autonomous coding agent operating in {}.", cwd.display());
    let output_style = settings.output_style.clone().unwrap_or_else(|| "default".to_string());
    let available_models = collect_available_models(&provider_config);
    let mut control_initialized = false;

    let stream_output = cli.output_format == OutputFormat::StreamJson;

    let stdout_sink = Arc::new(WriterSink::new(tokio::io::stdout()));
    let recording: Option<Arc<RecordingSink>> =
        cli.replay_user_messages.then(|| Arc::new(RecordingSink::new(stdout_sink.clone())));
    let sink: Arc<dyn LineSink> = match &recording {
        Some(r) => r.clone(),
        None => stdout_sink,
    };
    let emitter = Emitter::new(sink.clone(), session.key.as_str(), cli.include_partial_messages);

    if stream_output {
        emitter
            .emit_system_init(&cwd.display().to_string(), &model, cli.resolved_permission_mode().as_str(), tool_names)
            .await;

        if cli.replay_user_messages {
            let replay_lines = store.load_stream_json_lines(&session.key).await?;
            replay(&sink, &replay_lines).await;
        }
    }

    let prompt_authorizer: Arc<dyn PermissionPrompt> = if cli.print { Arc::new(NonInteractivePrompt) } else { Arc::new(AlwaysApprove) };
    let mut permission_mode = cli.resolved_permission_mode();
    let mut last_result: Option<gatecode_core::Result<gatecode_core::RunResult>> = None;

    if cli.input_format == InputFormat::StreamJson {
        let keep_alive = stream_output.then(|| {
            let emitter = emitter.clone();
            KeepAliveTask::spawn(Duration::from_secs(30), move || {
                let emitter = emitter.clone();
                Box::pin(async move { emitter.emit_keep_alive().await })
            })
        });

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(task) = &keep_alive {
                task.notify_activity();
            }
            match gatecode_wire::parse_line(&line) {
                Ok(InputEnvelope::UserMessage { content }) => {
                    let tool_ctx = ToolContext::new(sandbox.clone(), permission_mode);
                    let outcome = run_turn(
                        &runtime,
                        &emitter,
                        &hooks,
                        &session,
                        &content,
                        &system_prompt,
                        &tool_ctx,
                        prompt_authorizer.as_ref(),
                        stream_output,
                    )
                    .await;
                    last_result = Some(outcome);
                }
                Ok(InputEnvelope::UpdateEnvironmentVariables { vars }) => {
                    for (key, value) in vars {
                        std::env::set_var(key, value);
                    }
                }
                Ok(InputEnvelope::ControlRequest { request_id, request }) => {
                    handle_control_request(
                        &emitter,
                        &session,
                        &mut permission_mode,
                        &mut system_prompt,
                        &model,
                        &mut hooks,
                        &output_style,
                        &available_models,
                        &mut control_initialized,
                        &request_id,
                        request,
                    )
                    .await;
                }
                Ok(InputEnvelope::ControlResponse { .. }) => {}
                Ok(InputEnvelope::ControlCancelRequest { .. }) => {
                    session.abort().await;
                }
                Ok(InputEnvelope::KeepAlive) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed stream-json input line");
                }
            }
        }
        if let Some(task) = &keep_alive {
            task.stop();
        }
    } else {
        let prompt = match &cli.prompt {
            Some(p) => p.clone(),
            None => {
                let mut buf = String::new();
                tokio::io::stdin().read_to_string(&mut buf).await?;
                buf.trim().to_string()
            }
        };
        let tool_ctx = ToolContext::new(sandbox.clone(), permission_mode);
        let outcome = run_turn(
            &runtime,
            &emitter,
            &hooks,
            &session,
            &prompt,
            &system_prompt,
            &tool_ctx,
            prompt_authorizer.as_ref(),
            stream_output,
        )
        .await;
        last_result = Some(outcome);
    }

    if let Some(recording) = &recording {
        for line in recording.recorded_lines().await {
            store.append_stream_json_line(&session.key, &line).await?;
        }
    }

    let Some(outcome) = last_result else {
        return Ok(0);
    };
    finish(&cli, &emitter, &model, outcome).await
}

/// Builds the tool registry per the CLI's `--tools`/`--allowedTools`/
/// `--disallowedTools` (spec §6.5): an explicit `--tools` list replaces the
/// default set entirely; otherwise the default set is used, trimmed by
/// `--disallowedTools` and extended by `--allowedTools` (a no-op for any
/// name already present, since every builtin tool is already in the default
/// set).
fn build_tool_registry(cli: &Cli) -> ToolRegistry {
    let explicit = split_tool_list(&cli.tools);
    let mut registry = if explicit.is_empty() {
        gatecode_tools::create_default_registry()
    } else {
        gatecode_tools::create_policy_registry(&explicit.iter().map(String::as_str).collect::<Vec<_>>())
    };

    for name in split_tool_list(&cli.allowed_tools) {
        register_builtin(&mut registry, &name);
    }
    for name in split_tool_list(&cli.disallowed_tools) {
        registry.remove(&name);
    }
    registry
}

fn register_builtin(registry: &mut ToolRegistry, name: &str) {
    match name {
        "Read" => registry.register(tools::read::ReadTool),
        "Glob" => registry.register(tools::glob::GlobTool),
        "Grep" => registry.register(tools::grep::GrepTool),
        "Write" => registry.register(tools::write::WriteTool),
        "Edit" => registry.register(tools::edit::EditTool),
        "Bash" => registry.register(tools::bash::BashTool),
        other => tracing::warn!("unknown tool in --allowedTools: {other}"),
    }
}

/// Resolves the session to run against from `--continue`/`--resume`/
/// `--session-id`/`--fork-session` (spec §6.5, §4.6). `--fork-session`
/// always clones whatever session the other flags resolve to, keeping its
/// entire history; `--session-id` alongside it names the clone's id.
async fn resolve_session(cli: &Cli, sessions: &Arc<SessionRegistry>, cwd: &Path) -> anyhow::Result<Arc<Session>> {
    let base = if cli.r#continue {
        match sessions.resume_last_for_project(cwd).await? {
            Some(s) => s,
            None => sessions.create(),
        }
    } else if let Some(resume_arg) = &cli.resume {
        if resume_arg == "picker" {
            match sessions.resume_last_for_project(cwd).await? {
                Some(s) => s,
                None => sessions.create(),
            }
        } else {
            sessions.resume(SessionKey::new(resume_arg.clone())).await?
        }
    } else if let Some(id) = &cli.session_id {
        if cli.fork_session {
            sessions.create()
        } else {
            return Ok(sessions.create_with_key(SessionKey::new(id.clone())));
        }
    } else {
        sessions.create()
    };

    if cli.fork_session {
        let keep = base.message_count().await;
        let target = cli.session_id.clone().map(SessionKey::new);
        return Ok(sessions.fork(&base.key, keep, target).await?);
    }
    Ok(base)
}

/// The fixed model list an `initialize` control response echoes back: every
/// model with a configured price plus the default model and every alias
/// target, deduplicated and sorted (spec §6.1 has no separate "model
/// catalog" endpoint, so the provider config is the only source of truth).
fn collect_available_models(provider_config: &ProviderConfig) -> Vec<String> {
    let mut models: Vec<String> = provider_config.pricing.keys().cloned().collect();
    if !models.contains(&provider_config.default_model) {
        models.push(provider_config.default_model.clone());
    }
    for alias_target in provider_config.model_aliases.values() {
        if !models.contains(alias_target) {
            models.push(alias_target.clone());
        }
    }
    models.sort();
    models
}

/// Resolves the `"default"` model alias to the baseline model established at
/// startup (spec §4.4's `set_model`/`initialize` rows); any other value
/// passes through unchanged.
fn resolve_model_alias(requested: &str, baseline_model: &str) -> String {
    if requested == "default" {
        baseline_model.to_string()
    } else {
        requested.to_string()
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_control_request(
    emitter: &Emitter,
    session: &Arc<Session>,
    permission_mode: &mut PermissionMode,
    system_prompt: &mut String,
    baseline_model: &str,
    hooks: &mut Arc<HookEmitter>,
    output_style: &str,
    available_models: &[String],
    control_initialized: &mut bool,
    request_id: &str,
    request: ControlRequest,
) {
    match request {
        ControlRequest::Initialize(overrides) => {
            if *control_initialized {
                emitter
                    .emit_control_response(ControlResponseEnvelope::error(request_id, "initialize may only be called once per run"))
                    .await;
                return;
            }
            *control_initialized = true;

            if let Some(replacement) = overrides.system_prompt {
                *system_prompt = replacement;
            }
            if let Some(addition) = overrides.append_system_prompt {
                system_prompt.push_str("\n\n");
                system_prompt.push_str(&addition);
            }
            if let Some(requested_model) = overrides.model {
                let resolved = resolve_model_alias(&requested_model, baseline_model);
                session.set_model(resolved).await;
            }
            if let Some(agent) = overrides.agent {
                session.set_agent_override(agent).await;
            }
            if let Some(agents) = overrides.agents {
                session.set_agents(agents).await;
            }
            if let Some(hook_config) = overrides.hooks {
                *hooks = Arc::new(HookEmitter::new(settings::parse_hooks(hook_config)));
            }

            let response = serde_json::json!({
                "commands": Vec::<String>::new(),
                "output_style": output_style.to_string(),
                "available_output_styles": initialize_output_styles(output_style),
                "models": available_models,
                "account": {"authenticated": true, "apiKeySource": "config"},
            });
            emitter.emit_control_response(ControlResponseEnvelope::success(request_id, response)).await;
        }
        ControlRequest::SetPermissionMode { mode } => match PermissionMode::parse(&mode) {
            Some(parsed) => {
                *permission_mode = parsed;
                emitter.emit_control_response(ControlResponseEnvelope::success(request_id, serde_json::json!({}))).await;
                emitter.emit_system_status(parsed.as_str()).await;
            }
            None => {
                emitter
                    .emit_control_response(ControlResponseEnvelope::error(request_id, format!("unrecognized permission mode: {mode}")))
                    .await;
            }
        },
        ControlRequest::SetModel { model } => {
            let resolved = resolve_model_alias(&model, baseline_model);
            session.set_model(resolved).await;
            emitter.emit_control_response(ControlResponseEnvelope::success(request_id, serde_json::json!({}))).await;
        }
        ControlRequest::SetMaxThinkingTokens { .. } => {
            emitter.emit_control_response(ControlResponseEnvelope::success(request_id, serde_json::json!({}))).await;
        }
        ControlRequest::Interrupt => {
            session.abort().await;
            emitter.emit_control_response(ControlResponseEnvelope::success(request_id, serde_json::json!({}))).await;
        }
        ControlRequest::Unknown { subtype } => {
            emitter
                .emit_control_response(ControlResponseEnvelope::error(request_id, format!("unsupported control request subtype: {subtype}")))
                .await;
        }
    }
}

/// The fixed set of output styles this CLI recognizes, plus whatever style
/// was already configured via settings so a custom one still round-trips.
fn initialize_output_styles(current: &str) -> Vec<String> {
    let mut styles = vec!["default".to_string()];
    if !styles.iter().any(|s| s == current) {
        styles.push(current.to_string());
    }
    styles
}

/// Runs one user turn, translating the `AgentEvent` stream into the
/// stream-json envelope sequence as it happens (spec §4.1/§4.3). `Done` is
/// only ever emitted for the turn that ends without a tool call, so the
/// `assistant` envelope for every tool-calling turn is flushed proactively
/// right before its first `ToolExecuting` event, with `stop_reason` fixed to
/// `"tool_use"`; the final turn's envelope is flushed at `Done` using its
/// real stop reason. Either way the content blocks come from the assistant
/// message the runtime already appended to session history, not from
/// re-accumulating the streamed deltas ourselves.
#[allow(clippy::too_many_arguments)]
async fn run_turn(
    runtime: &AgentRuntime,
    emitter: &Emitter,
    hooks: &Arc<HookEmitter>,
    session: &Arc<Session>,
    user_message: &str,
    system_prompt: &str,
    tool_ctx: &ToolContext,
    prompt: &dyn PermissionPrompt,
    stream_output: bool,
) -> gatecode_core::Result<gatecode_core::RunResult> {
    let cancel = CancellationToken::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    if stream_output {
        emitter.emit_user_text(user_message).await;
    }

    let consumer = {
        let emitter = emitter.clone();
        let hooks = hooks.clone();
        let session = session.clone();
        let mut model = session.model().await;
        tokio::spawn(async move {
            let mut assistant_id = uuid::Uuid::new_v4().to_string();
            let mut all_tool_use_ids: Vec<String> = Vec::new();
            let mut turn_usage = WireUsage::zero();
            let mut assistant_flushed = false;

            while let Some(event) = rx.recv().await {
                match event {
                    AgentEvent::Start { model: m } => {
                        model = m;
                        assistant_id = uuid::Uuid::new_v4().to_string();
                        assistant_flushed = false;
                        if stream_output {
                            emitter
                                .emit_stream_event(StreamEventEnvelope::MessageStart {
                                    message: serde_json::json!({"id": assistant_id, "model": model}),
                                })
                                .await;
                        }
                    }
                    AgentEvent::Text(delta) => {
                        emitter
                            .emit_stream_event(StreamEventEnvelope::ContentBlockDelta {
                                index: 0,
                                delta: serde_json::json!({"type": "text_delta", "text": delta}),
                            })
                            .await;
                    }
                    AgentEvent::ToolCallStart { .. } | AgentEvent::ToolCallDelta { .. } => {}
                    AgentEvent::Usage(usage) => {
                        turn_usage = WireUsage::from_core(&usage);
                    }
                    AgentEvent::ToolExecuting { id, name } => {
                        if !assistant_flushed {
                            flush_assistant(&emitter, &session, &assistant_id, &model, "tool_use", &turn_usage, stream_output).await;
                            assistant_flushed = true;
                        }
                        if stream_output {
                            emitter.emit_progress_started(&id, &name).await;
                        }
                        for record in hooks.fire("PreToolUse", &name, &serde_json::json!({"tool_use_id": id})).await {
                            emit_hook_record(&emitter, &record, stream_output).await;
                        }
                    }
                    AgentEvent::ToolResult { id, name, result, is_error } => {
                        let hook_event = if is_error { "PostToolUseFailure" } else { "PostToolUse" };
                        for record in hooks.fire(hook_event, &name, &serde_json::json!({"tool_use_id": id, "is_error": is_error})).await {
                            emit_hook_record(&emitter, &record, stream_output).await;
                        }
                        if stream_output {
                            emitter.emit_user_tool_result(&id, &result, is_error).await;
                            emitter.emit_progress_completed(&id, &name).await;
                            all_tool_use_ids.push(id.clone());
                            emitter.emit_tool_use_summary(all_tool_use_ids.clone()).await;
                        }
                    }
                    AgentEvent::Done { stop_reason } => {
                        if !assistant_flushed {
                            flush_assistant(&emitter, &session, &assistant_id, &model, &stop_reason, &turn_usage, stream_output).await;
                        }
                    }
                    AgentEvent::Error(message) => {
                        tracing::warn!(%message, "agent stream reported an error");
                    }
                }
            }
        })
    };

    let result = runtime
        .run_stream(&session.key, user_message, Some(system_prompt), tool_ctx, prompt, tx, cancel)
        .await;
    let _ = consumer.await;
    result
}

/// Emits the `assistant` envelope once per turn, with content blocks read
/// back from the session's own history rather than re-derived from the
/// streamed deltas (the runtime appends the assistant message, tool calls
/// included, before any `ToolExecuting` event fires for that turn).
async fn flush_assistant(emitter: &Emitter, session: &Arc<Session>, id: &str, model: &str, stop_reason: &str, usage: &WireUsage, stream_output: bool) {
    if !stream_output {
        return;
    }
    emitter
        .emit_stream_event(StreamEventEnvelope::ContentBlockStop { index: 0 })
        .await;
    emitter.emit_stream_event(StreamEventEnvelope::MessageStop).await;

    let messages = session.messages().await;
    let content: Vec<ContentBlock> = match messages.last() {
        Some(last) => content_blocks_for_history_message(last),
        None => Vec::new(),
    };
    emitter.emit_assistant(id, model, stop_reason, usage.clone(), content).await;
}

async fn emit_hook_record(emitter: &Emitter, record: &gatecode_agent::HookRecord, stream_output: bool) {
    if !stream_output {
        return;
    }
    emitter.emit_hook_started(&record.hook_event, &record.callback_id, &record.tool_name).await;
    emitter
        .emit_hook_response(&record.hook_event, &record.callback_id, &record.tool_name, map_hook_outcome(record.outcome), record.output.clone())
        .await;
}

fn map_hook_outcome(outcome: gatecode_agent::HookOutcome) -> WireHookOutcome {
    match outcome {
        gatecode_agent::HookOutcome::Success => WireHookOutcome::Success,
        gatecode_agent::HookOutcome::Error => WireHookOutcome::Error,
        gatecode_agent::HookOutcome::None => WireHookOutcome::None,
    }
}

/// Maps the run's terminal state to the §7 error taxonomy's `result`
/// envelope fields and the process exit code. A budget/turn ceiling hit
/// mid-run is still `is_error: false` (spec §9's open question, resolved in
/// favor of matching the reference CLI verbatim): the run itself succeeded
/// at producing a result, it just didn't finish the conversation.
async fn finish(cli: &Cli, emitter: &Emitter, model: &str, outcome: gatecode_core::Result<gatecode_core::RunResult>) -> anyhow::Result<u8> {
    let stream_json = cli.output_format == OutputFormat::StreamJson;
    match outcome {
        Ok(run_result) => {
            let text = run_result.final_message.content.clone();
            if stream_json {
                emitter.emit_result(ResultSubtype::Success, false, &run_result, text.clone(), Vec::new(), None).await;
            } else if cli.output_format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&run_result)?);
            } else {
                println!("{text}");
            }
            Ok(0)
        }
        Err(CoreError::MaxTurnsExceeded { max_turns }) => {
            let message = format!("exceeded max_turns={max_turns}");
            if stream_json {
                emitter.emit_result(ResultSubtype::ErrorMaxTurns, false, &empty_run_result(), String::new(), Vec::new(), Some(vec![message])).await;
            } else {
                eprintln!("stopped: {message}");
            }
            Ok(0)
        }
        Err(CoreError::MaxBudgetExceeded { spent, budget }) => {
            let message = format!("spent ${spent:.4} against a ${budget:.4} budget");
            if stream_json {
                emitter
                    .emit_result(ResultSubtype::ErrorMaxBudgetUsd, false, &empty_run_result(), String::new(), Vec::new(), Some(vec![message]))
                    .await;
            } else {
                eprintln!("stopped: {message}");
            }
            Ok(0)
        }
        Err(CoreError::AuthFailed { reason }) => {
            if stream_json {
                emitter.emit_assistant_auth_failure("auth-failure", model).await;
                emitter
                    .emit_result(ResultSubtype::ErrorDuringExecution, true, &empty_run_result(), String::new(), Vec::new(), Some(vec![reason]))
                    .await;
            } else {
                eprintln!("authentication failed: {reason}");
            }
            Ok(1)
        }
        Err(CoreError::PlanModeToolAttempt { tool_name }) => {
            let denials = vec![PermissionDenial { tool_name: tool_name.clone(), reason: "plan mode forbids tool execution" }];
            if stream_json {
                emitter
                    .emit_result(
                        ResultSubtype::ErrorDuringExecution,
                        true,
                        &empty_run_result(),
                        String::new(),
                        denials,
                        Some(vec![format!("tool call to {tool_name} refused: plan mode")]),
                    )
                    .await;
            } else {
                eprintln!("refused: {tool_name} call in plan mode");
            }
            Ok(1)
        }
        Err(CoreError::ToolDenied(tool_name)) => {
            let denials = vec![PermissionDenial { tool_name: tool_name.clone(), reason: "denied by permission prompt" }];
            if stream_json {
                emitter
                    .emit_result(
                        ResultSubtype::ErrorDuringExecution,
                        true,
                        &empty_run_result(),
                        String::new(),
                        denials,
                        Some(vec![format!("tool call to {tool_name} denied")]),
                    )
                    .await;
            } else {
                eprintln!("denied: {tool_name} call");
            }
            Ok(1)
        }
        Err(other) => {
            if stream_json {
                emitter
                    .emit_result(ResultSubtype::ErrorDuringExecution, true, &empty_run_result(), String::new(), Vec::new(), Some(vec![other.to_string()]))
                    .await;
            } else {
                eprintln!("run failed: {other}");
            }
            Ok(1)
        }
    }
}

fn empty_run_result() -> gatecode_core::RunResult {
    gatecode_core::RunResult {
        history: Vec::new(),
        final_message: gatecode_core::Message::assistant(""),
        usage: gatecode_core::Usage::default(),
        model_usage: Default::default(),
        tool_events: Vec::new(),
        cost_usd: 0.0,
        num_turns: 0,
        wall_clock_ms: 0,
        api_time_ms: 0,
    }
}
