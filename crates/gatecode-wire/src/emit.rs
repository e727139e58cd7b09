//! Stream-JSON Emitter (spec §4.3): turns run state into the reference's
//! stream-json envelope sequence and writes each envelope through a shared
//! [`LineSink`]. Ordering (spec): init precedes everything, result is last;
//! between them, optionally auth_status, then replayed user lines, then the
//! turn events; for one streamed response, partials (if enabled) → final
//! `assistant` → zero or more `user` tool-result wrappings + `progress` +
//! `tool_use_summary` per tool call.

use crate::envelope::*;
use crate::sink::{emit_envelope, LineSink};
use gatecode_core::{Message, RunResult};
use std::sync::Arc;

/// Generates the per-envelope `uuid` field. A thin wrapper so tests can
/// swap in a deterministic generator without reaching into `uuid` directly.
pub trait UuidSource: Send + Sync {
    fn next(&self) -> String;
}

pub struct RandomUuid;

impl UuidSource for RandomUuid {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[derive(Clone)]
pub struct Emitter {
    sink: Arc<dyn LineSink>,
    uuids: Arc<dyn UuidSource>,
    session_id: String,
    partials_enabled: bool,
}

impl Emitter {
    pub fn new(sink: Arc<dyn LineSink>, session_id: impl Into<String>, partials_enabled: bool) -> Self {
        Self {
            sink,
            uuids: Arc::new(RandomUuid),
            session_id: session_id.into(),
            partials_enabled,
        }
    }

    pub fn with_uuid_source(mut self, uuids: Arc<dyn UuidSource>) -> Self {
        self.uuids = uuids;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn partials_enabled(&self) -> bool {
        self.partials_enabled
    }

    fn uuid(&self) -> String {
        self.uuids.next()
    }

    /// Exactly once, first (spec §4.3).
    pub async fn emit_system_init(&self, cwd: &str, model: &str, permission_mode: &str, tools: Vec<String>) {
        let env = SystemInitEnvelope::new(cwd, &self.session_id, model, permission_mode, tools, self.uuid());
        emit_envelope(&self.sink, &env).await;
    }

    pub async fn emit_auth_status(&self, authenticated: bool) {
        let env = AuthStatusEnvelope {
            kind: "auth_status",
            subtype: if authenticated { "authenticated" } else { "unauthenticated" },
            authenticated,
        };
        emit_envelope(&self.sink, &env).await;
    }

    /// One per incremental frame while `--include-partial-messages` is set
    /// (spec: "partials"). A no-op if partials are disabled so callers don't
    /// need to branch at every call site.
    pub async fn emit_stream_event(&self, event: StreamEventEnvelope) {
        if !self.partials_enabled {
            return;
        }
        let env = StreamEventWrapper {
            kind: "stream_event",
            event,
            session_id: self.session_id.clone(),
            uuid: self.uuid(),
        };
        emit_envelope(&self.sink, &env).await;
    }

    /// Always emitted at the end of a streaming response, even with partials
    /// disabled (spec §4.3).
    pub async fn emit_assistant(&self, id: &str, model: &str, stop_reason: &str, usage: WireUsage, content: Vec<ContentBlock>) {
        let message = AssistantMessageBody::new(id, model, stop_reason, usage, content);
        let env = AssistantEnvelope::new(message, &self.session_id, self.uuid());
        emit_envelope(&self.sink, &env).await;
    }

    /// The synthetic authentication-failure assistant envelope (spec §7/S5).
    pub async fn emit_assistant_auth_failure(&self, id: &str, model: &str) {
        let message = AssistantMessageBody::new(
            id,
            model,
            "end_turn",
            WireUsage::zero(),
            vec![ContentBlock::Text {
                text: "Invalid API key \u{b7} Please run /login".to_string(),
            }],
        );
        let env = AssistantEnvelope::new(message, &self.session_id, self.uuid()).with_error("authentication_failed");
        emit_envelope(&self.sink, &env).await;
    }

    pub async fn emit_user_text(&self, text: &str) -> String {
        let uuid = self.uuid();
        let env = UserEnvelope::text(text, &self.session_id, &uuid);
        emit_envelope(&self.sink, &env).await;
        uuid
    }

    pub async fn emit_user_tool_result(&self, tool_use_id: &str, content: &str, is_error: bool) {
        let env = UserEnvelope::tool_result(tool_use_id, content, is_error, &self.session_id, self.uuid());
        emit_envelope(&self.sink, &env).await;
    }

    pub async fn emit_progress_started(&self, tool_use_id: &str, tool_name: &str) {
        emit_envelope(&self.sink, &ProgressEnvelope::started(tool_use_id, tool_name)).await;
    }

    pub async fn emit_progress_completed(&self, tool_use_id: &str, tool_name: &str) {
        emit_envelope(&self.sink, &ProgressEnvelope::completed(tool_use_id, tool_name)).await;
    }

    /// One per completed tool call, listing all preceding tool-use ids in
    /// order (spec §4.3).
    pub async fn emit_tool_use_summary(&self, preceding_tool_use_ids: Vec<String>) {
        let env = ToolUseSummaryEnvelope {
            kind: "tool_use_summary",
            preceding_tool_use_ids,
        };
        emit_envelope(&self.sink, &env).await;
    }

    pub async fn emit_control_response(&self, env: ControlResponseEnvelope) {
        emit_envelope(&self.sink, &env).await;
    }

    /// Follows a `set_permission_mode` control response (spec §4.4).
    pub async fn emit_system_status(&self, permission_mode: &str) {
        emit_envelope(&self.sink, &SystemStatusEnvelope::new(permission_mode)).await;
    }

    pub async fn emit_hook_started(&self, hook_event: &str, callback_id: &str, tool_name: &str) {
        let env = HookStartedEnvelope {
            kind: "system",
            subtype: "hook_started",
            hook_event: hook_event.to_string(),
            callback_id: callback_id.to_string(),
            tool_name: tool_name.to_string(),
        };
        emit_envelope(&self.sink, &env).await;
    }

    pub async fn emit_hook_progress(&self, hook_event: &str, callback_id: &str, message: &str) {
        let env = HookProgressEnvelope {
            kind: "system",
            subtype: "hook_progress",
            hook_event: hook_event.to_string(),
            callback_id: callback_id.to_string(),
            message: message.to_string(),
        };
        emit_envelope(&self.sink, &env).await;
    }

    pub async fn emit_hook_response(&self, hook_event: &str, callback_id: &str, tool_name: &str, outcome: HookOutcome, output: Option<String>) {
        let env = HookResponseEnvelope {
            kind: "system",
            subtype: "hook_response",
            hook_event: hook_event.to_string(),
            callback_id: callback_id.to_string(),
            tool_name: tool_name.to_string(),
            outcome,
            output,
        };
        emit_envelope(&self.sink, &env).await;
    }

    pub async fn emit_keep_alive(&self) {
        emit_envelope(&self.sink, &KeepAliveEnvelope::default()).await;
    }

    /// Exactly once, last (spec §4.3).
    #[allow(clippy::too_many_arguments)]
    pub async fn emit_result(
        &self,
        subtype: ResultSubtype,
        is_error: bool,
        run_result: &RunResult,
        result_text: String,
        permission_denials: Vec<PermissionDenial>,
        errors: Option<Vec<String>>,
    ) {
        let model_usage = run_result
            .model_usage
            .iter()
            .map(|(model, usage)| (model.clone(), WireUsage::from_core(usage)))
            .collect();

        let env = ResultEnvelope {
            kind: "result",
            subtype,
            is_error,
            duration_ms: run_result.wall_clock_ms,
            duration_api_ms: run_result.api_time_ms,
            num_turns: run_result.num_turns,
            result: result_text,
            session_id: self.session_id.clone(),
            total_cost_usd: run_result.cost_usd,
            usage: WireUsage::from_core(&run_result.usage),
            model_usage,
            permission_denials,
            uuid: self.uuid(),
            errors,
        };
        emit_envelope(&self.sink, &env).await;
    }
}

/// Builds the `assistant` envelope's content blocks from an already-appended
/// history message — the emitter's one integration point with `gatecode_core`
/// message shapes (spec §4.1 ties content-block ordering to tool-call
/// discovery order, §4.3 restates it: text block first, then tool-use blocks
/// in index order).
pub fn content_blocks_for_history_message(message: &Message) -> Vec<ContentBlock> {
    content_blocks_for(message)
}
