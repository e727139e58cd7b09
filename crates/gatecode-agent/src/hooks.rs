//! Hook Emitter (spec C7): runs operator-configured shell callbacks around
//! tool invocation (`PreToolUse`, `PostToolUse`, `PostToolUseFailure`) and
//! reports one start/finish pair per matching callback. Grounded on
//! `gatecode_tools::tools::bash::BashTool`'s cancellable-process pattern —
//! a hook callback is a `tokio::process::Command` raced against a timeout,
//! just without the interrupt channel a running tool call has.

use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 60;

/// A single matcher entry: a tool-name pattern (alternation `a|b|c` or a
/// full regex) fanning out to one or more callback commands.
#[derive(Clone, Debug)]
pub struct HookMatcher {
    pub pattern: String,
    pub callbacks: Vec<HookCallback>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct HookCallback {
    pub id: String,
    pub command: String,
}

impl HookMatcher {
    pub fn new(pattern: impl Into<String>, callbacks: Vec<HookCallback>) -> Self {
        Self {
            pattern: pattern.into(),
            callbacks,
            timeout_secs: DEFAULT_HOOK_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// A bare `a|b|c` pattern matches any of the listed tool names exactly;
    /// anything containing regex metacharacters beyond `|` is compiled as a
    /// full regex and must match the whole tool name.
    pub fn matches(&self, tool_name: &str) -> bool {
        if self.pattern == "*" || self.pattern.is_empty() {
            return true;
        }
        if self.pattern.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '|') {
            return self.pattern.split('|').any(|alt| alt == tool_name);
        }
        match regex::Regex::new(&format!("^(?:{})$", self.pattern)) {
            Ok(re) => re.is_match(tool_name),
            Err(_) => false,
        }
    }
}

/// Per-event matcher lists, keyed by hook event name
/// (`PreToolUse`/`PostToolUse`/`PostToolUseFailure`).
#[derive(Clone, Debug, Default)]
pub struct HookConfig {
    events: std::collections::HashMap<String, Vec<HookMatcher>>,
}

impl HookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, event: impl Into<String>, matcher: HookMatcher) -> Self {
        self.events.entry(event.into()).or_default().push(matcher);
        self
    }

    fn matchers_for(&self, event: &str, tool_name: &str) -> Vec<&HookMatcher> {
        self.events
            .get(event)
            .map(|matchers| matchers.iter().filter(|m| m.matches(tool_name)).collect())
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookOutcome {
    Success,
    Error,
    /// No hook matched, or the hook process produced no verdict.
    None,
}

#[derive(Clone, Debug)]
pub struct HookRecord {
    pub hook_event: String,
    pub callback_id: String,
    pub tool_name: String,
    pub outcome: HookOutcome,
    pub output: Option<String>,
}

pub struct HookEmitter {
    config: HookConfig,
}

impl HookEmitter {
    pub fn new(config: HookConfig) -> Self {
        Self { config }
    }

    /// Runs every callback matching `event`/`tool_name`, in declaration
    /// order, and returns one record per callback. An empty vec means no
    /// hook matched — the CLI driver should emit nothing for that case.
    pub async fn fire(&self, event: &str, tool_name: &str, payload: &Value) -> Vec<HookRecord> {
        let matchers = self.config.matchers_for(event, tool_name);
        let mut records = Vec::new();
        for matcher in matchers {
            for callback in &matcher.callbacks {
                let record = run_callback(event, tool_name, callback, matcher.timeout_secs, payload).await;
                records.push(record);
            }
        }
        records
    }
}

async fn run_callback(event: &str, tool_name: &str, callback: &HookCallback, timeout_secs: u64, payload: &Value) -> HookRecord {
    let payload_json = payload.to_string();

    let spawn = Command::new("bash")
        .arg("-c")
        .arg(&callback.command)
        .env("GATECODE_HOOK_EVENT", event)
        .env("GATECODE_TOOL_NAME", tool_name)
        .env("GATECODE_HOOK_PAYLOAD", &payload_json)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(Duration::from_secs(timeout_secs), spawn).await {
        Ok(Ok(output)) => {
            let outcome = if output.status.success() { HookOutcome::Success } else { HookOutcome::Error };
            let combined = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            HookRecord {
                hook_event: event.to_string(),
                callback_id: callback.id.clone(),
                tool_name: tool_name.to_string(),
                outcome,
                output: if combined.is_empty() { None } else { Some(combined) },
            }
        }
        Ok(Err(e)) => HookRecord {
            hook_event: event.to_string(),
            callback_id: callback.id.clone(),
            tool_name: tool_name.to_string(),
            outcome: HookOutcome::Error,
            output: Some(format!("failed to spawn hook: {e}")),
        },
        Err(_) => HookRecord {
            hook_event: event.to_string(),
            callback_id: callback.id.clone(),
            tool_name: tool_name.to_string(),
            outcome: HookOutcome::Error,
            output: Some(format!("hook timed out after {timeout_secs}s")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alternation_matcher_matches_exact_names_only() {
        let matcher = HookMatcher::new("Bash|Write", vec![]);
        assert!(matcher.matches("Bash"));
        assert!(matcher.matches("Write"));
        assert!(!matcher.matches("Read"));
        assert!(!matcher.matches("Bash2"));
    }

    #[test]
    fn wildcard_matcher_matches_everything() {
        let matcher = HookMatcher::new("*", vec![]);
        assert!(matcher.matches("AnyTool"));
    }

    #[test]
    fn regex_matcher_is_anchored() {
        let matcher = HookMatcher::new("Bash.*", vec![]);
        assert!(matcher.matches("BashTool"));
        assert!(!matcher.matches("NotBashTool"));
    }

    #[tokio::test]
    async fn fire_runs_one_record_per_callback_on_match() {
        let config = HookConfig::new().on(
            "PreToolUse",
            HookMatcher::new(
                "Bash",
                vec![
                    HookCallback {
                        id: "cb1".to_string(),
                        command: "exit 0".to_string(),
                    },
                    HookCallback {
                        id: "cb2".to_string(),
                        command: "exit 1".to_string(),
                    },
                ],
            ),
        );
        let emitter = HookEmitter::new(config);
        let records = emitter.fire("PreToolUse", "Bash", &json!({"command": "ls"})).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome, HookOutcome::Success);
        assert_eq!(records[1].outcome, HookOutcome::Error);
    }

    #[tokio::test]
    async fn fire_returns_empty_when_nothing_matches() {
        let config = HookConfig::new().on("PreToolUse", HookMatcher::new("Write", vec![HookCallback { id: "cb".to_string(), command: "exit 0".to_string() }]));
        let emitter = HookEmitter::new(config);
        let records = emitter.fire("PreToolUse", "Bash", &json!({})).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn hook_output_is_captured() {
        let config = HookConfig::new().on(
            "PostToolUse",
            HookMatcher::new("Bash", vec![HookCallback { id: "cb".to_string(), command: "echo hi".to_string() }]),
        );
        let emitter = HookEmitter::new(config);
        let records = emitter.fire("PostToolUse", "Bash", &json!({})).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].output.as_deref(), Some("hi\n"));
    }
}
