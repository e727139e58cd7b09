//! Claude-compatible layered settings (spec §6.2). Three JSON sources merge
//! low-to-high: user (`$HOME/.claude/settings.json`), project (nearest
//! ancestor of cwd containing `.git`), local (cwd itself). Grounded on
//! `agenticlaw-core::openclaw_config::OpenclawConfig::load`'s
//! forgiving-on-missing-file shape, generalized to three sources instead of
//! one and merged shallowly rather than loaded once.

use gatecode_agent::{HookCallback, HookConfig, HookMatcher};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const SETTINGS_FILENAME: &str = "settings.json";

/// Recognized keys are typed; everything else is kept in `extra` so a
/// settings file from a newer reference CLI round-trips without data loss
/// (spec §6.2: "Unknown keys are preserved verbatim for future
/// compatibility").
#[derive(Clone, Debug, Default)]
pub struct ClaudeSettings {
    pub model: Option<String>,
    pub output_style: Option<String>,
    pub enabled_plugins: std::collections::HashMap<String, bool>,
    pub hooks: HookConfig,
    pub extra: Map<String, Value>,
}

impl ClaudeSettings {
    /// Loads and merges all three sources that exist, in precedence order.
    /// A source that is missing or fails to parse is skipped rather than
    /// treated as fatal — unlike `ProviderConfig`, a broken settings layer
    /// shouldn't block a run that doesn't need it.
    pub fn discover(cwd: &Path) -> Self {
        let mut merged = Map::new();
        for path in [user_settings_path(), project_settings_path(cwd), local_settings_path(cwd)]
            .into_iter()
            .flatten()
        {
            if let Some(layer) = read_layer(&path) {
                merge_into(&mut merged, layer);
            }
        }
        Self::from_map(merged)
    }

    fn from_map(mut map: Map<String, Value>) -> Self {
        let model = map.remove("model").and_then(|v| v.as_str().map(str::to_string));
        let output_style = map
            .remove("outputStyle")
            .or_else(|| map.remove("output_style"))
            .and_then(|v| v.as_str().map(str::to_string));
        let enabled_plugins = map
            .remove("enabledPlugins")
            .and_then(|v| v.as_object().cloned())
            .map(|obj| {
                obj.into_iter()
                    .filter_map(|(k, v)| v.as_bool().map(|b| (k, b)))
                    .collect()
            })
            .unwrap_or_default();
        let hooks = map.remove("hooks").map(parse_hooks).unwrap_or_default();

        Self {
            model,
            output_style,
            enabled_plugins,
            hooks,
            extra: map,
        }
    }
}

/// Parses the Claude-compatible `hooks` block: one array of
/// `{matcher, hooks: [{type: "command", command, timeout}]}` entries per
/// event name (`PreToolUse`/`PostToolUse`/`PostToolUseFailure`).
/// Unrecognized shapes are skipped rather than treated as fatal, matching
/// `ClaudeSettings::discover`'s forgiving posture.
pub fn parse_hooks(value: Value) -> HookConfig {
    let mut config = HookConfig::new();
    let Some(events) = value.as_object() else {
        return config;
    };

    for (event, matchers) in events {
        let Some(matchers) = matchers.as_array() else {
            continue;
        };
        for (i, entry) in matchers.iter().enumerate() {
            let pattern = entry.get("matcher").and_then(Value::as_str).unwrap_or("*");
            let Some(callbacks) = entry.get("hooks").and_then(Value::as_array) else {
                continue;
            };
            let mut matcher = HookMatcher::new(pattern, Vec::new());
            let mut parsed_callbacks = Vec::new();
            for (j, callback) in callbacks.iter().enumerate() {
                let Some(command) = callback.get("command").and_then(Value::as_str) else {
                    continue;
                };
                parsed_callbacks.push(HookCallback {
                    id: format!("{event}-{i}-{j}"),
                    command: command.to_string(),
                });
                if let Some(timeout) = callback.get("timeout").and_then(Value::as_u64) {
                    matcher = matcher.with_timeout_secs(timeout);
                }
            }
            matcher.callbacks = parsed_callbacks;
            config = config.on(event.clone(), matcher);
        }
    }
    config
}

fn read_layer(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&raw).ok()?;
    value.as_object().cloned()
}

/// Later keys win a shallow merge — nested objects are replaced wholesale,
/// not deep-merged, matching the source's own "settings are a flat bag of
/// recognized keys plus passthrough" model.
fn merge_into(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        base.insert(key, value);
    }
}

fn user_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude").join(SETTINGS_FILENAME))
}

/// Walks upward from `cwd` looking for the nearest ancestor containing
/// `.git`, mirroring the walk `agenticlaw-core::openclaw_config::load_bootstrap_files`
/// does for project-local markdown files.
fn project_settings_path(cwd: &Path) -> Option<PathBuf> {
    let mut dir = Some(cwd);
    while let Some(d) = dir {
        if d.join(".git").exists() {
            return Some(d.join(".claude").join(SETTINGS_FILENAME));
        }
        dir = d.parent();
    }
    None
}

fn local_settings_path(cwd: &Path) -> Option<PathBuf> {
    Some(cwd.join(".claude").join(SETTINGS_FILENAME))
}
