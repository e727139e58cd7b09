//! CLI surface (spec §6.5), grounded on the teacher's `Cli` struct pattern
//! (`agenticlaw-consciousness/src/main.rs`, `agentiagency-agenticlaw/src/main.rs`):
//! a flat `clap::Parser` derive plus a post-parse validation pass for flag
//! combinations `clap`'s own `requires`/`conflicts_with` can't express across
//! this many interacting options.

use clap::{Parser, ValueEnum};
use gatecode_core::PermissionMode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum InputFormat {
    #[default]
    Text,
    StreamJson,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    StreamJson,
}

#[derive(Parser, Debug)]
#[command(name = "gatecode", about = "Agentic coding-assistant CLI front end")]
pub struct Cli {
    /// The user's prompt. Read from stdin instead if omitted.
    pub prompt: Option<String>,

    /// Non-interactive single-shot mode.
    #[arg(short, long)]
    pub print: bool,

    #[arg(long, value_enum, default_value_t = InputFormat::Text)]
    pub input_format: InputFormat,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Emit `stream_event` partial-message envelopes as the model streams.
    #[arg(long)]
    pub include_partial_messages: bool,

    /// Echo `user` envelopes (live and, on resume, replayed) to the output.
    #[arg(long)]
    pub replay_user_messages: bool,

    /// Required alongside `--output-format=stream-json`.
    #[arg(long)]
    pub verbose: bool,

    /// Resume the most recently used session for this working directory.
    #[arg(long)]
    pub r#continue: bool,

    /// Resume a specific session. Bare `--resume` with no value opens the
    /// picker (spec §6.5: "`--resume [id|picker]`"); the picker itself is a
    /// UI concern out of scope here, so the driver just resumes the most
    /// recent session in that case.
    #[arg(long, num_args = 0..=1, default_missing_value = "picker")]
    pub resume: Option<String>,

    /// Assigns a specific id to a newly created session, or selects which
    /// existing session `--fork-session` forks.
    #[arg(long)]
    pub session_id: Option<String>,

    /// Clone the resumed/continued session into a new one instead of
    /// appending to it in place.
    #[arg(long)]
    pub fork_session: bool,

    #[arg(long, value_parser = parse_permission_mode)]
    pub permission_mode: Option<PermissionMode>,

    /// Shorthand for `--permission-mode=bypassPermissions`; refused unless
    /// `--allow-dangerously-skip-permissions` is also set.
    #[arg(long)]
    pub dangerously_skip_permissions: bool,

    #[arg(long)]
    pub allow_dangerously_skip_permissions: bool,

    /// Exactly this set of tools, comma- or space-separated. Overrides the
    /// default registry entirely.
    #[arg(long, value_delimiter = ',')]
    pub tools: Vec<String>,

    /// Adds to the default tool set.
    #[arg(long = "allowedTools", value_delimiter = ',')]
    pub allowed_tools: Vec<String>,

    /// Removes from the default tool set.
    #[arg(long = "disallowedTools", value_delimiter = ',')]
    pub disallowed_tools: Vec<String>,

    #[arg(long)]
    pub max_turns: Option<usize>,

    #[arg(long)]
    pub max_budget_usd: Option<f64>,

    #[arg(long)]
    pub fallback_model: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    /// Path to the provider config (spec §6.1). Defaults to
    /// `$HOME/.gatecode/provider.json`.
    #[arg(long)]
    pub provider_config: Option<String>,
}

fn parse_permission_mode(s: &str) -> Result<PermissionMode, String> {
    PermissionMode::parse(s).ok_or_else(|| format!("unrecognized permission mode: {s}"))
}

/// A flag combination the reference CLI rejects outright (spec §6.5/§7:
/// "Configuration ... conflicting flags, unsupported flag combinations").
#[derive(Debug, thiserror::Error)]
pub enum CliValidationError {
    #[error("--input-format=stream-json requires --print")]
    StreamJsonInputRequiresPrint,
    #[error("--output-format=stream-json requires --print and --verbose")]
    StreamJsonOutputRequiresPrintAndVerbose,
    #[error("--include-partial-messages requires --print and --output-format=stream-json")]
    PartialMessagesRequireStreamJsonOutput,
    #[error("--replay-user-messages requires both --input-format and --output-format to be stream-json")]
    ReplayRequiresStreamJsonBothWays,
    #[error("--session-id combined with --resume/--continue requires --fork-session")]
    SessionIdWithResumeRequiresFork,
    #[error("--dangerously-skip-permissions requires --allow-dangerously-skip-permissions")]
    SkipPermissionsNotAllowed,
}

impl Cli {
    /// Flag-combination checks the derive macro itself can't express (they
    /// span more than two flags, or depend on an enum's specific variant).
    /// Called once, before anything else runs — a failure here means no
    /// envelopes are ever emitted (spec §7).
    pub fn validate(&self) -> Result<(), CliValidationError> {
        if self.input_format == InputFormat::StreamJson && !self.print {
            return Err(CliValidationError::StreamJsonInputRequiresPrint);
        }
        if self.output_format == OutputFormat::StreamJson && !(self.print && self.verbose) {
            return Err(CliValidationError::StreamJsonOutputRequiresPrintAndVerbose);
        }
        if self.include_partial_messages
            && !(self.print && self.output_format == OutputFormat::StreamJson)
        {
            return Err(CliValidationError::PartialMessagesRequireStreamJsonOutput);
        }
        if self.replay_user_messages
            && !(self.input_format == InputFormat::StreamJson && self.output_format == OutputFormat::StreamJson)
        {
            return Err(CliValidationError::ReplayRequiresStreamJsonBothWays);
        }
        if self.session_id.is_some() && (self.resume.is_some() || self.r#continue) && !self.fork_session {
            return Err(CliValidationError::SessionIdWithResumeRequiresFork);
        }
        if self.dangerously_skip_permissions && !self.allow_dangerously_skip_permissions {
            return Err(CliValidationError::SkipPermissionsNotAllowed);
        }
        Ok(())
    }

    pub fn resolved_permission_mode(&self) -> PermissionMode {
        if self.dangerously_skip_permissions {
            PermissionMode::Bypass
        } else {
            self.permission_mode.unwrap_or_default()
        }
    }
}

/// Splits a comma-or-space-separated tool list (spec §6.5) into trimmed,
/// non-empty names. `clap`'s `value_delimiter` already handles the comma
/// case; this covers a single arg value containing spaces instead
/// (`--tools "Read Write"`).
pub fn split_tool_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split_whitespace())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .collect()
}
