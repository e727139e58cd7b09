//! Permission modes governing whether a tool call needs a user prompt.

use serde::{Deserialize, Serialize};

/// Determines whether a tool invocation requires a per-call prompt.
/// `Plan` forbids tool execution entirely (spec §3, §4.1).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    DontAsk,
    Delegate,
    Bypass,
    Plan,
}

impl PermissionMode {
    /// Parses the CLI/control-request string form. Unknown strings fail,
    /// matching spec §4.4's `set_permission_mode` validation contract.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "acceptEdits" | "accept-edits" => Some(Self::AcceptEdits),
            "dontAsk" | "dont-ask" => Some(Self::DontAsk),
            "delegate" => Some(Self::Delegate),
            "bypassPermissions" | "bypass" => Some(Self::Bypass),
            "plan" => Some(Self::Plan),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::DontAsk => "dontAsk",
            Self::Delegate => "delegate",
            Self::Bypass => "bypassPermissions",
            Self::Plan => "plan",
        }
    }

    /// Whether this mode forbids any tool execution (spec §4.1).
    pub fn forbids_tools(&self) -> bool {
        matches!(self, Self::Plan)
    }

    /// Whether a tool call under this mode requires a synchronous prompt,
    /// given whether the tool itself is read-only.
    pub fn requires_prompt(&self, tool_is_read_only: bool) -> bool {
        match self {
            Self::Plan => false, // execution is refused outright, not prompted
            Self::Bypass | Self::DontAsk => false,
            Self::AcceptEdits => !tool_is_read_only,
            Self::Delegate => false,
            Self::Default => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_mode_forbids_tools() {
        assert!(PermissionMode::Plan.forbids_tools());
        assert!(!PermissionMode::Default.forbids_tools());
    }

    #[test]
    fn parse_roundtrips_known_modes() {
        for mode in [
            PermissionMode::Default,
            PermissionMode::AcceptEdits,
            PermissionMode::DontAsk,
            PermissionMode::Delegate,
            PermissionMode::Bypass,
            PermissionMode::Plan,
        ] {
            assert_eq!(PermissionMode::parse(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        assert_eq!(PermissionMode::parse("whatever"), None);
    }

    #[test]
    fn default_mode_requires_prompt_for_any_tool() {
        assert!(PermissionMode::Default.requires_prompt(true));
        assert!(PermissionMode::Default.requires_prompt(false));
    }

    #[test]
    fn accept_edits_only_prompts_for_mutating_tools() {
        assert!(!PermissionMode::AcceptEdits.requires_prompt(true));
        assert!(PermissionMode::AcceptEdits.requires_prompt(false));
    }
}
