//! Context window management with token counting (spec §4.1).

use gatecode_core::Message as CoreMessage;
use gatecode_llm::LlmMessage;

const CHARS_PER_TOKEN: f32 = 4.0;

pub struct ContextManager {
    max_tokens: usize,
    system_tokens: usize,
}

impl ContextManager {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            system_tokens: 0,
        }
    }

    pub fn estimate_tokens(text: &str) -> usize {
        (text.len() as f32 / CHARS_PER_TOKEN).ceil() as usize
    }

    pub fn message_tokens(message: &LlmMessage) -> usize {
        let content_tokens = message
            .content
            .as_deref()
            .map(Self::estimate_tokens)
            .unwrap_or(0);
        let tool_call_tokens: usize = message
            .tool_calls
            .as_ref()
            .map(|calls| {
                calls
                    .iter()
                    .map(|c| {
                        Self::estimate_tokens(&c.function.name)
                            + Self::estimate_tokens(&c.function.arguments)
                    })
                    .sum()
            })
            .unwrap_or(0);
        content_tokens + tool_call_tokens + 10
    }

    /// Token estimate for a persisted session message, used by `Session`
    /// bookkeeping where converting the whole history to the LLM wire shape
    /// just to count tokens would be wasteful.
    pub fn core_message_tokens(message: &CoreMessage) -> usize {
        let content_tokens = Self::estimate_tokens(&message.content);
        let tool_call_tokens: usize = message
            .tool_calls
            .as_ref()
            .map(|calls| {
                calls
                    .iter()
                    .map(|c| Self::estimate_tokens(&c.name) + Self::estimate_tokens(&c.arguments))
                    .sum()
            })
            .unwrap_or(0);
        content_tokens + tool_call_tokens + 10
    }

    pub fn calculate_core_total(&self, messages: &[CoreMessage]) -> usize {
        let message_tokens: usize = messages.iter().map(Self::core_message_tokens).sum();
        self.system_tokens + message_tokens
    }

    pub fn set_system(&mut self, system: &str) {
        self.system_tokens = Self::estimate_tokens(system);
    }

    pub fn calculate_total(&self, messages: &[LlmMessage]) -> usize {
        let message_tokens: usize = messages.iter().map(Self::message_tokens).sum();
        self.system_tokens + message_tokens
    }

    /// Drops the oldest non-pinned messages (keeps index 0, the first
    /// message in history) until under 75% of the configured budget.
    pub fn compact(&self, messages: &mut Vec<LlmMessage>) {
        if messages.is_empty() {
            return;
        }
        let total = self.calculate_total(messages);
        if total <= self.max_tokens {
            return;
        }
        let target = (self.max_tokens as f32 * 0.75) as usize;
        while messages.len() > 2 && self.calculate_total(messages) > target {
            messages.remove(1);
        }
        tracing::info!(
            "Compacted context: {} messages, ~{} tokens",
            messages.len(),
            self.calculate_total(messages)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimation() {
        assert_eq!(ContextManager::estimate_tokens("hello"), 2);
        assert_eq!(ContextManager::estimate_tokens("hello world"), 3);
    }

    #[test]
    fn compact_drops_oldest_messages_under_pressure() {
        let mgr = ContextManager::new(20);
        let mut messages = vec![
            LlmMessage::system("sys"),
            LlmMessage::user("a".repeat(100)),
            LlmMessage::user("b".repeat(100)),
            LlmMessage::user("recent"),
        ];
        mgr.compact(&mut messages);
        assert!(messages.len() < 4);
        assert_eq!(messages.last().unwrap().content.as_deref(), Some("recent"));
    }

    #[test]
    fn core_message_tokens_counts_content_and_tool_calls() {
        let plain = CoreMessage::user("hello");
        let with_tools = CoreMessage::assistant_with_tools(
            "",
            vec![gatecode_core::ToolCall {
                id: "c1".into(),
                name: "Bash".into(),
                arguments: "{\"command\":\"ls\"}".into(),
            }],
        );
        assert!(ContextManager::core_message_tokens(&with_tools) > ContextManager::core_message_tokens(&plain));
    }
}
