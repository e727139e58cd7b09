//! Reconstructs a complete assistant message from a sequence of streaming
//! deltas, keyed by the stable per-choice tool-call index (spec §4.2).

use crate::types::{AccumulatedToolCall, StreamDelta, Usage};
use std::collections::HashMap;

/// The reassembled result of one streamed completion.
#[derive(Clone, Debug, Default)]
pub struct CompletionOutcome {
    pub text: String,
    pub tool_calls: Vec<AccumulatedToolCall>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Folds a sequence of `StreamDelta` into a `CompletionOutcome`. Tool-call
/// deltas key on index rather than id (the id itself may be split across
/// chunks for some gateways), but the finalized order follows the order
/// indices were first observed, not numeric index order.
#[derive(Default)]
pub struct DeltaAccumulator {
    text: String,
    calls: HashMap<u32, AccumulatedToolCall>,
    call_order: Vec<u32>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    error: Option<String>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, delta: StreamDelta) {
        match delta {
            StreamDelta::Text(text) => self.text.push_str(&text),
            StreamDelta::ToolCallStart { index, id, name } => {
                let call_order = &mut self.call_order;
                let call = self.calls.entry(index).or_insert_with(|| {
                    call_order.push(index);
                    AccumulatedToolCall {
                        index,
                        ..Default::default()
                    }
                });
                if !id.is_empty() {
                    call.id = id;
                }
                if !name.is_empty() {
                    call.name = name;
                }
            }
            StreamDelta::ToolCallDelta { index, arguments } => {
                let call_order = &mut self.call_order;
                let call = self.calls.entry(index).or_insert_with(|| {
                    call_order.push(index);
                    AccumulatedToolCall {
                        index,
                        ..Default::default()
                    }
                });
                call.arguments.push_str(&arguments);
            }
            StreamDelta::Done {
                finish_reason,
                usage,
            } => {
                self.finish_reason = finish_reason;
                if usage.is_some() {
                    self.usage = usage;
                }
            }
            StreamDelta::Error(message) => self.error = Some(message),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn finish(mut self) -> CompletionOutcome {
        let tool_calls = self
            .call_order
            .into_iter()
            .filter_map(|index| self.calls.remove(&index))
            .collect();
        CompletionOutcome {
            text: self.text,
            tool_calls,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_deltas_concatenate_in_order() {
        let mut acc = DeltaAccumulator::new();
        acc.apply(StreamDelta::Text("Hel".into()));
        acc.apply(StreamDelta::Text("lo".into()));
        let outcome = acc.finish();
        assert_eq!(outcome.text, "Hello");
    }

    #[test]
    fn tool_call_deltas_accumulate_by_first_observed_order_not_index() {
        let mut acc = DeltaAccumulator::new();
        acc.apply(StreamDelta::ToolCallStart {
            index: 1,
            id: "call_b".into(),
            name: "Grep".into(),
        });
        acc.apply(StreamDelta::ToolCallStart {
            index: 0,
            id: "call_a".into(),
            name: "Read".into(),
        });
        acc.apply(StreamDelta::ToolCallDelta {
            index: 0,
            arguments: r#"{"path":"#.into(),
        });
        acc.apply(StreamDelta::ToolCallDelta {
            index: 0,
            arguments: r#""a.txt"}"#.into(),
        });
        acc.apply(StreamDelta::ToolCallDelta {
            index: 1,
            arguments: r#"{"pattern":"foo"}"#.into(),
        });
        let outcome = acc.finish();
        assert_eq!(outcome.tool_calls.len(), 2);
        // index 1 was observed first via ToolCallStart, so it comes first
        // even though its numeric index is higher than index 0's.
        assert_eq!(outcome.tool_calls[0].id, "call_b");
        assert_eq!(outcome.tool_calls[0].name, "Grep");
        assert_eq!(outcome.tool_calls[0].arguments, r#"{"pattern":"foo"}"#);
        assert_eq!(outcome.tool_calls[1].id, "call_a");
        assert_eq!(outcome.tool_calls[1].arguments, r#"{"path":"a.txt"}"#);
    }

    #[test]
    fn done_carries_finish_reason_and_usage() {
        let mut acc = DeltaAccumulator::new();
        acc.apply(StreamDelta::Text("ok".into()));
        acc.apply(StreamDelta::Done {
            finish_reason: Some("stop".into()),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 2,
            }),
        });
        let outcome = acc.finish();
        assert_eq!(outcome.finish_reason.as_deref(), Some("stop"));
        assert_eq!(outcome.usage.unwrap().completion_tokens, 2);
    }
}
