//! gatecode-llm — OpenAI-compatible chat-completions client (spec §4.2).
//!
//! Talks to any OpenAI-compatible gateway: a blocking path for a single
//! completion and a streaming path that parses `text/event-stream` frames
//! into delta events, plus the accumulator that reconstructs a complete
//! assistant message from a sequence of deltas.

pub mod accumulator;
pub mod openai;
pub mod provider;
pub mod types;

pub use accumulator::DeltaAccumulator;
pub use openai::OpenAiProvider;
pub use provider::{LlmError, LlmProvider, LlmResult, LlmStream};
pub use types::*;
