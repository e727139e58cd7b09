//! Stream-json wire protocol: envelope types, the emitter that sequences
//! them, the input processor that parses incoming lines, and the
//! recorder/replay log used across resumed sessions.

pub mod emit;
pub mod envelope;
pub mod input;
pub mod recorder;
pub mod sink;

pub use emit::{content_blocks_for_history_message, Emitter, RandomUuid, UuidSource};
pub use envelope::*;
pub use input::{parse_line, ControlRequest, InputEnvelope};
pub use recorder::{replay, RecordingSink};
pub use sink::{emit_envelope, to_line, LineSink, MemorySink, WriterSink};
