//! Recorder/Replay (spec C9): wraps an output sink and persists only the
//! envelope kinds a resumed session needs to reconstruct its visible
//! transcript — `user` and `user_message` — so replaying a session doesn't
//! re-run tool calls or re-spend budget, just re-prints what the user saw.

use crate::sink::LineSink;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A sink decorator that mirrors every line it's asked to record into an
/// append-only buffer, while still forwarding every line (recorded or not)
/// to the wrapped sink.
pub struct RecordingSink {
    inner: Arc<dyn LineSink>,
    recorded: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new(inner: Arc<dyn LineSink>) -> Self {
        Self {
            inner,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Write `line` through to the underlying sink, additionally persisting it
    /// if its envelope `"type"` is one of the replay-worthy kinds.
    pub async fn write_and_maybe_record(&self, line: &str) {
        self.inner.write_line(line).await;
        if should_persist(line) {
            self.recorded.lock().await.push(line.to_string());
        }
    }

    pub async fn recorded_lines(&self) -> Vec<String> {
        self.recorded.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl LineSink for RecordingSink {
    async fn write_line(&self, line: &str) {
        self.write_and_maybe_record(line).await;
    }
}

fn should_persist(line: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) => matches!(value.get("type").and_then(|t| t.as_str()), Some("user") | Some("user_message")),
        Err(_) => false,
    }
}

/// Replays previously recorded lines verbatim through `sink`, without
/// re-persisting them — used when resuming a session so the client sees the
/// prior turns again but the recorder's own log isn't duplicated.
pub async fn replay(sink: &Arc<dyn LineSink>, lines: &[String]) {
    for line in lines {
        sink.write_line(line).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[tokio::test]
    async fn only_user_envelopes_are_recorded() {
        let memory = Arc::new(MemorySink::new());
        let recorder = RecordingSink::new(memory.clone());
        recorder.write_and_maybe_record(r#"{"type":"user","message":{}}"#).await;
        recorder.write_and_maybe_record(r#"{"type":"progress","status":"started"}"#).await;
        recorder.write_and_maybe_record(r#"{"type":"user_message","message":{}}"#).await;
        recorder.write_and_maybe_record(r#"{"type":"result","subtype":"success"}"#).await;

        let recorded = recorder.recorded_lines().await;
        assert_eq!(recorded.len(), 2);
        assert!(recorded[0].contains("\"type\":\"user\""));
        assert!(recorded[1].contains("\"type\":\"user_message\""));

        // every line still reaches the underlying sink regardless of recording
        assert_eq!(memory.snapshot().await.len(), 4);
    }

    #[tokio::test]
    async fn malformed_lines_are_forwarded_but_not_recorded() {
        let memory = Arc::new(MemorySink::new());
        let recorder = RecordingSink::new(memory.clone());
        recorder.write_and_maybe_record("not json").await;
        assert!(recorder.recorded_lines().await.is_empty());
        assert_eq!(memory.snapshot().await, vec!["not json"]);
    }

    #[tokio::test]
    async fn replay_forwards_lines_without_recording() {
        let memory = Arc::new(MemorySink::new());
        let sink: Arc<dyn LineSink> = memory.clone();
        let lines = vec![r#"{"type":"user"}"#.to_string()];
        replay(&sink, &lines).await;
        assert_eq!(memory.snapshot().await, lines);
    }
}
