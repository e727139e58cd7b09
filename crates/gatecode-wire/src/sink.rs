//! The output sink every envelope is written through. A single
//! `tokio::sync::Mutex` serializes writes at the envelope level (spec §5:
//! "the sink serializes writes atomically"), so the keep-alive task and the
//! main emit path never interleave partial lines.

use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Anything a stream-json line can be written to: stdout in production,
/// an in-memory buffer in tests.
#[async_trait::async_trait]
pub trait LineSink: Send + Sync {
    async fn write_line(&self, line: &str);
}

/// Wraps any `AsyncWrite` (stdout, a file, a `Vec<u8>` via `tokio::io::duplex`)
/// behind a mutex so concurrent writers serialize at the line level.
pub struct WriterSink<W> {
    inner: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> LineSink for WriterSink<W> {
    async fn write_line(&self, line: &str) {
        let mut guard = self.inner.lock().await;
        let _ = guard.write_all(line.as_bytes()).await;
        let _ = guard.write_all(b"\n").await;
        let _ = guard.flush().await;
    }
}

/// In-memory sink used by tests and by the recorder's replay buffer.
#[derive(Default)]
pub struct MemorySink {
    pub lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn into_lines(self) -> Vec<String> {
        self.lines.into_inner()
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.lines.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl LineSink for MemorySink {
    async fn write_line(&self, line: &str) {
        self.lines.lock().await.push(line.to_string());
    }
}

/// Serializes `envelope` with HTML-escaping disabled (spec §4.3: "HTML-escape-off
/// JSON encoding") and writes it through `sink`.
pub async fn emit_envelope(sink: &Arc<dyn LineSink>, envelope: &impl Serialize) {
    match to_line(envelope) {
        Ok(line) => sink.write_line(&line).await,
        Err(e) => tracing::error!(error = %e, "failed to serialize stream-json envelope"),
    }
}

/// Serializes with a `PrettyFormatter`-free, non-HTML-escaping writer —
/// equivalent to `serde_json::to_string` but explicit about the escaping
/// choice so a future formatter swap can't silently reintroduce `<`
/// escapes the reference CLI never emits.
pub fn to_line(envelope: &impl Serialize) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::CompactFormatter;
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, formatter);
    envelope.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf).expect("json output is always valid utf8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        a: u32,
        b: &'static str,
    }

    #[tokio::test]
    async fn memory_sink_preserves_write_order() {
        let sink = MemorySink::new();
        sink.write_line("first").await;
        sink.write_line("second").await;
        assert_eq!(sink.snapshot().await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn writer_sink_appends_newline_per_line() {
        let buf: Vec<u8> = Vec::new();
        let sink = WriterSink::new(std::io::Cursor::new(buf));
        sink.write_line("hello").await;
        sink.write_line("world").await;
        let guard = sink.inner.lock().await;
        let written = guard.get_ref();
        assert_eq!(written, b"hello\nworld\n");
    }

    #[test]
    fn to_line_produces_compact_json_without_html_escaping() {
        let line = to_line(&Sample { a: 1, b: "<tag>" }).unwrap();
        assert_eq!(line, "{\"a\":1,\"b\":\"<tag>\"}");
        assert!(!line.contains("\\u003c"));
    }

    #[tokio::test]
    async fn emit_envelope_writes_one_line_per_call() {
        let memory = Arc::new(MemorySink::new());
        let sink: Arc<dyn LineSink> = memory.clone();
        emit_envelope(&sink, &Sample { a: 7, b: "x" }).await;
        emit_envelope(&sink, &Sample { a: 8, b: "y" }).await;
        let lines = memory.snapshot().await;
        assert_eq!(lines, vec!["{\"a\":7,\"b\":\"x\"}", "{\"a\":8,\"b\":\"y\"}"]);
    }
}
